// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 重定向中间件
//!
//! 按注册顺序用请求路径逐条匹配规则 `(模式, 目标模板, 是否永久)`，第一条命中的规则生效：
//! 展开目标模板，按配置保留原始查询字符串或路径，返回 301 / 302 响应。
//! 没有规则命中时放行，交给内层处理。

use lazy_static::lazy_static;
use log::{debug, info};
use regex::{Captures, Regex};

use crate::{
    exception::Exception,
    request::Request,
    response::Response,
    util::rewrite_location,
};

use super::Middleware;

lazy_static! {
    /// 目标模板中的 `{0}`、`{name}` 占位符
    static ref TARGET_FIELD: Regex = Regex::new(r"\{([0-9]+|[A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// 规则的匹配表达式：字符串在编译时补上前缀和锚点，预编译的正则原样使用。
pub enum RulePattern {
    Text(String),
    Compiled(Regex),
}

impl From<&str> for RulePattern {
    fn from(pattern: &str) -> Self {
        RulePattern::Text(pattern.to_string())
    }
}

impl From<String> for RulePattern {
    fn from(pattern: String) -> Self {
        RulePattern::Text(pattern)
    }
}

impl From<Regex> for RulePattern {
    fn from(pattern: Regex) -> Self {
        RulePattern::Compiled(pattern)
    }
}

#[derive(Debug, Clone)]
struct RedirectRule {
    pattern: Regex,
    target: String,
    permanent: bool,
}

#[derive(Debug, Clone)]
pub struct RedirectionMiddleware {
    prefix: String,
    rules: Vec<RedirectRule>,
    retain_query: bool,
    retain_path: bool,
}

impl Default for RedirectionMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl RedirectionMiddleware {
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            rules: Vec::new(),
            retain_query: true,
            retain_path: false,
        }
    }

    /// 字符串规则的公共前缀。只影响之后添加的规则。
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// 把请求的查询字符串合并进目标地址，默认开启
    pub fn retain_query(mut self, retain: bool) -> Self {
        self.retain_query = retain;
        self
    }

    /// 用请求路径替换目标地址的路径，默认关闭
    pub fn retain_path(mut self, retain: bool) -> Self {
        self.retain_path = retain;
        self
    }

    /// 追加一条规则
    pub fn redirect(
        &mut self,
        pattern: impl Into<RulePattern>,
        target: &str,
        permanent: bool,
    ) -> Result<&mut Self, Exception> {
        let pattern = match pattern.into() {
            RulePattern::Compiled(regex) => regex,
            RulePattern::Text(text) => self.compile_text(&text)?,
        };
        debug!("添加重定向规则 {} -> {}", pattern.as_str(), target);
        self.rules.push(RedirectRule {
            pattern,
            target: target.to_string(),
            permanent,
        });
        Ok(self)
    }

    /// 链式版本的 `redirect`
    pub fn rule(
        mut self,
        pattern: impl Into<RulePattern>,
        target: &str,
        permanent: bool,
    ) -> Result<Self, Exception> {
        self.redirect(pattern, target, permanent)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn compile_text(&self, text: &str) -> Result<Regex, Exception> {
        let mut expression = if text.starts_with('^') {
            text.to_string()
        } else {
            format!("^{}{}", self.prefix, text)
        };
        if !expression.ends_with('$') {
            expression.push('$');
        }
        Regex::new(&expression)
            .map_err(|e| Exception::Pattern(format!("重定向规则{}无法编译：{}", text, e)))
    }

    /// 返回第一条命中规则生成的 `Location`
    pub fn locate(&self, request: &Request) -> Option<(String, bool)> {
        let path = request.path();
        self.rules.iter().find_map(|rule| {
            let captures = rule.pattern.captures(path)?;
            let expanded = expand_target(&rule.target, &rule.pattern, &captures, request);

            let extra_query = match self.retain_query {
                true => request.query(),
                false => "",
            };
            let retained_path = self.retain_path.then_some(path);
            Some((
                rewrite_location(&expanded, retained_path, extra_query),
                rule.permanent,
            ))
        })
    }
}

/// 展开目标模板：数字取分组（0 为整个匹配），名称先取命名分组，再取请求元数据，
/// 都没有时保留原文。
fn expand_target(target: &str, pattern: &Regex, captures: &Captures, request: &Request) -> String {
    TARGET_FIELD
        .replace_all(target, |field: &Captures| {
            let key = &field[1];
            if let Ok(index) = key.parse::<usize>() {
                return match index < captures.len() {
                    true => captures
                        .get(index)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                    false => field[0].to_string(),
                };
            }
            if pattern.capture_names().flatten().any(|name| name == key) {
                return captures
                    .name(key)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
            }
            match key {
                "hostname" => request.hostname().to_string(),
                "path" => request.path().to_string(),
                "query" => request.query().to_string(),
                "path_qs" => request.path_qs(),
                _ => field[0].to_string(),
            }
        })
        .into_owned()
}

impl Middleware for RedirectionMiddleware {
    fn name(&self) -> &'static str {
        "redirect"
    }

    fn run_before(&self, request: &Request) -> Option<Response> {
        let (location, permanent) = self.locate(request)?;
        info!(
            "[ID{}]{} 重定向至 {}",
            request.id(),
            request.path_qs(),
            location
        );
        Some(Response::redirect(&location, permanent))
    }
}

/// 短链接：`<基础路径><引用名>` 重定向到目标地址。
#[derive(Debug, Clone)]
pub struct Shortener {
    base_path: String,
    redirects: RedirectionMiddleware,
}

impl Shortener {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.to_string(),
            redirects: RedirectionMiddleware::new().retain_query(false),
        }
    }

    /// 登记一个短链接，引用名按字面匹配
    pub fn shorten(
        &mut self,
        reference: &str,
        destination: &str,
        permanent: bool,
    ) -> Result<&mut Self, Exception> {
        let pattern = format!(
            "^{}{}$",
            regex::escape(&self.base_path),
            regex::escape(reference)
        );
        self.redirects.redirect(pattern, destination, permanent)?;
        Ok(self)
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl Middleware for Shortener {
    fn name(&self) -> &'static str {
        "shortener"
    }

    fn run_before(&self, request: &Request) -> Option<Response> {
        self.redirects.run_before(request)
    }
}
