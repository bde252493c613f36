// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由模板
//!
//! 模板写作 `/blog/<year:\d{4}>/<category>/<title>`：
//! - `<name>`：命名捕获，默认约束为 `[^/]+`；
//! - `<name:constraint>`：带正则约束的命名捕获；
//! - `<:constraint>` 或 `<>`：位置捕获。
//!
//! 占位符之外的文本按正则表达式处理。模板首尾的 `^`、`$` 会被剥离后重新施加：
//! 开头总是锚定；结尾默认锚定，仅当允许前缀匹配且模板没有显式以 `$` 结尾时放开。
//! 正则与反向模板都在构造时一次性编译，之后只读。

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use crate::exception::Exception;

/// 未声明约束的字段匹配一个不含 `/` 的路径段
pub const DEFAULT_CONSTRAINT: &str = "[^/]+";

lazy_static! {
    static ref PLACEHOLDER_BODY: Regex =
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)?(?::(.+))?$").unwrap();
}

/// 模板中声明的一个字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Option<String>,
    pub constraint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReversePart {
    Literal(String),
    /// 命名字段为名称，位置字段为其序号
    Field(String),
}

/// 一次成功匹配得到的参数。
///
/// 命名参数与位置参数不会同时出现：模板只要声明了命名捕获，就只产出命名参数。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    positional: Vec<String>,
    named: HashMap<String, String>,
}

impl MatchResult {
    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn named(&self) -> &HashMap<String, String> {
        &self.named
    }

    /// 按名称取命名参数
    pub fn get(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// 按序号取位置参数
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }
}

/// 编译后的路由模板
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    fields: Vec<Field>,
    anchored: bool,
    matcher: Regex,
    reverse: Vec<ReversePart>,
}

impl PathPattern {
    pub fn compile(template: &str, allow_prefix: bool) -> Result<Self, Exception> {
        let body = template.trim_start_matches('^');
        let explicit_end = body.ends_with('$');
        let body = body.trim_end_matches('$');

        let mut source = String::new();
        let mut reverse = Vec::new();
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        let mut positional_index = 0usize;
        let mut rest = body;

        while let Some(open) = rest.find(['<', '>']) {
            if rest[open..].starts_with('>') {
                return Err(Exception::Pattern(format!(
                    "unbalanced '>' in template {:?}",
                    template
                )));
            }
            push_literal(&rest[..open], &mut source, &mut reverse);

            let after = &rest[open + 1..];
            let close = after.find('>').ok_or_else(|| {
                Exception::Pattern(format!("unclosed '<' in template {:?}", template))
            })?;
            let declaration = &after[..close];
            if declaration.contains('<') {
                return Err(Exception::Pattern(format!(
                    "nested '<' in template {:?}",
                    template
                )));
            }

            let captures = PLACEHOLDER_BODY.captures(declaration).ok_or_else(|| {
                Exception::Pattern(format!(
                    "invalid field declaration <{}> in template {:?}",
                    declaration, template
                ))
            })?;
            let name = captures.get(1).map(|m| m.as_str().to_string());
            let constraint = captures.get(2).map(|m| m.as_str().to_string());
            let group = constraint.as_deref().unwrap_or(DEFAULT_CONSTRAINT);

            match &name {
                Some(name) => {
                    if !seen.insert(name.clone()) {
                        return Err(Exception::Pattern(format!(
                            "field {:?} declared twice in template {:?}",
                            name, template
                        )));
                    }
                    source.push_str(&format!("(?P<{}>{})", name, group));
                    reverse.push(ReversePart::Field(name.clone()));
                }
                None => {
                    source.push_str(&format!("({})", group));
                    reverse.push(ReversePart::Field(positional_index.to_string()));
                    positional_index += 1;
                }
            }
            fields.push(Field { name, constraint });
            rest = &after[close + 1..];
        }
        push_literal(rest, &mut source, &mut reverse);

        let anchored = !allow_prefix || explicit_end;
        let expression = if anchored {
            format!("^{}$", source)
        } else {
            format!("^{}", source)
        };
        let matcher = Regex::new(&expression).map_err(|e| {
            Exception::Pattern(format!("template {:?} is not a valid expression: {}", template, e))
        })?;

        Ok(Self {
            raw: template.to_string(),
            fields,
            anchored,
            matcher,
            reverse,
        })
    }

    /// 尝试匹配路径，失败返回 `None`
    pub fn matches(&self, path: &str) -> Option<MatchResult> {
        let captures = self.matcher.captures(path)?;
        let mut result = MatchResult::default();

        let names: Vec<&str> = self.matcher.capture_names().flatten().collect();
        if names.is_empty() {
            result.positional = captures
                .iter()
                .skip(1)
                .map(|group| group.map_or("", |m| m.as_str()).to_string())
                .collect();
        } else {
            for name in names {
                if let Some(value) = captures.name(name) {
                    result.named.insert(name.to_string(), value.as_str().to_string());
                }
            }
        }
        Some(result)
    }

    /// 用绑定值反向生成 URL。位置字段以其序号（`"0"`、`"1"`……）为键。
    pub fn reverse(&self, bindings: &HashMap<String, String>) -> Result<String, Exception> {
        let mut url = String::new();
        for part in &self.reverse {
            match part {
                ReversePart::Literal(text) => url.push_str(text),
                ReversePart::Field(key) => match bindings.get(key) {
                    Some(value) => url.push_str(value),
                    None => return Err(Exception::UnresolvedField(key.clone())),
                },
            }
        }
        Ok(url)
    }

    /// `{name}` 形式的反向模板，例如 `/blog/{year}/{title}`
    pub fn template(&self) -> String {
        self.reverse
            .iter()
            .map(|part| match part {
                ReversePart::Literal(text) => text.clone(),
                ReversePart::Field(key) => format!("{{{}}}", key),
            })
            .collect()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }
}

fn push_literal(literal: &str, source: &mut String, reverse: &mut Vec<ReversePart>) {
    if literal.is_empty() {
        return;
    }
    source.push_str(literal);
    reverse.push(ReversePart::Literal(unescape(literal)));
}

/// 去掉标点前的正则转义，`\.` → `.`
fn unescape(literal: &str) -> String {
    let mut text = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) if !next.is_alphanumeric() => text.push(next),
                Some(next) => {
                    text.push('\\');
                    text.push(next);
                }
                None => text.push('\\'),
            },
            _ => text.push(c),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_named_fields() {
        let pattern = PathPattern::compile("/blog/<year>/<category>/<title>", false).unwrap();
        assert_eq!(pattern.fields().len(), 3);

        let result = pattern.matches("/blog/1982/awesome/first-blog-post").unwrap();
        assert_eq!(result.get("year"), Some("1982"));
        assert_eq!(result.get("category"), Some("awesome"));
        assert_eq!(result.get("title"), Some("first-blog-post"));
        assert!(result.positional().is_empty());

        assert!(pattern.matches("/blog/1982/awesome").is_none());
        assert!(pattern.matches("/blog/1982/awesome/post/extra").is_none());
    }

    #[test]
    fn test_constraint_and_positional() {
        let pattern = PathPattern::compile(r"/item/<:\d+>/<:[a-z]+>", false).unwrap();
        let result = pattern.matches("/item/42/abc").unwrap();
        assert_eq!(result.positional(), &["42".to_string(), "abc".to_string()]);
        assert!(result.named().is_empty());
        assert!(pattern.matches("/item/x/abc").is_none());

        let pattern = PathPattern::compile("/user/<>", false).unwrap();
        assert_eq!(pattern.matches("/user/bob").unwrap().arg(0), Some("bob"));
    }

    #[test]
    fn test_named_constraint() {
        let pattern = PathPattern::compile(r"/archive/<year:\d{4}>", false).unwrap();
        assert_eq!(pattern.matches("/archive/2015").unwrap().get("year"), Some("2015"));
        assert!(pattern.matches("/archive/15").is_none());
    }

    #[test]
    fn test_named_wins_over_literal_groups() {
        let pattern = PathPattern::compile("/(en|de)/<slug>", false).unwrap();
        let result = pattern.matches("/de/hello").unwrap();
        assert_eq!(result.get("slug"), Some("hello"));
        assert!(result.positional().is_empty());
    }

    #[test]
    fn test_prefix_matching() {
        let pattern = PathPattern::compile("/static", true).unwrap();
        assert!(!pattern.is_anchored());
        assert!(pattern.matches("/static/app.js").is_some());

        let pattern = PathPattern::compile("/static$", true).unwrap();
        assert!(pattern.is_anchored());
        assert!(pattern.matches("/static/app.js").is_none());
        assert!(pattern.matches("/static").is_some());

        let pattern = PathPattern::compile("^/static", false).unwrap();
        assert!(pattern.matches("/static/app.js").is_none());
    }

    #[test]
    fn test_malformed_templates() {
        for template in ["/blog/<year", "/blog/year>", "/a/<b<c>>", "/x/<1bad>", "/(unclosed/<a>"] {
            match PathPattern::compile(template, false) {
                Err(Exception::Pattern(_)) => {}
                other => panic!("expected pattern error for {}, got {:?}", template, other),
            }
        }
    }

    #[test]
    fn test_duplicate_field() {
        let result = PathPattern::compile("/<id>/<id>", false);
        assert!(matches!(result, Err(Exception::Pattern(_))));
    }

    #[test]
    fn test_reverse() {
        let pattern = PathPattern::compile(r"/blog/<year:\d{4}>/<title>\.html", false).unwrap();
        assert_eq!(pattern.template(), "/blog/{year}/{title}.html");

        let url = pattern
            .reverse(&bindings(&[("year", "2015"), ("title", "hello")]))
            .unwrap();
        assert_eq!(url, "/blog/2015/hello.html");

        let missing = pattern.reverse(&bindings(&[("year", "2015")]));
        assert_eq!(missing, Err(Exception::UnresolvedField("title".to_string())));
    }

    #[test]
    fn test_reverse_positional_by_index() {
        let pattern = PathPattern::compile("/item/<:\\d+>/<>", false).unwrap();
        assert_eq!(pattern.template(), "/item/{0}/{1}");
        let url = pattern.reverse(&bindings(&[("0", "7"), ("1", "x")])).unwrap();
        assert_eq!(url, "/item/7/x");
    }

    #[test]
    fn test_round_trip() {
        let pattern = PathPattern::compile("/blog/<year>/<category>/<title>", false).unwrap();
        let path = "/blog/1982/awesome/first-blog-post";
        let result = pattern.matches(path).unwrap();
        assert_eq!(pattern.reverse(result.named()).unwrap(), path);
    }
}
