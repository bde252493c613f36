// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::exception::Exception;

use super::pattern::{MatchResult, PathPattern};

/// 裸根路由 `/`（未显式以 `$` 结尾）的分数：排在所有路由之后，作为兜底
pub const FALLBACK_SCORE: i64 = i64::MIN;

/// 显式锚定的根路由 `^/$` 的固定分数
pub const ANCHORED_ROOT_SCORE: i64 = 5;

/// 一条路由：编译后的模板、处理器以及可选的名称。注册后不可变。
#[derive(Debug, Clone)]
pub struct Route<H> {
    pattern: PathPattern,
    handler: H,
    name: Option<String>,
    specificity: i64,
}

impl<H> Route<H> {
    pub fn new(
        template: &str,
        handler: H,
        name: Option<&str>,
        allow_prefix: bool,
    ) -> Result<Self, Exception> {
        let pattern = PathPattern::compile(template, allow_prefix)?;
        let specificity = specificity_score(&pattern);
        Ok(Self {
            pattern,
            handler,
            name: name.map(str::to_string),
            specificity,
        })
    }

    /// 匹配顺序依据，分数越高越先尝试
    pub fn specificity(&self) -> i64 {
        self.specificity
    }

    pub fn matches(&self, path: &str) -> Option<MatchResult> {
        self.pattern.matches(path)
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// `模板长度 × 字段数`；根路由 `/` 例外，见两个常量。
fn specificity_score(pattern: &PathPattern) -> i64 {
    let raw = pattern.raw();
    let stripped = raw.trim_start_matches('^').trim_end_matches('$');

    if stripped == "/" {
        return if raw.ends_with('$') {
            ANCHORED_ROOT_SCORE
        } else {
            FALLBACK_SCORE
        };
    }

    (raw.len() * pattern.fields().len()) as i64
}
