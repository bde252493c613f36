// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态文件中间件
//!
//! 对 GET / HEAD 请求：
//! 1. 去掉配置的路径前缀（必须落在路径段边界上），前缀之外的请求不处理；
//! 2. 百分号解码后规整路径：合并重复的 `/`，丢弃 `.` 段，出现 `..`、NUL 或反斜杠时拒绝；
//! 3. 在根目录下解析出普通文件，按规则表选择 `Content-Type` 与 `Cache-Control`；
//! 4. 小文件读入内存，大文件交给传输层分块发送。
//!
//! 文件不存在时放行，由内层继续处理。

use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use log::{debug, error, warn};
use regex::Regex;

use crate::{
    exception::Exception,
    param::{FALLBACK_MIME, MIME_TYPES},
    request::Request,
    response::Response,
    util::decode_path,
};

use super::Middleware;

/// 未命中任何规则时的缓存时间（秒）
pub const DEFAULT_CACHE_LIFE: u64 = 3600;

/// 超过该大小的文件以流式响应体返回
pub const DEFAULT_STREAMING_THRESHOLD: u64 = 10 * 1024 * 1024;

/// 文件名后缀规则：`(后缀正则, 内容类型, 缓存秒数)`
#[derive(Debug, Clone)]
pub struct StaticRule {
    suffix: Regex,
    content_type: String,
    cache_life: u64,
}

impl StaticRule {
    pub fn new(suffix: &str, content_type: &str, cache_life: u64) -> Result<Self, Exception> {
        let suffix = Regex::new(suffix)
            .map_err(|e| Exception::Pattern(format!("静态文件规则{}无法编译：{}", suffix, e)))?;
        Ok(Self {
            suffix,
            content_type: content_type.to_string(),
            cache_life,
        })
    }

    pub fn matches(&self, filename: &str) -> bool {
        self.suffix.is_match(filename)
    }
}

fn builtin_rule(suffix: &str, content_type: &str, cache_life: u64) -> StaticRule {
    StaticRule {
        suffix: Regex::new(suffix).unwrap(),
        content_type: content_type.to_string(),
        cache_life,
    }
}

lazy_static! {
    /// 内置的后缀规则
    static ref DEFAULT_RULES: Vec<StaticRule> = vec![
        builtin_rule(r"\.js$", "text/javascript", DEFAULT_CACHE_LIFE),
        builtin_rule(r"\.json$", "application/json", DEFAULT_CACHE_LIFE),
        builtin_rule(r"\.txt$", "text/plain", 600),
        builtin_rule(r"\.css$", "text/css", DEFAULT_CACHE_LIFE),
    ];
}

#[derive(Debug, Clone)]
pub struct StaticFileMiddleware {
    root: PathBuf,
    /// 不带结尾 `/` 的前缀；为空时处理所有路径
    prefix: String,
    rules: Vec<StaticRule>,
    default_cache_life: u64,
    streaming_threshold: u64,
}

impl StaticFileMiddleware {
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.trim_end_matches('/').to_string(),
            rules: DEFAULT_RULES.clone(),
            default_cache_life: DEFAULT_CACHE_LIFE,
            streaming_threshold: DEFAULT_STREAMING_THRESHOLD,
        }
    }

    /// 替换整张规则表
    pub fn with_rules(mut self, rules: Vec<StaticRule>) -> Self {
        self.rules = rules;
        self
    }

    /// 在规则表末尾追加一条规则
    pub fn with_rule(
        mut self,
        suffix: &str,
        content_type: &str,
        cache_life: u64,
    ) -> Result<Self, Exception> {
        self.rules.push(StaticRule::new(suffix, content_type, cache_life)?);
        Ok(self)
    }

    pub fn with_default_cache_life(mut self, seconds: u64) -> Self {
        self.default_cache_life = seconds;
        self
    }

    pub fn with_streaming_threshold(mut self, bytes: u64) -> Self {
        self.streaming_threshold = bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 请求路径映射到根目录下的文件路径。越界或非法的路径返回 `None`。
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = if self.prefix.is_empty() {
            request_path
        } else {
            let rest = request_path.strip_prefix(self.prefix.as_str())?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest
        };

        let decoded = decode_path(relative);
        if decoded.contains('\0') || decoded.contains('\\') {
            warn!("静态文件路径包含非法字符：{}", request_path);
            return None;
        }

        let mut segments = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    warn!("拒绝路径遍历请求：{}", request_path);
                    return None;
                }
                _ => segments.push(segment),
            }
        }
        if segments.is_empty() {
            return None;
        }

        let mut path = self.root.clone();
        path.extend(segments);
        Some(path)
    }

    /// 第一条命中的规则决定内容类型与缓存时间
    fn headers_for(&self, path: &Path) -> (String, u64) {
        let filename = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default();
        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(filename)) {
            return (rule.content_type.clone(), rule.cache_life);
        }
        let content_type = path
            .extension()
            .and_then(OsStr::to_str)
            .and_then(|extension| MIME_TYPES.get(extension.to_lowercase().as_str()).copied())
            .unwrap_or(FALLBACK_MIME);
        (content_type.to_string(), self.default_cache_life)
    }

    fn serve(&self, request: &Request, path: &Path) -> Option<Response> {
        let id = request.id();
        let metadata = match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                debug!("[ID{}]静态文件{}不存在", id, path.display());
                return None;
            }
        };

        let (content_type, cache_life) = self.headers_for(path);
        let mut response = Response::new();
        response
            .set_content_type(&content_type)
            .set_header("Cache-Control", &format!("max-age={}", cache_life));

        let len = metadata.len();
        if len > self.streaming_threshold {
            debug!("[ID{}]文件{}大小{}，使用流式传输", id, path.display(), len);
            response.set_file(path, len);
            return Some(response);
        }

        match fs::read(path) {
            Ok(content) => {
                debug!("[ID{}]读取静态文件{}，{} bytes", id, path.display(), content.len());
                response.set_body(content);
                Some(response)
            }
            Err(e) => {
                error!("[ID{}]无法读取文件{}：{}", id, path.display(), e);
                Some(Response::response_500())
            }
        }
    }
}

impl Middleware for StaticFileMiddleware {
    fn name(&self) -> &'static str {
        "static"
    }

    fn run_before(&self, request: &Request) -> Option<Response> {
        if !request.method().is_safe() {
            return None;
        }
        let path = self.resolve(request.path())?;
        self.serve(request, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::HttpRequestMethod;
    use std::io::Write;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("test.txt"), "This is a test.").unwrap();
        fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.path().join("blob.unknownext"), "?").unwrap();
        dir
    }

    #[test]
    fn test_serves_file_with_rule_headers() {
        let dir = site();
        let middleware = StaticFileMiddleware::new(dir.path(), "/static");

        let response = middleware
            .run_before(&Request::get("/static/test.txt"))
            .unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "This is a test.");
        assert_eq!(response.content_type(), Some("text/plain"));
        assert_eq!(response.header("Cache-Control"), Some("max-age=600"));

        let response = middleware
            .run_before(&Request::get("/static/css//./site.css"))
            .unwrap();
        assert_eq!(response.content_type(), Some("text/css"));
        assert_eq!(response.header("Cache-Control"), Some("max-age=3600"));
    }

    #[test]
    fn test_mime_fallback_and_default_life() {
        let dir = site();
        let middleware = StaticFileMiddleware::new(dir.path(), "").with_default_cache_life(60);

        let response = middleware.run_before(&Request::get("/logo.png")).unwrap();
        assert_eq!(response.content_type(), Some("image/png"));
        assert_eq!(response.header("Cache-Control"), Some("max-age=60"));

        let response = middleware
            .run_before(&Request::get("/blob.unknownext"))
            .unwrap();
        assert_eq!(response.content_type(), Some(FALLBACK_MIME));
    }

    #[test]
    fn test_missing_file_and_outside_prefix_pass_through() {
        let dir = site();
        let middleware = StaticFileMiddleware::new(dir.path(), "/static/");

        assert!(middleware.run_before(&Request::get("/static/nope.txt")).is_none());
        assert!(middleware.run_before(&Request::get("/test.txt")).is_none());
        assert!(middleware.run_before(&Request::get("/statictest.txt")).is_none());
        assert!(middleware.run_before(&Request::get("/static/css")).is_none());
        assert!(middleware.run_before(&Request::get("/static/")).is_none());
    }

    #[test]
    fn test_traversal_is_rejected() {
        let dir = site();
        let middleware = StaticFileMiddleware::new(dir.path().join("css"), "/static");

        for path in [
            "/static/../test.txt",
            "/static/%2e%2e/test.txt",
            "/static/%2E%2E%2Ftest.txt",
            "/static/..%5Ctest.txt",
            "/static/site.css%00.txt",
        ] {
            assert!(middleware.resolve(path).is_none(), "{} should be rejected", path);
            assert!(middleware.run_before(&Request::get(path)).is_none());
        }
        assert!(middleware.run_before(&Request::get("/static/site.css")).is_some());
    }

    #[test]
    fn test_only_safe_methods() {
        let dir = site();
        let middleware = StaticFileMiddleware::new(dir.path(), "/static");

        let post = Request::new(HttpRequestMethod::Post, "/static/test.txt");
        assert!(middleware.run_before(&post).is_none());
        let head = Request::new(HttpRequestMethod::Head, "/static/test.txt");
        assert_eq!(middleware.run_before(&head).unwrap().content_length(), 15);
    }

    #[test]
    fn test_large_file_is_streamed() {
        let dir = site();
        let mut file = fs::File::create(dir.path().join("big.bin")).unwrap();
        file.write_all(&[0u8; 2048]).unwrap();
        drop(file);

        let middleware = StaticFileMiddleware::new(dir.path(), "").with_streaming_threshold(1024);
        let response = middleware.run_before(&Request::get("/big.bin")).unwrap();
        assert!(response.is_streaming());
        assert_eq!(response.content_length(), 2048);

        let response = middleware.run_before(&Request::get("/test.txt")).unwrap();
        assert!(!response.is_streaming());
    }

    #[test]
    fn test_builtin_rules() {
        let middleware = StaticFileMiddleware::new("static", "/static");
        assert_eq!(middleware.rules.len(), 4);
        for (name, content_type) in [
            ("app.js", "text/javascript"),
            ("data.json", "application/json"),
            ("notes.txt", "text/plain"),
            ("site.css", "text/css"),
        ] {
            let rule = middleware.rules.iter().find(|rule| rule.matches(name)).unwrap();
            assert_eq!(rule.content_type, content_type);
        }
    }

    #[test]
    fn test_custom_rule() {
        let dir = site();
        let middleware = StaticFileMiddleware::new(dir.path(), "")
            .with_rules(vec![])
            .with_rule(r"\.txt$", "text/x-custom", 5)
            .unwrap();
        let response = middleware.run_before(&Request::get("/test.txt")).unwrap();
        assert_eq!(response.content_type(), Some("text/x-custom"));
        assert_eq!(response.header("Cache-Control"), Some("max-age=5"));
    }
}
