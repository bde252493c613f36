// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::borrow::Cow;

use log::warn;
use url::{form_urlencoded, ParseError, Position, Url};

use crate::param::STATUS_CODES;

pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => STATUS_CODES.get(&code).copied().unwrap_or_default(),
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code, description
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

/// 对 URL 路径做百分号解码。非法编码时保留原文。
pub fn decode_path(path: &str) -> Cow<'_, str> {
    match urlencoding::decode(path) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("路径{}无法进行百分号解码：{}", path, e);
            Cow::Borrowed(path)
        }
    }
}

/// 相对目标借用的占位基址，输出时再去掉
const PLACEHOLDER_BASE: &str = "http://placeholder.invalid/";

/// 重定向目标的书写形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationKind {
    /// `http://host/path`
    Absolute,
    /// `//host/path`
    SchemeRelative,
    /// `/path`
    Relative,
}

/// 改写重定向目标：`path` 不为空时替换路径，`extra_query` 追加到原有查询字符串之后。
/// 两者都不生效时原样返回目标；无法解析的目标也原样返回。
pub fn rewrite_location(location: &str, path: Option<&str>, extra_query: &str) -> String {
    if path.is_none() && extra_query.is_empty() {
        return location.to_string();
    }

    let (kind, parsed) = match Url::parse(location) {
        Ok(url) => (LocationKind::Absolute, Ok(url)),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let kind = match location.starts_with("//") {
                true => LocationKind::SchemeRelative,
                false => LocationKind::Relative,
            };
            let joined = Url::parse(PLACEHOLDER_BASE).and_then(|base| base.join(location));
            (kind, joined)
        }
        Err(e) => (LocationKind::Absolute, Err(e)),
    };
    let mut url = match parsed {
        Ok(url) => url,
        Err(e) => {
            warn!("重定向目标{}无法解析：{}", location, e);
            return location.to_string();
        }
    };

    if let Some(path) = path {
        url.set_path(path);
    }
    if !extra_query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(form_urlencoded::parse(extra_query.as_bytes()));
    }

    match kind {
        LocationKind::Absolute => url.to_string(),
        LocationKind::SchemeRelative => format!("//{}", &url[Position::BeforeUsername..]),
        LocationKind::Relative => url[Position::BeforePath..].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_builder_from_status_code() {
        let html = HtmlBuilder::from_status_code(404, Some("测试404")).build();
        assert!(html.contains("404"));
        assert!(html.contains("测试404"));
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("</html>"));
    }

    #[test]
    fn test_html_builder_from_status_code_no_note() {
        let html = HtmlBuilder::from_status_code(200, None).build();
        assert!(html.contains("200"));
        assert!(html.contains("OK"));
    }

    #[test]
    fn test_html_builder_unknown_code() {
        let html = HtmlBuilder::from_status_code(999, None).build();
        assert!(html.contains("<h1>999</h1>"));
    }

    #[test]
    fn test_rewrite_absolute_location() {
        assert_eq!(
            rewrite_location("http://x.com/search?q=y#top", None, "foo=1"),
            "http://x.com/search?q=y&foo=1#top"
        );
        assert_eq!(
            rewrite_location("https://example.com/", Some("/a/b"), ""),
            "https://example.com/a/b"
        );
        // 不需要改写时保持原文
        assert_eq!(rewrite_location("https://example.com", None, ""), "https://example.com");
    }

    #[test]
    fn test_rewrite_relative_location() {
        assert_eq!(rewrite_location("/a/b?c=d", None, "e=f"), "/a/b?c=d&e=f");
        assert_eq!(rewrite_location("/a/b", Some("/x"), "e=f"), "/x?e=f");
    }

    #[test]
    fn test_rewrite_scheme_relative_location() {
        assert_eq!(
            rewrite_location("//cdn.example.com/base", Some("/go"), ""),
            "//cdn.example.com/go"
        );
        assert_eq!(
            rewrite_location("//cdn.example.com/base?v=1", None, "w=2"),
            "//cdn.example.com/base?v=1&w=2"
        );
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/a%20b"), "/a b");
        assert_eq!(decode_path("/%2e%2e/etc"), "/../etc");
    }
}
