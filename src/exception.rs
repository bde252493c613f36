// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了路由注册、请求分发、URL 反向生成以及请求解析过程中可能出现的各类异常。
//!
//! ## 分类
//! - **启动期错误**：`Pattern`、`DuplicateName`、`InvalidConfig`，应当在开始服务之前暴露。
//! - **请求期错误**：`NotFound`、`MethodNotAllowed`，由 `Application` 转换为 404 / 405 响应。
//! - **URL 生成错误**：`UnknownRouteName`、`UnresolvedField`，原样返回给调用方。
//! - **协议解析错误**：`RequestIsNotUtf8` 等，由传输层转换为 400 响应。

use std::fmt;

use crate::param::HttpRequestMethod;

/// 请求处理与路由构建过程中发生的异常类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 路由模板非法：占位符 `<` `>` 不配对、占位符内容非法、字段重名或正则无法编译。
    Pattern(String),
    /// 同一个 Router 中注册了两个同名路由。
    DuplicateName(String),
    /// 没有任何路由匹配该路径。对应 `404 Not Found`。
    NotFound(String),
    /// 路由已匹配，但处理器没有提供该 HTTP 方法。对应 `405 Method Not Allowed`，
    /// `allowed` 是处理器支持的方法。
    MethodNotAllowed {
        method: HttpRequestMethod,
        allowed: Vec<HttpRequestMethod>,
    },
    /// `resolve_url` 时找不到指定名称的路由。
    UnknownRouteName(String),
    /// `reverse` 时某个字段没有提供绑定值。
    UnresolvedField(String),
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了服务器暂不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求行格式不正确。
    MalformedRequest,
    /// 配置文件无法读取或无法解析。
    InvalidConfig(String),
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern(detail) => write!(f, "Invalid route pattern: {}", detail),
            DuplicateName(name) => write!(f, "Duplicate route name {:?}", name),
            NotFound(path) => write!(f, "No route matches {:?} (404)", path),
            MethodNotAllowed { method, .. } => write!(f, "Method {} not allowed (405)", method),
            UnknownRouteName(name) => write!(f, "Could not find the route named {:?}", name),
            UnresolvedField(field) => write!(f, "No binding supplied for field {:?}", field),
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            MalformedRequest => write!(f, "Malformed request line"),
            InvalidConfig(detail) => write!(f, "Invalid configuration: {}", detail),
        }
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_detail() {
        let e = Exception::DuplicateName("home".to_string());
        assert_eq!(e.to_string(), "Duplicate route name \"home\"");

        let e = Exception::UnknownRouteName("missing".to_string());
        assert!(e.to_string().contains("missing"));
    }

    #[test]
    fn test_boxed_as_std_error() {
        let e: Box<dyn std::error::Error> = Box::new(Exception::NotFound("/x".to_string()));
        assert!(e.to_string().contains("404"));
    }
}
