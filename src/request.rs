// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求模块
//!
//! 负责将 TCP 流中读取的原始字节解析为 `Request`，也可以在测试或嵌入场景中直接构造。
//! 路由核心只依赖其中的：方法、路径、查询字符串、标头与请求体。

use bytes::Bytes;
use log::error;

use crate::{exception::Exception, param::*};

/// 一个 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// 全局请求 ID，用于在多线程环境下追踪日志
    id: u128,
    method: HttpRequestMethod,
    /// 请求路径，不含查询字符串
    path: String,
    /// 查询字符串，不含前导 `?`
    query: String,
    version: HttpVersion,
    /// 按到达顺序保存的标头，查找时大小写不敏感
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    /// 以方法和请求目标（可带查询字符串）构造请求。
    pub fn new(method: HttpRequestMethod, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            id: 0,
            method,
            path,
            query,
            version: HttpVersion::V1_1,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `GET` 请求的快捷构造
    pub fn get(target: &str) -> Self {
        Self::new(HttpRequestMethod::Get, target)
    }

    pub fn with_id(mut self, id: u128) -> Self {
        self.id = id;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：标头部分必须是合法的 UTF-8。
    /// 2. 解析请求行：提取方法、请求目标和协议版本。
    /// 3. 逐行解析标头，直到空行。
    /// 4. 空行之后的字节作为请求体。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let separator = b"\r\n\r\n";
        let (head, body) = match buffer
            .windows(separator.len())
            .position(|window| window == separator)
        {
            Some(index) => (&buffer[..index], &buffer[index + separator.len()..]),
            None => (buffer, &b""[..]),
        };

        let head = match std::str::from_utf8(head) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method = match HttpRequestMethod::parse(parts[0]) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, parts[0]);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = parts[parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含未编码的空格，虽然不规范但尝试恢复
        let target = parts[1..parts.len() - 1].join(" ");

        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        let mut request = Self::new(method, &target).with_id(id).with_body(body.to_vec());
        request.version = version;
        request.headers = headers;
        Ok(request)
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 请求路径（不含查询字符串）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 查询字符串（不含 `?`），可能为空
    pub fn query(&self) -> &str {
        &self.query
    }

    /// 路径加上查询字符串，例如 `/search?q=rust`
    pub fn path_qs(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    /// 大小写不敏感地获取第一个同名标头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Host 标头中去掉端口后的主机名
    pub fn hostname(&self) -> &str {
        let host = self.header("host").unwrap_or_default();
        host.split(':').next().unwrap_or_default()
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or_default()
    }

    pub fn accept(&self) -> Option<&str> {
        self.header("accept")
    }

    /// 客户端支持的压缩算法列表（按出现顺序）
    pub fn accept_encoding(&self) -> Vec<HttpEncoding> {
        let mut encodings = vec![];
        if let Some(value) = self.header("accept-encoding") {
            for token in value.split(',') {
                let token = token.split(';').next().unwrap_or_default().trim();
                let encoding = match token {
                    "gzip" => HttpEncoding::Gzip,
                    "deflate" => HttpEncoding::Deflate,
                    "br" => HttpEncoding::Br,
                    _ => continue,
                };
                encodings.push(encoding);
            }
        }
        encodings
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// 按名称查找参数：先查查询字符串，再查 urlencoded 请求体。
    pub fn param(&self, name: &str) -> Option<String> {
        let body = std::str::from_utf8(&self.body).unwrap_or_default();
        find_param(&self.query, name).or_else(|| find_param(body, name))
    }
}

fn split_target(target: &str) -> (String, String) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    }
}

fn find_param(encoded: &str, name: &str) -> Option<String> {
    encoded
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then(|| decode_form_value(value))
        })
        .next()
}

fn decode_form_value(value: &str) -> String {
    let value = value.replace('+', " ");
    match urlencoding::decode(&value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value,
    }
}
