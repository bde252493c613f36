// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应模块
//!
//! `Response` 是处理器与中间件之间传递的响应对象：状态行、有序标头列表和响应体。
//! 响应体可以是内存中的字节，也可以是交由传输层分块发送的文件。

use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use chrono::prelude::*;
use log::warn;

use crate::{param::*, util::HtmlBuilder};

/// 响应体
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// 大文件：只记录路径与长度，由传输层按块读取发送
    File { path: PathBuf, len: u64 },
}

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    headers: Vec<(String, String)>,
    body: Body,
    date: DateTime<Utc>,
    server_name: String,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            headers: Vec::new(),
            body: Body::Empty,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
        }
    }

    /// 用已知的各个部分重建响应，供响应缓存还原使用。
    pub fn from_parts(
        status_code: u16,
        information: &str,
        headers: Vec<(String, String)>,
        date: DateTime<Utc>,
        body: Bytes,
    ) -> Self {
        let mut response = Self::new();
        response.status_code = status_code;
        response.information = information.to_string();
        response.headers = headers;
        response.date = date;
        response.body = if body.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(body)
        };
        response
    }

    /// 以状态码生成一个带 HTML 说明页面的响应
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        let html = HtmlBuilder::from_status_code(code, note).build();
        response.set_content_type(DEFAULT_CONTENT_TYPE);
        response.set_body(html);
        response
    }

    /// 返回 HTML 正文的 200 响应
    pub fn html(content: &str) -> Self {
        let mut response = Self::new();
        response.set_content_type(DEFAULT_CONTENT_TYPE);
        response.set_body(content.to_string());
        response
    }

    pub fn response_400() -> Self {
        Self::from_status_code(400, None)
    }

    pub fn response_404() -> Self {
        Self::from_status_code(
            404,
            Some(r"<h2>噢！</h2><p>你指定的网页无法找到。</p>"),
        )
    }

    /// 405 响应，`Allow` 标头列出处理器支持的方法
    pub fn response_405(allowed: &[HttpRequestMethod]) -> Self {
        let mut response = Self::from_status_code(
            405,
            Some(r"<h2>噢！</h2><p>该资源不支持此请求方法。</p>"),
        );
        let allow = allowed
            .iter()
            .map(|method| method.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        response.set_header("Allow", &allow);
        response
    }

    pub fn response_500() -> Self {
        Self::from_status_code(
            500,
            Some(r"<h2>噢！</h2><p>服务器出现了一个内部错误。</p>"),
        )
    }

    /// 301（永久）或 302（临时）重定向
    pub fn redirect(location: &str, permanent: bool) -> Self {
        let mut response = Self::new();
        response.set_code(if permanent { 301 } else { 302 });
        response.set_header("Location", location);
        response
    }

    /// 设置状态码，原因短语取自标准表。
    pub fn set_code(&mut self, code: u16) -> &mut Self {
        let information = match STATUS_CODES.get(&code) {
            Some(&info) => info,
            None => {
                warn!("未登记的状态码：{}，原因短语留空", code);
                ""
            }
        };
        self.set_status(code, information)
    }

    /// 设置状态码和自定义的原因短语
    pub fn set_status(&mut self, code: u16, information: &str) -> &mut Self {
        self.status_code = code;
        self.information = information.to_string();
        self
    }

    pub fn set_date(&mut self, date: DateTime<Utc>) -> &mut Self {
        self.date = date;
        self
    }

    /// 设置标头，替换所有同名（大小写不敏感）的旧值
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.remove_header(name);
        self.append_header(name, value)
    }

    pub fn append_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.set_header("Content-Type", content_type)
    }

    pub fn set_body(&mut self, content: impl Into<Bytes>) -> &mut Self {
        let content = content.into();
        self.body = if content.is_empty() {
            Body::Empty
        } else {
            Body::Bytes(content)
        };
        self
    }

    /// 把文件作为响应体，由传输层流式发送
    pub fn set_file(&mut self, path: &Path, len: u64) -> &mut Self {
        self.body = Body::File {
            path: path.to_path_buf(),
            len,
        };
        self
    }

    /// 在内存响应体末尾追加文本
    pub fn write(&mut self, text: &str) -> &mut Self {
        let mut buffer = match &self.body {
            Body::Bytes(bytes) => BytesMut::from(bytes.as_ref()),
            _ => BytesMut::new(),
        };
        buffer.extend_from_slice(text.as_bytes());
        self.set_body(buffer.freeze())
    }

    /// 序列化为完整的 HTTP 报文。文件响应体不包含在内，由调用方随后发送。
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = self.head_bytes();
        if let Body::Bytes(content) = &self.body {
            bytes.extend_from_slice(content);
        }
        bytes
    }

    /// 仅序列化状态行与标头（用于 HEAD 请求与流式传输）
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        for (name, value) in &self.headers {
            head.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        head.push_str(&format!("Content-Length: {}{}", self.content_length(), CRLF));
        head.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        head.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        head.push_str(CRLF);
        head.into_bytes()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// 内存中的响应体；文件响应体返回 `None`
    pub fn body_bytes(&self) -> Option<Bytes> {
        match &self.body {
            Body::Empty => Some(Bytes::new()),
            Body::Bytes(bytes) => Some(bytes.clone()),
            Body::File { .. } => None,
        }
    }

    /// 把响应体按 UTF-8 解释（测试与日志使用）
    pub fn text(&self) -> String {
        match &self.body {
            Body::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::File { .. })
    }

    pub fn content_length(&self) -> u64 {
        match &self.body {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
