// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 压缩中间件
//!
//! 只在响应阶段工作：客户端接受的编码中按 br、gzip、deflate 的顺序选择一种，
//! 对内存中的 200 响应体进行压缩。已压缩的响应、流式响应和不适合压缩的内容类型保持原样。

use std::io::{self, Write};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, warn};

use crate::{param::HttpEncoding, request::Request, response::Response};

use super::Middleware;

/// 小于该大小的响应体不压缩
const DEFAULT_MIN_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct CompressionMiddleware {
    min_size: usize,
}

impl Default for CompressionMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressionMiddleware {
    pub fn new() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
        }
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }
}

impl Middleware for CompressionMiddleware {
    fn name(&self) -> &'static str {
        "compression"
    }

    fn run_after(&self, request: &Request, mut response: Response) -> Response {
        if response.status_code() != 200 || response.header("content-encoding").is_some() {
            return response;
        }
        let encoding = match decide_encoding(&request.accept_encoding()) {
            Some(encoding) => encoding,
            None => return response,
        };
        if response
            .content_type()
            .map_or(false, should_skip_compression)
        {
            return response;
        }
        let body = match response.body_bytes() {
            Some(body) if body.len() >= self.min_size && !body.is_empty() => body,
            _ => return response,
        };

        match compress(&body, encoding) {
            Ok(compressed) => {
                debug!(
                    "[ID{}]压缩完成: {}, 原始大小: {} bytes, 压缩后: {} bytes",
                    request.id(),
                    encoding,
                    body.len(),
                    compressed.len()
                );
                response
                    .set_header("Content-Encoding", &encoding.to_string())
                    .set_header("Vary", "Accept-Encoding")
                    .set_body(compressed);
                response
            }
            Err(e) => {
                warn!("[ID{}]压缩失败，发送原始响应体：{}", request.id(), e);
                response
            }
        }
    }
}

pub fn compress(data: &[u8], encoding: HttpEncoding) -> io::Result<Vec<u8>> {
    match encoding {
        HttpEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Br => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
    }
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/avif",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/gzip",
        "application/wasm",
        "font/woff",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Br, HttpEncoding::Gzip, HttpEncoding::Deflate]
        .into_iter()
        .find(|encoding| accept_encoding.contains(encoding))
}
