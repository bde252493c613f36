// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应缓存中间件
//!
//! - 请求阶段：对 GET / HEAD 计算指纹，存储中有未过期的记录时直接返回，内层不会被调用；
//! - 响应阶段：GET 的 200 响应在能确定过期时间时写入存储。
//!
//! 过期时间依次取自 `Cache-Control`（`no-store`/`no-cache`/`private` 表示不缓存，
//! `max-age=N`）、`Expires`、配置的默认 TTL；都无法确定时不缓存。
//! 记录损坏或时间戳无法解析一律按未命中处理。

use std::sync::Arc;

use chrono::{prelude::*, Duration};
use log::{debug, warn};

use crate::{
    cache::{CacheRecord, CacheStore},
    param::HttpRequestMethod,
    request::Request,
    response::Response,
};

use super::Middleware;

/// 有效期上限（秒），更大的 `max-age` 与默认 TTL 都按此值截断
pub const MAX_TTL: i64 = 1 << 31;

pub struct ResponseCacheMiddleware {
    store: Arc<dyn CacheStore>,
    default_ttl: Option<Duration>,
    vary_on_accept: bool,
}

impl ResponseCacheMiddleware {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            default_ttl: None,
            vary_on_accept: false,
        }
    }

    /// 响应没有给出过期信息时使用的有效期
    pub fn with_default_ttl(mut self, seconds: i64) -> Self {
        self.default_ttl = Some(Duration::seconds(clamp_ttl(seconds)));
        self
    }

    /// 指纹是否包含 `Accept` 与 `Accept-Encoding` 标头
    pub fn vary_on_accept(mut self, vary: bool) -> Self {
        self.vary_on_accept = vary;
        self
    }

    pub fn fingerprint(&self, request: &Request) -> String {
        let mut context = md5::Context::new();
        context.consume(request.path_qs().as_bytes());
        if self.vary_on_accept {
            for name in ["accept", "accept-encoding"] {
                context.consume(b"\n");
                context.consume(request.header(name).unwrap_or_default().as_bytes());
            }
        }
        format!("{:x}", context.compute())
    }

    /// 响应的过期时刻；`None` 表示不应缓存
    pub fn expiration(&self, response: &Response, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(cache_control) = response.header("cache-control") {
            let mut max_age = None;
            for directive in cache_control.split(',') {
                let directive = directive.trim().to_lowercase();
                match directive.as_str() {
                    "no-store" | "no-cache" | "private" => return None,
                    _ => {
                        if let Some(seconds) = directive.strip_prefix("max-age=") {
                            max_age = seconds.trim().parse::<i64>().ok();
                        }
                    }
                }
            }
            if let Some(seconds) = max_age {
                return now.checked_add_signed(Duration::seconds(clamp_ttl(seconds)));
            }
        }

        if let Some(expires) = response.header("expires") {
            match DateTime::parse_from_rfc2822(expires) {
                Ok(time) => return Some(time.with_timezone(&Utc)),
                Err(e) => debug!("无法解析Expires标头{}：{}", expires, e),
            }
        }

        self.default_ttl.and_then(|ttl| now.checked_add_signed(ttl))
    }
}

fn clamp_ttl(seconds: i64) -> i64 {
    if seconds > MAX_TTL {
        debug!("有效期{}秒超出上限，截断为{}秒", seconds, MAX_TTL);
    }
    seconds.clamp(-MAX_TTL, MAX_TTL)
}

impl Middleware for ResponseCacheMiddleware {
    fn name(&self) -> &'static str {
        "response_cache"
    }

    fn run_before(&self, request: &Request) -> Option<Response> {
        if !request.method().is_safe() {
            return None;
        }
        let fingerprint = self.fingerprint(request);
        let record = self.store.load(&fingerprint)?;
        let record = match CacheRecord::decode(&record) {
            Some(record) => record,
            None => {
                warn!("[ID{}]缓存记录{}已损坏，按未命中处理", request.id(), fingerprint);
                return None;
            }
        };
        if !record.is_fresh(Utc::now()) {
            debug!("[ID{}]缓存记录{}已过期", request.id(), fingerprint);
            return None;
        }
        debug!(
            "[ID{}]缓存命中：{}，更新于{}",
            request.id(),
            request.path_qs(),
            record.updated
        );
        Some(record.response)
    }

    fn run_after(&self, request: &Request, response: Response) -> Response {
        if request.method() != HttpRequestMethod::Get || response.status_code() != 200 {
            return response;
        }
        let now = Utc::now();
        let valid_until = match self.expiration(&response, now) {
            Some(time) if time > now => time,
            _ => return response,
        };
        let record = match CacheRecord::encode(&response, valid_until, now) {
            Some(record) => record,
            None => return response,
        };

        let fingerprint = self.fingerprint(request);
        match self.store.save(&fingerprint, record) {
            Ok(()) => debug!(
                "[ID{}]缓存{}直到{}",
                request.id(),
                request.path_qs(),
                valid_until
            ),
            Err(e) => warn!("[ID{}]写入缓存记录{}失败：{}", request.id(), fingerprint, e),
        }
        response
    }
}
