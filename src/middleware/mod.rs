// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 中间件链
//!
//! 每一层中间件包裹着内层的 `Service`（另一层中间件，或最终的 `Application`）：
//! 1. 先调用 `run_before`，若返回响应则直接返回，内层不会被调用；
//! 2. 否则调用内层得到响应；
//! 3. 再调用 `run_after` 对响应做后处理并返回。
//!
//! 多层嵌套形成洋葱结构：最先注册的中间件最先看到请求、最后看到响应。
//! 链在启动时一次性构建，服务期间只读。

pub mod compression;
pub mod redirect;
pub mod response_cache;
pub mod static_files;

use std::sync::Arc;

use log::debug;

use crate::{request::Request, response::Response};

pub use compression::CompressionMiddleware;
pub use redirect::{RedirectionMiddleware, Shortener};
pub use response_cache::ResponseCacheMiddleware;
pub use static_files::StaticFileMiddleware;

/// 能把请求变成响应的任何东西
pub trait Service: Send + Sync {
    fn call(&self, request: &Request) -> Response;
}

impl<F> Service for F
where
    F: Fn(&Request) -> Response + Send + Sync,
{
    fn call(&self, request: &Request) -> Response {
        self(request)
    }
}

/// 请求 / 响应拦截器
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    /// 返回 `Some` 时短路，内层不再被调用
    fn run_before(&self, _request: &Request) -> Option<Response> {
        None
    }

    fn run_after(&self, _request: &Request, response: Response) -> Response {
        response
    }
}

/// 链上的一个节点：独占内层 `Service`，共享中间件本身
pub struct Layered {
    middleware: Arc<dyn Middleware>,
    upstream: Box<dyn Service>,
}

impl Layered {
    pub fn new(middleware: Arc<dyn Middleware>, upstream: Box<dyn Service>) -> Self {
        Self {
            middleware,
            upstream,
        }
    }
}

impl Service for Layered {
    fn call(&self, request: &Request) -> Response {
        if let Some(intercepted) = self.middleware.run_before(request) {
            debug!(
                "[ID{}]请求被中间件{}拦截",
                request.id(),
                self.middleware.name()
            );
            return intercepted;
        }
        let response = self.upstream.call(request);
        self.middleware.run_after(request, response)
    }
}

/// 给 `service` 套上一层中间件
pub fn apply_middleware<S, M>(service: S, middleware: M) -> Layered
where
    S: Service + 'static,
    M: Middleware + 'static,
{
    Layered::new(Arc::new(middleware), Box::new(service))
}

/// 按注册顺序由外到内组装中间件链
pub struct ChainBuilder {
    core: Box<dyn Service>,
    layers: Vec<Arc<dyn Middleware>>,
}

impl ChainBuilder {
    pub fn new<S: Service + 'static>(core: S) -> Self {
        Self {
            core: Box::new(core),
            layers: Vec::new(),
        }
    }

    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn with_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.layers.push(middleware);
        self
    }

    /// `with(a).with(b)` 得到 `a(b(core))`
    pub fn build(self) -> Box<dyn Service> {
        let mut service = self.core;
        for middleware in self.layers.into_iter().rev() {
            debug!("装配中间件{}", middleware.name());
            service = Box::new(Layered::new(middleware, service));
        }
        service
    }
}

type BeforeHook = Box<dyn Fn(&Request) -> Option<Response> + Send + Sync>;
type AfterHook = Box<dyn Fn(&Request, Response) -> Response + Send + Sync>;

/// 由闭包构成的中间件，两个钩子都可以缺省
pub struct FnMiddleware {
    name: &'static str,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl FnMiddleware {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            before: None,
            after: None,
        }
    }

    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(hook));
        self
    }

    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request, Response) -> Response + Send + Sync + 'static,
    {
        self.after = Some(Box::new(hook));
        self
    }
}

impl Middleware for FnMiddleware {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run_before(&self, request: &Request) -> Option<Response> {
        self.before.as_ref().and_then(|hook| hook(request))
    }

    fn run_after(&self, request: &Request, response: Response) -> Response {
        match &self.after {
            Some(hook) => hook(request, response),
            None => response,
        }
    }
}
