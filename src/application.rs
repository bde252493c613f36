// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用核心
//!
//! `Application` 持有路由表，负责把一个请求分发到处理器：
//! 1. 交给 `Router` 找到分数最高的匹配路由，找不到返回 404 页面；
//! 2. 在处理器的方法表中查找请求方法对应的函数，没有则返回 405 页面；
//! 3. 以匹配参数构造 `HandlerContext` 调用处理器，并把 `Reply` 转换为响应。
//!
//! 每个请求恰好调用一次处理器函数，不做重试。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::{
    exception::Exception,
    middleware::Service,
    param::{HttpRequestMethod, DEFAULT_CONTENT_TYPE},
    request::Request,
    response::Response,
    routing::{MatchResult, Route, Router},
};

/// 处理器函数。接收调用上下文，返回 `Reply`。
pub type HandlerFn = Arc<dyn Fn(&mut HandlerContext<'_>) -> Reply + Send + Sync>;

/// 一次处理器调用的上下文
pub struct HandlerContext<'a> {
    pub request: &'a Request,
    /// 预先创建的响应，处理器可以就地修改
    pub response: Response,
    /// 命名参数或位置参数，二者不会同时出现
    pub args: MatchResult,
}

/// 处理器的返回值
#[derive(Debug)]
pub enum Reply {
    /// 文本，写入响应体
    Text(String),
    /// 构造好的完整响应，原样返回
    Response(Response),
    /// 无返回值，使用上下文中被修改过的响应
    Empty,
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

/// 路由处理器：HTTP 方法到处理函数的显式映射，在注册时确定。
#[derive(Clone, Default)]
pub struct Handler {
    methods: BTreeMap<HttpRequestMethod, HandlerFn>,
    /// 响应所有方法的函数，优先级低于显式登记的方法
    fallback: Option<HandlerFn>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对任意方法都调用同一个函数
    pub fn any<F, R>(f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        Self {
            methods: BTreeMap::new(),
            fallback: Some(handler_fn(f)),
        }
    }

    pub fn on<F, R>(mut self, method: HttpRequestMethod, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.methods.insert(method, handler_fn(f));
        self
    }

    pub fn get<F, R>(self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.on(HttpRequestMethod::Get, f)
    }

    pub fn head<F, R>(self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.on(HttpRequestMethod::Head, f)
    }

    pub fn post<F, R>(self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.on(HttpRequestMethod::Post, f)
    }

    pub fn put<F, R>(self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.on(HttpRequestMethod::Put, f)
    }

    pub fn delete<F, R>(self, f: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.on(HttpRequestMethod::Delete, f)
    }

    /// 查找请求方法对应的函数
    pub fn resolve(&self, method: HttpRequestMethod) -> Option<&HandlerFn> {
        self.methods.get(&method).or(self.fallback.as_ref())
    }

    /// 处理器支持的方法，用于 405 响应的 `Allow` 标头
    pub fn allowed_methods(&self) -> Vec<HttpRequestMethod> {
        if self.fallback.is_some() {
            return HttpRequestMethod::ALL.to_vec();
        }
        self.methods.keys().copied().collect()
    }
}

fn handler_fn<F, R>(f: F) -> HandlerFn
where
    F: Fn(&mut HandlerContext<'_>) -> R + Send + Sync + 'static,
    R: Into<Reply>,
{
    Arc::new(move |ctx: &mut HandlerContext<'_>| f(ctx).into())
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Application {
    router: Router<Handler>,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构造路由并注册。模板非法或名称重复时返回错误。
    pub fn register_route(
        &mut self,
        template: &str,
        handler: Handler,
        name: Option<&str>,
        allow_prefix: bool,
    ) -> Result<&mut Self, Exception> {
        let route = Route::new(template, handler, name, allow_prefix)?;
        self.router.register(route)?;
        Ok(self)
    }

    pub fn route(&mut self, template: &str, handler: Handler) -> Result<&mut Self, Exception> {
        self.register_route(template, handler, None, false)
    }

    pub fn named_route(
        &mut self,
        name: &str,
        template: &str,
        handler: Handler,
    ) -> Result<&mut Self, Exception> {
        self.register_route(template, handler, Some(name), false)
    }

    /// 由路由名称和字段值生成 URL
    pub fn url_for(&self, name: &str, bindings: &[(&str, &str)]) -> Result<String, Exception> {
        let bindings: HashMap<String, String> = bindings
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.router.resolve_url(name, &bindings)
    }

    pub fn router(&self) -> &Router<Handler> {
        &self.router
    }

    /// 分发单个请求，总是得到一个响应
    pub fn dispatch(&self, request: &Request) -> Response {
        let id = request.id();
        match self.invoke(request) {
            Ok(response) => response,
            Err(Exception::NotFound(path)) => {
                warn!("[ID{}]请求的路径：{} 不存在，返回404", id, path);
                Response::response_404()
            }
            Err(Exception::MethodNotAllowed { method, allowed }) => {
                warn!("[ID{}]路径{}不支持{}方法，返回405", id, request.path(), method);
                Response::response_405(&allowed)
            }
            Err(e) => {
                warn!("[ID{}]处理请求时发生异常: {}", id, e);
                Response::response_500()
            }
        }
    }

    fn invoke(&self, request: &Request) -> Result<Response, Exception> {
        let matched = self.router.dispatch(request.path())?;
        let method = request.method();
        let handler = matched.route.handler();
        let function = handler
            .resolve(method)
            .ok_or_else(|| Exception::MethodNotAllowed {
                method,
                allowed: handler.allowed_methods(),
            })?;

        debug!(
            "[ID{}]调用处理器 {} {}，参数：{:?}",
            request.id(),
            method,
            matched.route.pattern().raw(),
            matched.args
        );
        let mut ctx = HandlerContext {
            request,
            response: Response::new(),
            args: matched.args,
        };
        let reply = function(&mut ctx);

        let response = match reply {
            Reply::Text(text) => {
                let mut response = ctx.response;
                if response.content_type().is_none() {
                    response.set_content_type(DEFAULT_CONTENT_TYPE);
                }
                response.write(&text);
                response
            }
            Reply::Response(response) => response,
            Reply::Empty => ctx.response,
        };
        Ok(response)
    }
}

impl Service for Application {
    fn call(&self, request: &Request) -> Response {
        self.dispatch(request)
    }
}
