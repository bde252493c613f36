// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod application;
pub mod cache;
pub mod config;
pub mod exception;
pub mod host;
pub mod middleware;
pub mod param;
pub mod request;
pub mod response;
pub mod routing;
pub mod util;

pub use application::{Application, Handler, HandlerContext, Reply};
pub use cache::{CacheStore, DiskStore, MemoryStore};
pub use config::Config;
pub use exception::Exception;
pub use host::VirtualHostRouter;
pub use middleware::{
    apply_middleware, ChainBuilder, CompressionMiddleware, FnMiddleware, Middleware,
    RedirectionMiddleware, ResponseCacheMiddleware, Service, Shortener, StaticFileMiddleware,
};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::{Body, Response};
pub use util::HtmlBuilder;
