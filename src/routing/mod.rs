// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 路由：模板编译、路由打分与分发。

pub mod pattern;
pub mod route;
pub mod router;

pub use pattern::{MatchResult, PathPattern};
pub use route::Route;
pub use router::{RouteMatch, Router};
