// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由表
//!
//! 路由按注册顺序保存；分发顺序（按分数降序，同分按注册顺序）在注册时计算好，
//! 服务期间路由表只读，分发时无需排序也无需加锁。

use std::collections::HashMap;

use log::debug;

use crate::exception::Exception;

use super::{pattern::MatchResult, route::Route};

/// 分发结果：命中的路由与匹配参数
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub args: MatchResult,
}

#[derive(Debug, Clone)]
pub struct Router<H> {
    routes: Vec<Route<H>>,
    /// 名称 → `routes` 中的下标
    named_routes: HashMap<String, usize>,
    /// 分发时依次尝试的下标
    order: Vec<usize>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            named_routes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// 注册路由。重名时返回错误且路由表保持不变。
    pub fn register(&mut self, route: Route<H>) -> Result<(), Exception> {
        let index = self.routes.len();
        if let Some(name) = route.name() {
            if self.named_routes.contains_key(name) {
                return Err(Exception::DuplicateName(name.to_string()));
            }
            self.named_routes.insert(name.to_string(), index);
        }
        debug!(
            "注册路由 {} (score {})",
            route.pattern().raw(),
            route.specificity()
        );
        self.routes.push(route);

        let routes = &self.routes;
        self.order = (0..routes.len()).collect();
        // 稳定排序，同分保持注册顺序
        self.order
            .sort_by(|&a, &b| routes[b].specificity().cmp(&routes[a].specificity()));
        Ok(())
    }

    /// 返回分数最高的匹配路由
    pub fn dispatch(&self, path: &str) -> Result<RouteMatch<'_, H>, Exception> {
        for &index in &self.order {
            let route = &self.routes[index];
            if let Some(args) = route.matches(path) {
                debug!("路径{}命中路由{}", path, route.pattern().raw());
                return Ok(RouteMatch { route, args });
            }
        }
        Err(Exception::NotFound(path.to_string()))
    }

    /// 由路由名称与字段绑定生成 URL
    pub fn resolve_url(
        &self,
        name: &str,
        bindings: &HashMap<String, String>,
    ) -> Result<String, Exception> {
        let index = self
            .named_routes
            .get(name)
            .ok_or_else(|| Exception::UnknownRouteName(name.to_string()))?;
        self.routes[*index].pattern().reverse(bindings)
    }

    /// 注册顺序的路由列表
    pub fn routes(&self) -> &[Route<H>] {
        &self.routes
    }

    pub fn route_named(&self, name: &str) -> Option<&Route<H>> {
        self.named_routes.get(name).map(|&index| &self.routes[index])
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
