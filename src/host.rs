// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 按 `Host` 标头（去掉端口）把请求分发到不同的服务。

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;

use crate::{middleware::Service, request::Request, response::Response};

#[derive(Default)]
pub struct VirtualHostRouter {
    hosts: HashMap<String, Arc<dyn Service>>,
}

impl VirtualHostRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一个服务可以绑定多个主机名；后注册的绑定覆盖先前的。
    pub fn register<S: Service + 'static>(mut self, service: S, hostnames: &[&str]) -> Self {
        self.register_shared(Arc::new(service), hostnames);
        self
    }

    pub fn register_shared(&mut self, service: Arc<dyn Service>, hostnames: &[&str]) {
        for hostname in hostnames {
            self.hosts
                .insert(hostname.to_ascii_lowercase(), Arc::clone(&service));
        }
    }

    pub fn hostnames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hosts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Service for VirtualHostRouter {
    fn call(&self, request: &Request) -> Response {
        let hostname = request.hostname();
        match self.hosts.get(&hostname.to_ascii_lowercase()) {
            Some(service) => service.call(request),
            None => {
                warn!("[ID{}]未配置的站点：{}，返回503", request.id(), hostname);
                let mut response = Response::new();
                response.set_code(503).set_content_type("text/plain").set_body(format!(
                    "The requested site ({}) is not currently configured.",
                    hostname
                ));
                response
            }
        }
    }
}
