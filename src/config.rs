// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::warn;
use std::fs;

use crate::{exception::Exception, middleware::response_cache::MAX_TTL};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default = "default_static_root")]
    static_root: String,
    #[serde(default = "default_static_prefix")]
    static_prefix: String,
    /// 为空时使用内存缓存
    #[serde(default = "default_cache_dir")]
    cache_dir: String,
    /// 响应没有过期信息时的默认缓存秒数，0 表示不缓存这类响应
    #[serde(default = "default_cache_ttl")]
    cache_ttl: i64,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_streaming_threshold")]
    streaming_threshold: u64,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
}

fn default_port() -> u16 {
    7878
}

fn default_local() -> bool {
    true
}

fn default_static_root() -> String {
    "static".to_string()
}

fn default_static_prefix() -> String {
    "/static".to_string()
}

fn default_cache_dir() -> String {
    ".cache".to_string()
}

fn default_cache_ttl() -> i64 {
    60
}

fn default_cache_size() -> usize {
    64
}

fn default_streaming_threshold() -> u64 {
    10485760 // 10MB
}

fn default_chunk_size() -> usize {
    262144 // 256KB
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            worker_threads: num_cpus::get(),
            local: default_local(),
            static_root: default_static_root(),
            static_prefix: default_static_prefix(),
            cache_dir: default_cache_dir(),
            cache_ttl: default_cache_ttl(),
            cache_size: default_cache_size(),
            streaming_threshold: default_streaming_threshold(),
            chunk_size: default_chunk_size(),
        }
    }

    /// 读取并解析 TOML 配置文件
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let text = fs::read_to_string(filename)
            .map_err(|e| Exception::InvalidConfig(format!("无法读取{}：{}", filename, e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, Exception> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| Exception::InvalidConfig(e.to_string()))?;
        if config.worker_threads == 0 {
            config.worker_threads = num_cpus::get();
        }
        if config.chunk_size == 0 {
            warn!("chunk_size被设置为0，改为{}", default_chunk_size());
            config.chunk_size = default_chunk_size();
        }
        if !(0..=MAX_TTL).contains(&config.cache_ttl) {
            return Err(Exception::InvalidConfig(format!(
                "cache_ttl必须在0到{}之间：{}",
                MAX_TTL, config.cache_ttl
            )));
        }
        Ok(config)
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn static_root(&self) -> &str {
        &self.static_root
    }

    pub fn static_prefix(&self) -> &str {
        &self.static_prefix
    }

    pub fn cache_dir(&self) -> &str {
        &self.cache_dir
    }

    pub fn cache_ttl(&self) -> i64 {
        self.cache_ttl
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn streaming_threshold(&self) -> u64 {
        self.streaming_threshold
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
