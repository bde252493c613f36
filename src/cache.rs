// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应缓存存储
//!
//! 一条缓存记录由两部分组成：
//! - 第一行：JSON 元数据（有效期、更新时间、状态码、原因短语、响应日期、标头列表）；
//! - 换行符之后：原始响应体字节。
//!
//! 存储后端只负责按指纹存取字节，记录的编码与有效期判断由 `CacheRecord` 完成。

use std::{
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Mutex,
};

use bytes::Bytes;
use chrono::prelude::*;
use log::{debug, warn};
use lru::LruCache;
use serde_derive::{Deserialize, Serialize};

use crate::response::Response;

/// 记录中时间戳的格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// 内存存储容量为 0 时改用的容量
const FALLBACK_CAPACITY: usize = 5;

pub trait CacheStore: Send + Sync {
    fn load(&self, fingerprint: &str) -> Option<Bytes>;
    fn save(&self, fingerprint: &str, record: Bytes) -> io::Result<()>;
}

/// 每个指纹对应缓存目录下的一个文件
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CacheStore for DiskStore {
    fn load(&self, fingerprint: &str) -> Option<Bytes> {
        fs::read(self.dir.join(fingerprint)).ok().map(Bytes::from)
    }

    fn save(&self, fingerprint: &str, record: Bytes) -> io::Result<()> {
        fs::write(self.dir.join(fingerprint), &record)
    }
}

/// 容量受限的 LRU 内存存储
pub struct MemoryStore {
    cache: Mutex<LruCache<String, Bytes>>,
}

impl MemoryStore {
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or_else(|| {
            warn!("缓存容量被设置为0，改为{}", FALLBACK_CAPACITY);
            NonZeroUsize::new(FALLBACK_CAPACITY).unwrap_or(NonZeroUsize::MIN)
        });
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Bytes>> {
        match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, fingerprint: &str) -> Option<Bytes> {
        self.lock().get(fingerprint).cloned()
    }

    fn save(&self, fingerprint: &str, record: Bytes) -> io::Result<()> {
        self.lock().put(fingerprint.to_string(), record);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct RecordMeta {
    valid_until: String,
    updated: String,
    status: u16,
    reason: String,
    date: String,
    headers: Vec<(String, String)>,
}

/// 解码后的缓存记录
#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub valid_until: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub response: Response,
}

impl CacheRecord {
    /// 编码一个响应。流式（文件）响应体无法缓存，返回 `None`。
    pub fn encode(
        response: &Response,
        valid_until: DateTime<Utc>,
        updated: DateTime<Utc>,
    ) -> Option<Bytes> {
        let body = response.body_bytes()?;
        let meta = RecordMeta {
            valid_until: format_timestamp(&valid_until),
            updated: format_timestamp(&updated),
            status: response.status_code(),
            reason: response.information().to_string(),
            date: format_timestamp(&response.date()),
            headers: response.headers().to_vec(),
        };
        let mut record = match serde_json::to_vec(&meta) {
            Ok(record) => record,
            Err(e) => {
                warn!("缓存元数据序列化失败：{}", e);
                return None;
            }
        };
        record.push(b'\n');
        record.extend_from_slice(&body);
        Some(Bytes::from(record))
    }

    /// 解码记录。任何一部分无法解析都视为损坏，返回 `None`。
    pub fn decode(record: &Bytes) -> Option<Self> {
        let split = record.iter().position(|&b| b == b'\n')?;
        let meta: RecordMeta = match serde_json::from_slice(&record[..split]) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("缓存元数据无法解析：{}", e);
                return None;
            }
        };
        let valid_until = parse_timestamp(&meta.valid_until)?;
        let updated = parse_timestamp(&meta.updated)?;
        let date = parse_timestamp(&meta.date)?;
        let response = Response::from_parts(
            meta.status,
            &meta.reason,
            meta.headers,
            date,
            record.slice(split + 1..),
        );
        Some(Self {
            valid_until,
            updated,
            response,
        })
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample() -> Response {
        let mut response = Response::new();
        response
            .set_content_type("text/plain")
            .set_header("Cache-Control", "max-age=60")
            .set_body("cached\nbody");
        response
    }

    #[test]
    fn test_record_restores_identical_bytes() {
        let response = sample();
        let now = Utc::now();
        let record = CacheRecord::encode(&response, now + Duration::seconds(60), now).unwrap();

        let first_line = record.split(|&b| b == b'\n').next().unwrap();
        assert!(serde_json::from_slice::<serde_json::Value>(first_line).is_ok());

        let decoded = CacheRecord::decode(&record).unwrap();
        assert_eq!(decoded.response.as_bytes(), response.as_bytes());
        assert!(decoded.is_fresh(now));
        assert!(!decoded.is_fresh(now + Duration::seconds(61)));
    }

    #[test]
    fn test_corrupt_records_are_rejected() {
        assert!(CacheRecord::decode(&Bytes::from_static(b"no newline")).is_none());
        assert!(CacheRecord::decode(&Bytes::from_static(b"{not json}\nbody")).is_none());

        let bad_time = br#"{"valid_until":"yesterday","updated":"2026-01-01T00:00:00.000000Z","status":200,"reason":"OK","date":"2026-01-01T00:00:00.000000Z","headers":[]}
body"#;
        assert!(CacheRecord::decode(&Bytes::from_static(bad_time)).is_none());
    }

    #[test]
    fn test_streaming_response_is_not_encoded() {
        let mut response = Response::new();
        response.set_file(Path::new("/tmp/whatever"), 10);
        assert!(CacheRecord::encode(&response, Utc::now(), Utc::now()).is_none());
    }

    #[test]
    fn test_timestamp_format() {
        let time = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(format_timestamp(&time), "2026-03-04T05:06:07.000000Z");
        assert_eq!(parse_timestamp("2026-03-04T05:06:07.000000Z"), Some(time));
        assert_eq!(parse_timestamp("garbage"), None);
    }

    #[test]
    fn test_disk_store() {
        let dir = TempDir::new().unwrap();
        let store = DiskStore::new(dir.path().join("nested/cache")).unwrap();

        assert!(store.load("abc").is_none());
        store.save("abc", Bytes::from_static(b"one")).unwrap();
        store.save("abc", Bytes::from_static(b"two")).unwrap();
        assert_eq!(store.load("abc"), Some(Bytes::from_static(b"two")));
        assert!(store.dir().join("abc").is_file());
    }

    #[test]
    fn test_memory_store_lru_eviction() {
        let store = MemoryStore::from_capacity(2);
        store.save("a", Bytes::from_static(b"1")).unwrap();
        store.save("b", Bytes::from_static(b"2")).unwrap();
        store.load("a");
        store.save("c", Bytes::from_static(b"3")).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.load("b").is_none());
        assert!(store.load("a").is_some());
        assert!(store.load("c").is_some());
    }

    #[test]
    fn test_memory_store_zero_capacity() {
        let store = MemoryStore::from_capacity(0);
        assert_eq!(store.capacity(), FALLBACK_CAPACITY);
        assert!(store.is_empty());
    }
}
