//! 视图资源登记表
//!
//! 每个轮询会话一份。从 Blob 存储取回的字节在这里登记为 `blob:` 对象 URL，
//! 被新一轮结果取代或会话结束时释放

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

/// 可展示的对象 URL：`blob:{uuid}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    fn fresh() -> Self {
        Self(format!("blob:{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 已登记的 blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedBlob {
    pub url: ObjectUrl,
    pub content_type: String,
    pub len: usize,
}

#[derive(Debug)]
struct Entry {
    content_type: String,
    bytes: Bytes,
}

/// 会话级对象 URL 登记表
#[derive(Debug, Default)]
pub struct ViewRegistry {
    live: Mutex<HashMap<ObjectUrl, Entry>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectUrl, Entry>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 登记一段字节，每次调用都生成新的 URL
    pub fn materialize(&self, bytes: Bytes, content_type: impl Into<String>) -> MaterializedBlob {
        let url = ObjectUrl::fresh();
        let content_type = content_type.into();
        let blob = MaterializedBlob {
            url: url.clone(),
            content_type: content_type.clone(),
            len: bytes.len(),
        };
        self.entries().insert(url, Entry { content_type, bytes });
        blob
    }

    /// 取回 URL 对应的内容类型和字节；已释放时返回 `None`
    pub fn resolve(&self, url: &ObjectUrl) -> Option<(String, Bytes)> {
        self.entries()
            .get(url)
            .map(|entry| (entry.content_type.clone(), entry.bytes.clone()))
    }

    pub fn release(&self, url: &ObjectUrl) -> bool {
        let released = self.entries().remove(url).is_some();
        if released {
            debug!("已释放 {}", url);
        }
        released
    }

    /// 释放全部，返回释放数量
    pub fn release_all(&self) -> usize {
        let mut entries = self.entries();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    pub fn is_live(&self, url: &ObjectUrl) -> bool {
        self.entries().contains_key(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_materialize_gets_a_fresh_url() {
        let registry = ViewRegistry::new();
        let a = registry.materialize(Bytes::from_static(b"png"), "image/png");
        let b = registry.materialize(Bytes::from_static(b"png"), "image/png");

        assert_ne!(a.url, b.url);
        assert!(a.url.as_str().starts_with("blob:"));
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_release_and_release_all() {
        let registry = ViewRegistry::new();
        let a = registry.materialize(Bytes::from_static(b"%PDF"), "application/pdf");
        let _b = registry.materialize(Bytes::from_static(b"png"), "image/png");

        let (content_type, bytes) = registry.resolve(&a.url).unwrap();
        assert_eq!(content_type, "application/pdf");
        assert_eq!(bytes, Bytes::from_static(b"%PDF"));

        assert!(registry.release(&a.url));
        assert!(!registry.release(&a.url));
        assert!(registry.resolve(&a.url).is_none());

        assert_eq!(registry.release_all(), 1);
        assert_eq!(registry.live_count(), 0);
    }
}
