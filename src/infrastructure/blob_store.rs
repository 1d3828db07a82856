//! Blob 存储 - 基础设施层
//!
//! 只暴露"按路径存取二进制"的能力，不认识提交记录

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::BlobError;
use crate::models::{BlobPath, Document};

/// Blob 存储客户端
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 上传文档，返回可用于读取的路径
    async fn upload(&self, document: &Document) -> Result<BlobPath, BlobError>;

    /// 按路径读取原始字节
    async fn read(&self, path: &BlobPath) -> Result<Bytes, BlobError>;
}

/// 生成唯一的存储文件名：`{uuid}-{清洗后的文件名}`
fn unique_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned = if cleaned.is_empty() { "upload" } else { cleaned };
    format!("{}-{}", Uuid::new_v4(), cleaned)
}

/// 本地文件系统实现
///
/// 所有文件平铺在 `root` 下，返回的路径形如 `/{name}`
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 把 blob 路径映射到根目录下的文件，拒绝越界路径
    fn resolve(&self, path: &BlobPath) -> Result<PathBuf, BlobError> {
        let relative = path.as_str().trim_start_matches('/');
        if relative.is_empty() {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        let candidate = Path::new(relative);
        if !candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(candidate))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, document: &Document) -> Result<BlobPath, BlobError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| BlobError::Io {
                path: self.root.display().to_string(),
                source,
            })?;

        let name = unique_name(&document.file_name);
        let target = self.root.join(&name);
        fs::write(&target, &document.bytes)
            .await
            .map_err(|source| BlobError::Io {
                path: target.display().to_string(),
                source,
            })?;

        debug!("已写入 blob: {} ({} 字节)", name, document.len());
        Ok(BlobPath::new(format!("/{}", name)))
    }

    async fn read(&self, path: &BlobPath) -> Result<Bytes, BlobError> {
        let target = self.resolve(path)?;
        match fs::read(&target).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(path.to_string()))
            }
            Err(source) => Err(BlobError::Io {
                path: target.display().to_string(),
                source,
            }),
        }
    }
}

/// 内存实现，记录读取次数
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
    reads: AtomicUsize,
    uploads: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已执行的读取次数（含失败）
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, path: &BlobPath) -> bool {
        self.blobs.read().await.contains_key(path.as_str())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, document: &Document) -> Result<BlobPath, BlobError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let path = format!("/{}", unique_name(&document.file_name));
        self.blobs
            .write()
            .await
            .insert(path.clone(), document.bytes.clone());
        Ok(BlobPath::new(path))
    }

    async fn read(&self, path: &BlobPath) -> Result<Bytes, BlobError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .read()
            .await
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }
}
