//! 测试替身
//!
//! 供单元测试和 `tests/` 下的集成测试使用，不访问任何外部服务

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::clients::{AnalysisClient, AnalysisResponse};
use crate::error::{AnalysisError, BlobError, RecordStoreError};
use crate::infrastructure::{BlobStore, MemoryBlobStore, MemoryRecordStore, RecordStore};
use crate::models::{BlobPath, Document, RecordKey};
use crate::services::{ConversionOutput, DocumentConverter};

/// 最小的 PNG 文件头，足够当预览图
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-preview";

/// 最小的 PDF 文件头
pub const FAKE_PDF: &[u8] = b"%PDF-1.7\nfake-resume\n%%EOF";

// ========== 分析服务 ==========

/// 总是返回同一份响应
#[derive(Debug)]
pub struct StaticAnalysisClient {
    response: AnalysisResponse,
    calls: AtomicUsize,
    last_request: Mutex<Option<(BlobPath, String)>>,
}

impl StaticAnalysisClient {
    pub fn new(response: AnalysisResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// 以纯文本形式返回 `content`
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(AnalysisResponse::text(content))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 最近一次调用的文档路径和指令
    pub fn last_request(&self) -> Option<(BlobPath, String)> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl AnalysisClient for StaticAnalysisClient {
    async fn feedback(
        &self,
        document: &BlobPath,
        instructions: &str,
    ) -> Result<AnalysisResponse, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some((document.clone(), instructions.to_string()));
        Ok(self.response.clone())
    }
}

/// 总是拒绝
#[derive(Debug, Default)]
pub struct FailingAnalysisClient;

#[async_trait]
impl AnalysisClient for FailingAnalysisClient {
    async fn feedback(
        &self,
        _document: &BlobPath,
        _instructions: &str,
    ) -> Result<AnalysisResponse, AnalysisError> {
        Err(AnalysisError::Rejected("service unavailable".to_string()))
    }
}

/// 永远不返回
#[derive(Debug, Default)]
pub struct PendingAnalysisClient {
    calls: AtomicUsize,
}

impl PendingAnalysisClient {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisClient for PendingAnalysisClient {
    async fn feedback(
        &self,
        _document: &BlobPath,
        _instructions: &str,
    ) -> Result<AnalysisResponse, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<AnalysisResponse, AnalysisError>>().await
    }
}

// ========== 文档转换 ==========

/// 把任意文档"转换"成固定的 PNG
#[derive(Debug, Clone)]
pub struct StaticConverter {
    image: Bytes,
}

impl StaticConverter {
    pub fn new() -> Self {
        Self {
            image: Bytes::from_static(FAKE_PNG),
        }
    }
}

impl Default for StaticConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentConverter for StaticConverter {
    async fn convert(&self, document: &Document) -> ConversionOutput {
        ConversionOutput::converted(Document::new(
            format!("{}.png", document.stem()),
            "image/png",
            self.image.clone(),
        ))
    }
}

/// 总是没有输出文件
#[derive(Debug, Default)]
pub struct FailingConverter;

#[async_trait]
impl DocumentConverter for FailingConverter {
    async fn convert(&self, _document: &Document) -> ConversionOutput {
        ConversionOutput::default()
    }
}

// ========== 存储 ==========

/// 前 `allowed_uploads` 次上传成功，之后全部失败
#[derive(Debug)]
pub struct FailingBlobStore {
    inner: MemoryBlobStore,
    allowed_uploads: usize,
    uploads: AtomicUsize,
}

impl FailingBlobStore {
    /// 所有上传都失败
    pub fn new() -> Self {
        Self::after(0)
    }

    pub fn after(allowed_uploads: usize) -> Self {
        Self {
            inner: MemoryBlobStore::new(),
            allowed_uploads,
            uploads: AtomicUsize::new(0),
        }
    }
}

impl Default for FailingBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn upload(&self, document: &Document) -> Result<BlobPath, BlobError> {
        if self.uploads.fetch_add(1, Ordering::SeqCst) >= self.allowed_uploads {
            return Err(BlobError::Backend("upload rejected".to_string()));
        }
        self.inner.upload(document).await
    }

    async fn read(&self, path: &BlobPath) -> Result<Bytes, BlobError> {
        self.inner.read(path).await
    }
}

/// 所有读写都失败
#[derive(Debug, Default)]
pub struct FailingRecordStore;

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn get(&self, _key: &RecordKey) -> Result<Option<String>, RecordStoreError> {
        Err(RecordStoreError::Backend("store unreachable".to_string()))
    }

    async fn set(&self, _key: &RecordKey, _value: &str) -> Result<(), RecordStoreError> {
        Err(RecordStoreError::Backend("store unreachable".to_string()))
    }
}

/// 每次 `get` 先等待一段时间再读内层存储
#[derive(Debug)]
pub struct SlowRecordStore {
    inner: Arc<MemoryRecordStore>,
    delay: Duration,
}

impl SlowRecordStore {
    pub fn new(inner: Arc<MemoryRecordStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl RecordStore for SlowRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<String>, RecordStoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &RecordKey, value: &str) -> Result<(), RecordStoreError> {
        self.inner.set(key, value).await
    }
}
