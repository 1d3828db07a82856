//! 记录存储 - 基础设施层
//!
//! 字符串键值存储：`get` / `set`，后写覆盖

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::RecordStoreError;
use crate::models::RecordKey;

/// 记录存储客户端
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 读取键对应的值，不存在时返回 `None`
    async fn get(&self, key: &RecordKey) -> Result<Option<String>, RecordStoreError>;

    /// 写入（覆盖）键对应的值
    async fn set(&self, key: &RecordKey, value: &str) -> Result<(), RecordStoreError>;
}

/// 本地文件系统实现
///
/// 每个键一个文件；先写临时文件再 rename，其他进程的读取端不会读到半截内容
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_for(&self, key: &RecordKey) -> PathBuf {
        let name: String = key
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", name))
    }

    fn io_error(key: &RecordKey, source: std::io::Error) -> RecordStoreError {
        RecordStoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<String>, RecordStoreError> {
        match fs::read_to_string(self.file_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn set(&self, key: &RecordKey, value: &str) -> Result<(), RecordStoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_error(key, e))?;

        // 临时文件在任何失败分支上随 guard 一起删除
        let staging = tempfile::Builder::new()
            .prefix(".record-")
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(|e| Self::io_error(key, e))?;
        let mut file = fs::File::from_std(staging.reopen().map_err(|e| Self::io_error(key, e))?);
        file.write_all(value.as_bytes())
            .await
            .map_err(|e| Self::io_error(key, e))?;
        file.flush().await.map_err(|e| Self::io_error(key, e))?;
        drop(file);

        staging
            .persist(self.file_for(key))
            .map_err(|e| Self::io_error(key, e.error))?;

        debug!("已写入记录: {} ({} 字节)", key, value.len());
        Ok(())
    }
}

/// 内存实现
///
/// 记录读取次数和完整写入历史
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    values: RwLock<HashMap<String, String>>,
    history: Mutex<Vec<(String, String)>>,
    gets: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已执行的 `get` 次数
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// 指定键的所有写入，按时间顺序
    pub fn writes_for(&self, key: &RecordKey) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|(k, _)| k == key.as_str())
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<String>, RecordStoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.values.read().await.get(key.as_str()).cloned())
    }

    async fn set(&self, key: &RecordKey, value: &str) -> Result<(), RecordStoreError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((key.to_string(), value.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubmissionId;

    #[tokio::test]
    async fn test_fs_get_missing_then_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path().join("records"));
        let key = RecordKey::for_submission(&SubmissionId::new());

        assert_eq!(store.get(&key).await.unwrap(), None);

        store.set(&key, r#"{"status":"processing"}"#).await.unwrap();
        store.set(&key, r#"{"status":"complete"}"#).await.unwrap();
        assert_eq!(
            store.get(&key).await.unwrap().as_deref(),
            Some(r#"{"status":"complete"}"#)
        );
    }

    #[tokio::test]
    async fn test_fs_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        let key = RecordKey::for_submission(&SubmissionId::new());
        store.set(&key, "{}").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("resume_"));
        assert!(names[0].ends_with(".json"));
    }

    #[tokio::test]
    async fn test_fs_failed_write_removes_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path());
        let key = RecordKey::for_submission(&SubmissionId::new());

        // 目标路径被目录占用，rename 必然失败
        std::fs::create_dir(store.file_for(&key)).unwrap();

        let err = store.set(&key, r#"{"status":"processing"}"#).await.unwrap_err();
        assert!(matches!(err, RecordStoreError::Io { .. }));

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(!names[0].ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_memory_tracks_gets_and_writes() {
        let store = MemoryRecordStore::new();
        let key = RecordKey::for_submission(&SubmissionId::new());

        assert_eq!(store.get(&key).await.unwrap(), None);
        store.set(&key, "a").await.unwrap();
        store.set(&key, "a").await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.get_count(), 2);
        assert_eq!(store.writes_for(&key), vec!["a".to_string(), "a".to_string()]);
    }
}
