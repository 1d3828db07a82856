//! 基础设施层（Infrastructure）
//!
//! 持有外部存储，只暴露能力：
//! - `BlobStore` - 按路径存取二进制
//! - `RecordStore` - 按键存取字符串

pub mod blob_store;
pub mod record_store;

pub use blob_store::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use record_store::{FsRecordStore, MemoryRecordStore, RecordStore};
