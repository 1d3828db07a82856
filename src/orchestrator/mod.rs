//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，只被二进制入口使用。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量简历处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载提交任务（Vec<SubmissionJob>）
//! - 控制并发数量（Semaphore）
//! - 输出全局统计信息
//!
//! ### `submission_processor` - 单份简历处理器
//! - 启动写入端（SubmissionFlow）
//! - 拿到 ID 后打开读取端（PollSession）
//! - 输出单份简历的结果
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<SubmissionJob>)
//!     ↓
//! submission_processor (处理单个 SubmissionJob)
//!     ↓
//! workflow::{SubmissionFlow, ResolutionPoller}
//!     ↓
//! services / clients (转换、指令、分析)
//!     ↓
//! infrastructure (BlobStore、RecordStore)
//! ```

pub mod batch_processor;
pub mod submission_processor;

pub use batch_processor::{App, ProcessingStats};
pub use submission_processor::process_submission;
