//! # Resume Review
//!
//! 简历提交与 AI 分析结果投递
//!
//! ## 架构设计
//!
//! 写入端和读取端只通过持久化记录（`resume:{id}`）协作，不共享内存状态。
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 外部存储，只暴露能力
//! - `BlobStore` - 按路径存取二进制
//! - `RecordStore` - 按键存取字符串
//!
//! ### ② 业务能力层（Clients / Services）
//! - `clients/` - `AnalysisClient` 分析服务
//! - `services/` - 文档转换、分析指令、对象 URL 登记
//!
//! ### ③ 流程层（Workflow）
//! - `SubmissionFlow` - 上传 → 转换 → 持久化 → 分析 → 持久化
//! - `ResolutionPoller` - 轮询记录直到终态，视图由 `poll_state::reduce` 产生
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量处理 TOML 任务，管理资源和并发
//! - `orchestrator/submission_processor` - 单个任务：同时驱动写入端和读取端
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod testing;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, PollError, SubmissionError};
pub use models::{SubmissionId, SubmissionInput, SubmissionRecord, Verdict};
pub use orchestrator::App;
pub use workflow::{
    PollSession, PollStatus, ResolutionPoller, ResolutionView, SubmissionFlow, SubmissionHandle,
};
