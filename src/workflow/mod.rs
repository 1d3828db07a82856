//! 流程层（Workflow）
//!
//! - `SubmissionFlow` - 写入端：上传、转换、分析、持久化
//! - `ResolutionPoller` - 读取端：轮询记录直到终态
//! - `poll_state` - 读取端视图的状态机

pub mod poll_state;
pub mod resolution_poller;
pub mod submission_ctx;
pub mod submission_flow;

pub use poll_state::{reduce, PollEvent, PollStatus, ResolutionView};
pub use resolution_poller::{PollSession, ResolutionPoller, DEFAULT_POLL_INTERVAL};
pub use submission_ctx::SubmissionCtx;
pub use submission_flow::{
    extract_verdict, SubmissionFlow, SubmissionHandle, SubmissionProgress, SubmissionStage,
};
