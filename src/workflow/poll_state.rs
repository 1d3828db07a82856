//! 轮询状态机
//!
//! 读取端视图只能通过 [`reduce`] 更新：`loading → {processing | complete | error}`，
//! `processing → {complete | error}`。`complete` 和 `error` 是终态，吸收之后的所有事件

use crate::models::{RecordStatus, Verdict};
use crate::services::{MaterializedBlob, ObjectUrl};

pub const MSG_LOADING: &str = "Loading your resume...";
pub const MSG_PROCESSING: &str =
    "We are analyzing your resume. This usually takes less than a minute.";
pub const MSG_COMPLETE: &str = "Your AI feedback is ready.";
pub const MSG_NOT_FOUND: &str = "We could not find that resume. Try uploading it again.";
pub const MSG_LOAD_FAILED: &str = "We ran into a problem loading your resume.";
pub const MSG_EXHAUSTED: &str = "We are still waiting on your analysis. Please check back later.";

/// 视图状态，`loading` 和 `error` 只存在于内存中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Loading,
    Processing,
    Complete,
    Error,
}

impl PollStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollStatus::Complete | PollStatus::Error)
    }
}

/// 读取端对外暴露的视图
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionView {
    pub status: PollStatus,
    pub status_message: String,
    pub feedback: Option<Verdict>,
    pub resume: Option<MaterializedBlob>,
    pub image: Option<MaterializedBlob>,
    /// 已完成的读取次数
    pub attempts: u32,
}

impl ResolutionView {
    pub fn loading() -> Self {
        Self {
            status: PollStatus::Loading,
            status_message: MSG_LOADING.to_string(),
            feedback: None,
            resume: None,
            image: None,
            attempts: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 视图当前引用的对象 URL
    pub fn object_urls(&self) -> Vec<&ObjectUrl> {
        self.resume
            .iter()
            .chain(self.image.iter())
            .map(|blob| &blob.url)
            .collect()
    }
}

impl Default for ResolutionView {
    fn default() -> Self {
        Self::loading()
    }
}

/// 一次读取的结果
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// 记录不存在
    Missing,
    /// 记录无法解析
    Corrupt,
    /// 记录存储不可用
    Unavailable,
    /// 读到记录；`status` 是有效状态
    Observed {
        status: RecordStatus,
        feedback: Option<Verdict>,
        resume: Option<MaterializedBlob>,
        image: Option<MaterializedBlob>,
    },
    /// 超过最大读取次数仍未完成
    Exhausted,
}

impl PollEvent {
    /// 事件携带的新对象 URL
    pub fn object_urls(&self) -> Vec<&ObjectUrl> {
        match self {
            PollEvent::Observed { resume, image, .. } => resume
                .iter()
                .chain(image.iter())
                .map(|blob| &blob.url)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// 状态迁移
pub fn reduce(view: &ResolutionView, event: PollEvent) -> ResolutionView {
    if view.is_terminal() {
        return view.clone();
    }

    match event {
        PollEvent::Missing => fail(view, MSG_NOT_FOUND, true),
        PollEvent::Corrupt | PollEvent::Unavailable => fail(view, MSG_LOAD_FAILED, true),
        PollEvent::Exhausted => fail(view, MSG_EXHAUSTED, false),
        PollEvent::Observed {
            status,
            feedback,
            resume,
            image,
        } => {
            // 本轮没取到的 blob 保留上一轮的
            let resume = resume.or_else(|| view.resume.clone());
            let image = image.or_else(|| view.image.clone());

            match status {
                RecordStatus::Complete => ResolutionView {
                    status: PollStatus::Complete,
                    status_message: MSG_COMPLETE.to_string(),
                    feedback,
                    resume,
                    image,
                    attempts: view.attempts + 1,
                },
                RecordStatus::Processing => ResolutionView {
                    status: PollStatus::Processing,
                    status_message: MSG_PROCESSING.to_string(),
                    feedback: None,
                    resume,
                    image,
                    attempts: view.attempts + 1,
                },
            }
        }
    }
}

fn fail(view: &ResolutionView, message: &str, counted: bool) -> ResolutionView {
    ResolutionView {
        status: PollStatus::Error,
        status_message: message.to_string(),
        feedback: None,
        resume: view.resume.clone(),
        image: view.image.clone(),
        attempts: view.attempts + u32::from(counted),
    }
}
