//! 提交上下文
//!
//! 封装"我正在处理哪一份提交"这一信息，只用于日志

use std::fmt::Display;

use crate::models::{SubmissionId, SubmissionInput};

#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 提交ID
    pub id: SubmissionId,

    /// 公司名称（仅用于日志显示）
    pub company_name: String,

    /// 职位名称（仅用于日志显示）
    pub job_title: String,
}

impl SubmissionCtx {
    pub fn new(id: SubmissionId, input: &SubmissionInput) -> Self {
        Self {
            id,
            company_name: input.company_name.trim().to_string(),
            job_title: input.job_title.trim().to_string(),
        }
    }

    /// ID 前 8 位
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[提交 #{} {}/{}]",
            self.short_id(),
            self.company_name,
            self.job_title
        )
    }
}
