//! 提交记录
//!
//! 写入端（SubmissionFlow）与读取端（ResolutionPoller）之间唯一共享的数据，
//! 以 JSON 文本保存在 `resume:{id}` 键下

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::submission::{BlobPath, SubmissionId};
use crate::models::verdict::Verdict;

/// 持久化状态，只有 `processing` 和 `complete` 两种
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Processing,
    Complete,
}

/// 记录存储中的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey(String);

impl RecordKey {
    pub const PREFIX: &'static str = "resume:";

    pub fn for_submission(id: &SubmissionId) -> Self {
        Self(format!("{}{}", Self::PREFIX, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub resume_path: BlobPath,
    pub image_path: BlobPath,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    #[serde(default)]
    pub feedback: Option<Verdict>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
}

impl SubmissionRecord {
    /// 初始记录：`processing`，没有 feedback
    pub fn processing(
        id: SubmissionId,
        resume_path: BlobPath,
        image_path: BlobPath,
        company_name: impl Into<String>,
        job_title: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            resume_path,
            image_path,
            company_name: company_name.into(),
            job_title: job_title.into(),
            job_description: job_description.into(),
            feedback: None,
            status: Some(RecordStatus::Processing),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::for_submission(&self.id)
    }

    /// 写入 feedback 并标记完成，只允许一次
    ///
    /// 已有 feedback 时返回 `false`，记录保持不变
    pub fn complete_with(&mut self, verdict: Verdict) -> bool {
        if self.feedback.is_some() {
            return false;
        }
        self.feedback = Some(verdict);
        self.status = Some(RecordStatus::Complete);
        true
    }

    /// 读取端使用的有效状态
    ///
    /// 有 feedback 即视为完成；未设置状态时按 `processing` 处理
    pub fn effective_status(&self) -> RecordStatus {
        if self.status == Some(RecordStatus::Complete) || self.feedback.is_some() {
            RecordStatus::Complete
        } else {
            self.status.unwrap_or(RecordStatus::Processing)
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as JsonValue};

    fn sample() -> SubmissionRecord {
        SubmissionRecord::processing(
            SubmissionId::new(),
            BlobPath::new("/a-cv.pdf"),
            BlobPath::new("/b-cv.png"),
            "Acme",
            "Engineer",
            "Build things",
        )
    }

    #[test]
    fn test_key_is_namespaced_by_id() {
        let record = sample();
        assert_eq!(record.key().as_str(), format!("resume:{}", record.id));
    }

    #[test]
    fn test_serialized_field_names() {
        let record = sample();
        let value: JsonValue = serde_json::from_str(&record.to_json().unwrap()).unwrap();

        assert_eq!(value["resumePath"], json!("/a-cv.pdf"));
        assert_eq!(value["imagePath"], json!("/b-cv.png"));
        assert_eq!(value["companyName"], json!("Acme"));
        assert_eq!(value["jobTitle"], json!("Engineer"));
        assert_eq!(value["jobDescription"], json!("Build things"));
        assert_eq!(value["feedback"], JsonValue::Null);
        assert_eq!(value["status"], json!("processing"));
        assert_eq!(value["id"], json!(record.id.to_string()));
    }

    #[test]
    fn test_effective_status() {
        let mut record = sample();
        assert_eq!(record.effective_status(), RecordStatus::Processing);

        record.status = None;
        assert_eq!(record.effective_status(), RecordStatus::Processing);

        // feedback 已存在但状态未更新，仍视为完成
        record.feedback = Some(Verdict::parse(r#"{"ATS":{"score":1}}"#).unwrap());
        assert_eq!(record.effective_status(), RecordStatus::Complete);
    }

    #[test]
    fn test_feedback_is_set_once() {
        let mut record = sample();
        let first = Verdict::parse(r#"{"ATS":{"score":80,"tips":[]}}"#).unwrap();
        let second = Verdict::parse(r#"{"ATS":{"score":10,"tips":[]}}"#).unwrap();

        assert!(record.complete_with(first.clone()));
        assert!(!record.complete_with(second));
        assert_eq!(record.feedback, Some(first));
        assert_eq!(record.status, Some(RecordStatus::Complete));
    }

    #[test]
    fn test_missing_status_and_feedback_parse() {
        let id = SubmissionId::new();
        let raw = format!(
            r#"{{"id":"{id}","resumePath":"/r.pdf","imagePath":"/i.png","companyName":"Acme","jobTitle":"Engineer","jobDescription":"Build"}}"#
        );
        let record = SubmissionRecord::from_json(&raw).unwrap();
        assert_eq!(record.status, None);
        assert_eq!(record.feedback, None);
        assert_eq!(record.effective_status(), RecordStatus::Processing);
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(SubmissionRecord::from_json("{not json").is_err());
        assert!(SubmissionRecord::from_json(r#"{"id":"x"}"#).is_err());
    }
}
