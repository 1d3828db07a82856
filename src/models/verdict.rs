//! 分析结果（verdict / feedback）
//!
//! 分析服务返回的结构化评价，只要求是 JSON 对象，不约束具体字段

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::VerdictError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Verdict(Map<String, JsonValue>);

impl Verdict {
    /// 解析分析服务返回的文本
    ///
    /// 允许被 ```json 代码块包裹
    pub fn parse(text: &str) -> Result<Self, VerdictError> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err(VerdictError::Empty);
        }
        match serde_json::from_str::<JsonValue>(body)? {
            JsonValue::Object(map) => Ok(Self(map)),
            _ => Err(VerdictError::NotAnObject),
        }
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// ATS 分数，缺省为 0
    pub fn ats_score(&self) -> u64 {
        self.get("ATS")
            .and_then(|ats| ats.get("score"))
            .and_then(JsonValue::as_u64)
            .unwrap_or(0)
    }

    /// ATS 建议列表，缺省为空
    pub fn ats_tips(&self) -> Vec<JsonValue> {
        self.get("ATS")
            .and_then(|ats| ats.get("tips"))
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default()
    }

    pub fn overall_score(&self) -> Option<u64> {
        self.get("overallScore").and_then(JsonValue::as_u64)
    }
}

fn strip_code_fence(text: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let trimmed = text.trim();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("fence pattern is valid")
    });
    fence
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_object() {
        let verdict = Verdict::parse(r#"{"ATS":{"score":80,"tips":[]}}"#).unwrap();
        assert_eq!(verdict.ats_score(), 80);
        assert!(verdict.ats_tips().is_empty());
        assert_eq!(
            serde_json::to_value(&verdict).unwrap(),
            json!({"ATS": {"score": 80, "tips": []}})
        );
    }

    #[test]
    fn test_parse_fenced_object() {
        let fenced = "```json\n{\"overallScore\": 72, \"ATS\": {\"score\": 65, \"tips\": [{\"type\": \"improve\"}]}}\n```";
        let verdict = Verdict::parse(fenced).unwrap();
        assert_eq!(verdict.overall_score(), Some(72));
        assert_eq!(verdict.ats_tips().len(), 1);
    }

    #[test]
    fn test_missing_ats_defaults_to_zero() {
        let verdict = Verdict::parse(r#"{"summary":"ok"}"#).unwrap();
        assert_eq!(verdict.ats_score(), 0);
    }

    #[test]
    fn test_rejects_non_object_and_garbage() {
        assert!(matches!(Verdict::parse("[1,2,3]"), Err(VerdictError::NotAnObject)));
        assert!(matches!(Verdict::parse("   "), Err(VerdictError::Empty)));
        assert!(matches!(Verdict::parse("not json"), Err(VerdictError::Json(_))));
    }
}
