//! 分析服务客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini 等）
//! - 文档通过 Blob 存储读出，以 base64 data URL 附在消息里

use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AnalysisError;
use crate::infrastructure::BlobStore;
use crate::models::BlobPath;

/// 分析服务的原始响应：`{message: {content}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub message: AnalysisMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMessage {
    pub content: AnalysisContent,
}

/// 响应内容：纯文本，或首元素携带文本的数组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    pub text: String,
}

impl AnalysisResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: AnalysisMessage {
                content: AnalysisContent::Text(content.into()),
            },
        }
    }

    pub fn parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            message: AnalysisMessage {
                content: AnalysisContent::Parts(
                    parts
                        .into_iter()
                        .map(|text| ContentPart { text: text.into() })
                        .collect(),
                ),
            },
        }
    }

    /// 统一两种响应形态，取出评价文本
    pub fn verdict_text(&self) -> Option<&str> {
        match &self.message.content {
            AnalysisContent::Text(text) => Some(text.as_str()),
            AnalysisContent::Parts(parts) => parts.first().map(|p| p.text.as_str()),
        }
    }
}

/// 分析服务客户端
///
/// 延迟不可预期；本层不做超时，由调用方决定
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn feedback(
        &self,
        document: &BlobPath,
        instructions: &str,
    ) -> Result<AnalysisResponse, AnalysisError>;
}

/// 基于 OpenAI 兼容接口的分析客户端
pub struct LlmAnalysisClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    blobs: Arc<dyn BlobStore>,
}

impl LlmAnalysisClient {
    pub fn new(config: &Config, blobs: Arc<dyn BlobStore>) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            blobs,
        }
    }

    fn request_error(&self, e: impl std::fmt::Display) -> AnalysisError {
        AnalysisError::Request {
            model: self.model_name.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl AnalysisClient for LlmAnalysisClient {
    async fn feedback(
        &self,
        document: &BlobPath,
        instructions: &str,
    ) -> Result<AnalysisResponse, AnalysisError> {
        let bytes = self.blobs.read(document).await?;
        debug!(
            "调用分析服务，模型: {}，文档: {} ({} 字节)",
            self.model_name,
            document,
            bytes.len()
        );

        let data_url = format!(
            "data:{};base64,{}",
            document.content_type(),
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: instructions.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: data_url,
                        detail: Some(ImageDetail::High),
                    },
                },
            ),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()
            .map_err(|e| self.request_error(e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(0.2)
            .max_tokens(4096u32)
            .build()
            .map_err(|e| self.request_error(e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("分析服务调用失败: {}", e);
            self.request_error(e)
        })?;

        debug!("分析服务调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AnalysisError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        Ok(AnalysisResponse::text(content.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Verdict;

    const PAYLOAD: &str = r#"{"ATS":{"score":80,"tips":[]}}"#;

    #[test]
    fn test_string_and_parts_normalize_to_same_verdict() {
        let plain = AnalysisResponse::text(PAYLOAD);
        let wrapped = AnalysisResponse::parts([PAYLOAD]);

        let a = Verdict::parse(plain.verdict_text().unwrap()).unwrap();
        let b = Verdict::parse(wrapped.verdict_text().unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_deserialize_both_wire_forms() {
        let plain: AnalysisResponse =
            serde_json::from_str(r#"{"message":{"content":"{\"ATS\":{\"score\":80,\"tips\":[]}}"}}"#)
                .unwrap();
        let wrapped: AnalysisResponse = serde_json::from_str(
            r#"{"message":{"content":[{"text":"{\"ATS\":{\"score\":80,\"tips\":[]}}"},{"text":"ignored"}]}}"#,
        )
        .unwrap();

        assert_eq!(plain.verdict_text(), Some(PAYLOAD));
        assert_eq!(wrapped.verdict_text(), Some(PAYLOAD));
    }

    #[test]
    fn test_empty_parts_have_no_text() {
        let empty = AnalysisResponse::parts(Vec::<String>::new());
        assert_eq!(empty.verdict_text(), None);
    }
}
