//! 外部服务客户端
//!
//! - `AnalysisClient` - 简历分析服务

pub mod analysis_client;

pub use analysis_client::{
    AnalysisClient, AnalysisContent, AnalysisMessage, AnalysisResponse, ContentPart,
    LlmAnalysisClient,
};
