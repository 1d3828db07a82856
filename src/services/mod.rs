//! 业务能力层（Services）
//!
//! 每个服务只提供一种能力，不关心流程：
//! - `DocumentConverter` - PDF 转预览图
//! - `prepare_instructions` - 组装分析指令
//! - `ViewRegistry` - 轮询会话的对象 URL 登记

pub mod converter;
pub mod instructions;
pub mod view_registry;

pub use converter::{ConversionOutput, DocumentConverter, PdftoppmConverter};
pub use instructions::prepare_instructions;
pub use view_registry::{MaterializedBlob, ObjectUrl, ViewRegistry};
