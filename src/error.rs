use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
///
/// 只在批量驱动层使用；各能力层有各自的错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 提交流程错误
    #[error("提交失败: {0}")]
    Submission(#[from] SubmissionError),
    /// 轮询错误
    #[error("轮询失败: {0}")]
    Poll(#[from] PollError),
    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 目录不存在
    #[error("目录不存在: {0}")]
    DirectoryNotFound(String),
}

impl AppError {
    /// 创建文件读取错误
    pub fn file(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File {
            path: path.into(),
            source,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

// ========== 外部协作方错误 ==========

/// Blob 存储错误
#[derive(Debug, Error)]
pub enum BlobError {
    /// 路径不存在
    #[error("blob 不存在: {0}")]
    NotFound(String),
    /// 路径非法（越界或为空）
    #[error("非法 blob 路径: {0}")]
    InvalidPath(String),
    /// 读写失败
    #[error("blob 读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 存储后端拒绝或不可达
    #[error("blob 存储不可用: {0}")]
    Backend(String),
}

/// 记录存储错误
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// 读写失败
    #[error("记录读写失败 ({key}): {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    /// 存储后端拒绝或不可达
    #[error("记录存储不可用: {0}")]
    Backend(String),
}

/// 分析服务错误
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 请求构建或发送失败
    #[error("分析服务调用失败 (模型: {model}): {message}")]
    Request { model: String, message: String },
    /// 返回内容为空
    #[error("分析服务返回内容为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 无法读取待分析的文档
    #[error("无法读取待分析文档: {0}")]
    Document(#[from] BlobError),
    /// 服务拒绝请求
    #[error("分析服务拒绝请求: {0}")]
    Rejected(String),
}

/// 分析结果解析错误
#[derive(Debug, Error)]
pub enum VerdictError {
    /// 响应中没有任何文本
    #[error("分析结果为空")]
    Empty,
    /// 文本不是合法 JSON
    #[error("分析结果不是合法 JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// JSON 不是对象
    #[error("分析结果不是 JSON 对象")]
    NotAnObject,
}

// ========== 提交流程错误 ==========

/// 上传目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTarget {
    /// 原始简历文件
    Resume,
    /// 转换后的预览图
    PreviewImage,
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadTarget::Resume => write!(f, "resume file"),
            UploadTarget::PreviewImage => write!(f, "preview image"),
        }
    }
}

/// 提交流程错误
///
/// `Display` 即面向用户的失败提示
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Please fill in all fields and upload your resume before continuing.")]
    Validation,

    #[error("Failed to upload the {target}")]
    Upload {
        target: UploadTarget,
        #[source]
        source: BlobError,
    },

    #[error("Failed to convert the PDF to an image")]
    Conversion { reason: Option<String> },

    #[error("Failed to save your submission")]
    Persist {
        #[source]
        source: RecordStoreError,
    },

    #[error("Failed to analyze resume")]
    AnalysisInvocation {
        #[source]
        source: AnalysisError,
    },

    #[error("We could not read the analysis of your resume. Please try again.")]
    AnalysisFormat {
        #[source]
        source: VerdictError,
    },

    #[error("The analysis took too long (more than {}s). Please try again.", .0.as_secs())]
    AnalysisTimeout(Duration),

    #[error("The submission was cancelled.")]
    Cancelled,

    #[error("Something went wrong. Please try again.")]
    Aborted(String),
}

impl SubmissionError {
    /// 面向用户的单条提示信息
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// 失败发生时记录是否已经写入
    pub fn record_persisted(&self) -> bool {
        matches!(
            self,
            SubmissionError::AnalysisInvocation { .. }
                | SubmissionError::AnalysisFormat { .. }
                | SubmissionError::AnalysisTimeout(_)
                | SubmissionError::Cancelled
        )
    }
}

// ========== 轮询错误 ==========

/// 轮询读取错误
///
/// 只用于日志；对外统一折叠为 `error` 状态
#[derive(Debug, Error)]
pub enum PollError {
    #[error("记录不存在: {key}")]
    RecordNotFound { key: String },

    #[error("记录解析失败 ({key}): {source}")]
    RecordParse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] RecordStoreError),
}
