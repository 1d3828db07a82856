use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 提交ID
///
/// 每次提交新生成，不可复用：记录存储按"后写覆盖"处理，两次独立提交共用一个ID会互相覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    /// 生成新的随机ID（UUID v4）
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Blob 存储中的不透明路径
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobPath(String);

impl BlobPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// 根据扩展名推断内容类型
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.0)
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一份待上传的文档（原始简历或转换后的预览图）
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// 按文件名推断内容类型
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self::new(file_name, content_type, bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 去掉扩展名后的文件名
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
    }
}

/// 一次提交的输入：求职信息 + 简历文档
#[derive(Debug, Clone)]
pub struct SubmissionInput {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub document: Document,
}

impl SubmissionInput {
    pub fn new(
        company_name: impl Into<String>,
        job_title: impl Into<String>,
        job_description: impl Into<String>,
        document: Document,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            job_title: job_title.into(),
            job_description: job_description.into(),
            document,
        }
    }

    /// 所有字段非空且文档有内容
    pub fn is_complete(&self) -> bool {
        !self.company_name.trim().is_empty()
            && !self.job_title.trim().is_empty()
            && !self.job_description.trim().is_empty()
            && !self.document.is_empty()
    }
}

/// 批量模式下从 TOML 文件加载的提交任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionJob {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    /// 简历路径，相对路径以任务文件所在目录为基准
    pub resume: PathBuf,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<PathBuf>,
}

impl SubmissionJob {
    /// 解析后的简历路径
    pub fn resume_path(&self) -> PathBuf {
        if self.resume.is_absolute() {
            return self.resume.clone();
        }
        match self.file_path.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(&self.resume),
            None => self.resume.clone(),
        }
    }
}

pub(crate) fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
