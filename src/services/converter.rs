//! 文档转换服务 - 业务能力层
//!
//! 把 PDF 简历的第一页渲染成 PNG 预览图
//!
//! ## 实现
//! 调用外部 `pdftoppm` 程序（poppler-utils），在临时目录中完成渲染；
//! 临时目录随 `TempDir` 一起释放，转换被中途取消时也会清理

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::Document;

/// 转换结果
///
/// `file` 为空即转换失败，`error` 携带失败原因（如果有）
#[derive(Debug, Clone, Default)]
pub struct ConversionOutput {
    pub file: Option<Document>,
    pub error: Option<String>,
}

impl ConversionOutput {
    pub fn converted(file: Document) -> Self {
        Self {
            file: Some(file),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            file: None,
            error: Some(reason.into()),
        }
    }
}

/// 文档转换器
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, document: &Document) -> ConversionOutput;
}

/// 基于 `pdftoppm` 的转换器
#[derive(Debug, Clone)]
pub struct PdftoppmConverter {
    program: String,
    resolution: u32,
    scratch_root: Option<PathBuf>,
}

impl PdftoppmConverter {
    pub fn new(program: impl Into<String>, resolution: u32) -> Self {
        Self {
            program: program.into(),
            resolution,
            scratch_root: None,
        }
    }

    /// 在指定目录下创建临时工作目录（默认为系统临时目录）
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn workdir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("resume-convert-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.converter_program.clone(), config.converter_resolution)
    }

    async fn render(&self, document: &Document, workdir: &Path) -> Result<Document, String> {
        let input = workdir.join("input.pdf");
        let output_base = workdir.join("page");
        fs::write(&input, &document.bytes)
            .await
            .map_err(|e| format!("写入临时文件失败: {}", e))?;

        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(self.resolution.to_string())
            .args(["-f", "1", "-l", "1", "-singlefile"])
            .arg(&input)
            .arg(&output_base)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("无法启动 {}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} 退出码 {}: {}", self.program, output.status, stderr.trim()));
        }

        let png = fs::read(output_base.with_extension("png"))
            .await
            .map_err(|e| format!("读取渲染结果失败: {}", e))?;
        if png.is_empty() {
            return Err("渲染结果为空".to_string());
        }

        Ok(Document::new(
            format!("{}.png", document.stem()),
            "image/png",
            png,
        ))
    }
}

impl Default for PdftoppmConverter {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[async_trait]
impl DocumentConverter for PdftoppmConverter {
    async fn convert(&self, document: &Document) -> ConversionOutput {
        if document.is_empty() {
            return ConversionOutput::failed("文档为空");
        }

        let workdir = match self.workdir() {
            Ok(dir) => dir,
            Err(e) => return ConversionOutput::failed(format!("创建临时目录失败: {}", e)),
        };

        let result = self.render(document, workdir.path()).await;
        if let Err(e) = workdir.close() {
            debug!("清理临时目录失败: {}", e);
        }

        match result {
            Ok(image) => {
                debug!("转换完成: {} -> {} ({} 字节)", document.file_name, image.file_name, image.len());
                ConversionOutput::converted(image)
            }
            Err(reason) => {
                warn!("转换失败 {}: {}", document.file_name, reason);
                ConversionOutput::failed(reason)
            }
        }
    }
}
