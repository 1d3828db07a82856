//! 简历提交流程 - 流程层
//!
//! 核心职责：定义"一份提交"的完整写入流程
//!
//! 流程顺序：
//! 1. 校验输入
//! 2. 上传简历 ∥ 转换预览图（并发，两者都完成才继续）
//! 3. 上传预览图
//! 4. 写入初始记录（`processing`，无 feedback），此后才对外公布 ID
//! 5. 调用分析服务（可超时、可取消）
//! 6. 解析 verdict，写入最终记录（`complete`）
//!
//! 任一步失败即终止，不自动重试。第 4 步之前失败不会留下任何记录；
//! 之后失败则记录停留在 `processing`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clients::{AnalysisClient, AnalysisResponse};
use crate::error::{SubmissionError, UploadTarget, VerdictError};
use crate::infrastructure::{BlobStore, RecordStore};
use crate::models::{BlobPath, SubmissionId, SubmissionInput, SubmissionRecord, Verdict};
use crate::services::{prepare_instructions, DocumentConverter};
use crate::workflow::submission_ctx::SubmissionCtx;

pub const STATUS_UPLOADING: &str = "Uploading your resume & generating preview...";
pub const STATUS_SAVING_PREVIEW: &str = "Saving your preview...";
pub const STATUS_PREPARING: &str = "Preparing your analysis...";
pub const STATUS_ANALYZING: &str = "Analyzing your resume with AI...";
pub const STATUS_COMPLETE: &str = "Analysis complete.";

/// 提交阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Idle,
    Uploading,
    SavingPreview,
    Preparing,
    Analyzing,
    Complete,
    Failed,
}

impl SubmissionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStage::Complete | SubmissionStage::Failed)
    }
}

/// 提交进度
///
/// `id` 只在初始记录写入后才有值，拿到它即可打开轮询会话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionProgress {
    pub stage: SubmissionStage,
    pub message: String,
    pub id: Option<SubmissionId>,
}

impl SubmissionProgress {
    pub fn idle() -> Self {
        Self {
            stage: SubmissionStage::Idle,
            message: String::new(),
            id: None,
        }
    }
}

impl Default for SubmissionProgress {
    fn default() -> Self {
        Self::idle()
    }
}

/// 简历提交流程
///
/// - 编排完整的写入流程
/// - 只依赖四个外部协作方（Blob 存储、记录存储、分析服务、文档转换）
/// - 每次提交生成新 ID，是该记录唯一的写入者
pub struct SubmissionFlow {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    analysis: Arc<dyn AnalysisClient>,
    converter: Arc<dyn DocumentConverter>,
    analysis_timeout: Option<Duration>,
}

impl SubmissionFlow {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn RecordStore>,
        analysis: Arc<dyn AnalysisClient>,
        converter: Arc<dyn DocumentConverter>,
    ) -> Self {
        Self {
            blobs,
            records,
            analysis,
            converter,
            analysis_timeout: None,
        }
    }

    /// 设置分析调用超时，`None` 表示一直等待
    pub fn with_analysis_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    /// 执行一次提交，不需要进度和取消时使用
    pub async fn submit(&self, input: SubmissionInput) -> Result<SubmissionRecord, SubmissionError> {
        let (progress, _rx) = watch::channel(SubmissionProgress::idle());
        self.run(input, &progress, &CancellationToken::new()).await
    }

    /// 在独立任务中执行提交
    pub fn spawn(self: &Arc<Self>, input: SubmissionInput) -> SubmissionHandle {
        let (progress_tx, progress_rx) = watch::channel(SubmissionProgress::idle());
        let cancel = CancellationToken::new();
        let flow = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move { flow.run(input, &progress_tx, &token).await });

        SubmissionHandle {
            progress: progress_rx,
            cancel,
            task,
        }
    }

    /// 执行一次提交
    ///
    /// # 参数
    /// - `input`: 提交输入
    /// - `progress`: 进度通道，每个阶段更新一次
    /// - `cancel`: 取消令牌，只作用于分析调用
    ///
    /// # 返回
    /// 成功时返回最终写入的记录；失败时返回单个错误，`Display` 即用户提示
    pub async fn run(
        &self,
        input: SubmissionInput,
        progress: &watch::Sender<SubmissionProgress>,
        cancel: &CancellationToken,
    ) -> Result<SubmissionRecord, SubmissionError> {
        let ctx = SubmissionCtx::new(SubmissionId::new(), &input);

        match self.execute(&ctx, &input, progress, cancel).await {
            Ok(record) => {
                info!("{} ✅ 分析完成，记录已更新为 complete", ctx);
                progress.send_modify(|p| {
                    p.stage = SubmissionStage::Complete;
                    p.message = STATUS_COMPLETE.to_string();
                });
                Ok(record)
            }
            Err(e) => {
                if e.record_persisted() {
                    warn!("{} ⚠️ 提交中止，记录停留在 processing: {:?}", ctx, e);
                } else {
                    error!("{} ❌ 提交失败，未写入记录: {:?}", ctx, e);
                }
                progress.send_modify(|p| {
                    p.stage = SubmissionStage::Failed;
                    p.message = e.user_message();
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &SubmissionCtx,
        input: &SubmissionInput,
        progress: &watch::Sender<SubmissionProgress>,
        cancel: &CancellationToken,
    ) -> Result<SubmissionRecord, SubmissionError> {
        if !input.is_complete() {
            return Err(SubmissionError::Validation);
        }

        // ========== 上传简历 ∥ 生成预览图 ==========
        advance(progress, SubmissionStage::Uploading, STATUS_UPLOADING);
        info!("{} 📤 上传简历并生成预览图...", ctx);

        let (uploaded, converted) = tokio::join!(
            self.blobs.upload(&input.document),
            self.converter.convert(&input.document)
        );

        let resume_path = uploaded.map_err(|source| SubmissionError::Upload {
            target: UploadTarget::Resume,
            source,
        })?;
        let image = converted.file.ok_or(SubmissionError::Conversion {
            reason: converted.error,
        })?;
        debug!(
            "{} 简历已上传: {}，预览图 {} 字节",
            ctx,
            resume_path,
            image.len()
        );

        // ========== 上传预览图 ==========
        advance(progress, SubmissionStage::SavingPreview, STATUS_SAVING_PREVIEW);
        let image_path = self
            .blobs
            .upload(&image)
            .await
            .map_err(|source| SubmissionError::Upload {
                target: UploadTarget::PreviewImage,
                source,
            })?;

        // ========== 写入初始记录 ==========
        advance(progress, SubmissionStage::Preparing, STATUS_PREPARING);
        let mut record = SubmissionRecord::processing(
            ctx.id,
            resume_path.clone(),
            image_path,
            input.company_name.clone(),
            input.job_title.clone(),
            input.job_description.clone(),
        );
        self.persist(&record).await?;
        info!("{} 💾 初始记录已写入: {}", ctx, record.key());

        // 记录可见后才公布 ID
        progress.send_modify(|p| p.id = Some(ctx.id));

        // ========== 调用分析服务 ==========
        advance(progress, SubmissionStage::Analyzing, STATUS_ANALYZING);
        info!("{} 🤖 正在调用分析服务...", ctx);

        let instructions = prepare_instructions(&input.job_title, &input.job_description);
        let response = self.analyze(&resume_path, &instructions, cancel).await?;
        let verdict = extract_verdict(&response)
            .map_err(|source| SubmissionError::AnalysisFormat { source })?;

        // ========== 写入最终记录 ==========
        if !record.complete_with(verdict) {
            return Err(SubmissionError::Aborted(format!(
                "记录 {} 已有 feedback",
                record.key()
            )));
        }
        self.persist(&record).await?;

        Ok(record)
    }

    /// 调用分析服务，与超时和取消令牌竞争
    async fn analyze(
        &self,
        document: &BlobPath,
        instructions: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResponse, SubmissionError> {
        let call = self.analysis.feedback(document, instructions);
        let bounded = async {
            let outcome = match self.analysis_timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .map_err(|_| SubmissionError::AnalysisTimeout(limit))?,
                None => call.await,
            };
            outcome.map_err(|source| SubmissionError::AnalysisInvocation { source })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SubmissionError::Cancelled),
            result = bounded => result,
        }
    }

    async fn persist(&self, record: &SubmissionRecord) -> Result<(), SubmissionError> {
        let json = record
            .to_json()
            .map_err(|e| SubmissionError::Aborted(format!("记录序列化失败: {}", e)))?;
        self.records
            .set(&record.key(), &json)
            .await
            .map_err(|source| SubmissionError::Persist { source })
    }
}

/// 统一两种响应形态并解析为 verdict
pub fn extract_verdict(response: &AnalysisResponse) -> Result<Verdict, VerdictError> {
    let text = response.verdict_text().ok_or(VerdictError::Empty)?;
    Verdict::parse(text)
}

fn advance(progress: &watch::Sender<SubmissionProgress>, stage: SubmissionStage, message: &str) {
    progress.send_modify(|p| {
        p.stage = stage;
        p.message = message.to_string();
    });
}

/// 后台提交任务的句柄
pub struct SubmissionHandle {
    progress: watch::Receiver<SubmissionProgress>,
    cancel: CancellationToken,
    task: JoinHandle<Result<SubmissionRecord, SubmissionError>>,
}

impl SubmissionHandle {
    /// 当前进度
    pub fn progress(&self) -> SubmissionProgress {
        self.progress.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionProgress> {
        self.progress.clone()
    }

    /// 等待初始记录写入，返回可供轮询的 ID
    ///
    /// 在此之前失败时返回 `None`
    pub async fn persisted_id(&self) -> Option<SubmissionId> {
        let mut rx = self.progress.clone();
        let waited = rx
            .wait_for(|p| p.id.is_some() || p.stage.is_terminal())
            .await
            .map(|p| p.id);
        match waited {
            Ok(id) => id,
            Err(_) => rx.borrow().id,
        }
    }

    /// 取消分析调用
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待提交结束
    pub async fn join(self) -> Result<SubmissionRecord, SubmissionError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(SubmissionError::Aborted(e.to_string())),
        }
    }
}
