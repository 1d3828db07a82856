//! 批量简历处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量提交的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：写日志文件头，创建存储、分析客户端、转换器
//! 2. **批量加载**：扫描并加载所有待处理的提交任务（`Vec<SubmissionJob>`）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：每批完成后再开始下一批
//! 5. **全局统计**：汇总所有提交的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单份简历的细节
//! - **资源所有者**：唯一创建外部协作方的模块
//! - **向下委托**：委托 submission_processor 处理单个任务

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::LlmAnalysisClient;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{BlobStore, FsBlobStore, FsRecordStore, RecordStore};
use crate::models::{load_all_submission_jobs, SubmissionJob};
use crate::orchestrator::submission_processor;
use crate::services::PdftoppmConverter;
use crate::utils::logging;
use crate::workflow::{ResolutionPoller, SubmissionFlow};

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<SubmissionFlow>,
    poller: ResolutionPoller,
}

impl App {
    /// 初始化应用
    ///
    /// 使用本地文件系统存储、OpenAI 兼容的分析服务和 `pdftoppm` 转换器
    pub async fn initialize(config: Config) -> AppResult<Self> {
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.blob_root));
        let records: Arc<dyn RecordStore> = Arc::new(FsRecordStore::new(&config.record_root));

        let flow = SubmissionFlow::new(
            Arc::clone(&blobs),
            Arc::clone(&records),
            Arc::new(LlmAnalysisClient::new(&config, Arc::clone(&blobs))),
            Arc::new(PdftoppmConverter::from_config(&config)),
        )
        .with_analysis_timeout(config.analysis_timeout());
        let poller = ResolutionPoller::from_config(&config, records, blobs);

        Self::with_parts(config, flow, poller)
    }

    /// 使用给定的流程和轮询器组装应用
    pub fn with_parts(
        config: Config,
        flow: SubmissionFlow,
        poller: ResolutionPoller,
    ) -> AppResult<Self> {
        logging::init_log_file(&config.output_log_file)
            .map_err(|e| AppError::file(&config.output_log_file, e))?;
        logging::log_startup(&config);

        Ok(Self {
            config,
            flow: Arc::new(flow),
            poller,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<ProcessingStats> {
        info!("\n📁 正在扫描待处理的提交任务...");
        let jobs = load_all_submission_jobs(&self.config.submissions_folder).await?;

        if jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(ProcessingStats::default());
        }

        let batch_size = self.config.max_concurrent_submissions.max(1);
        logging::log_jobs_loaded(jobs.len(), batch_size);

        let stats = self.process_all(jobs, batch_size).await;

        logging::print_final_stats(
            stats.success,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 分批处理所有任务
    async fn process_all(&self, jobs: Vec<SubmissionJob>, batch_size: usize) -> ProcessingStats {
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total = jobs.len();
        let total_batches = total.div_ceil(batch_size);
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };

        for (batch_idx, batch) in jobs.chunks(batch_size).enumerate() {
            let batch_start = batch_idx * batch_size;
            logging::log_batch_start(
                batch_idx + 1,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            let result = self
                .process_batch(batch, batch_start, Arc::clone(&semaphore))
                .await;

            stats.success += result.success;
            stats.failed += result.failed;

            logging::log_batch_complete(batch_idx + 1, result.success, result.success + result.failed);
        }

        stats
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch: &[SubmissionJob],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> BatchResult {
        let mut handles = Vec::new();

        for (idx, job) in batch.iter().enumerate() {
            let job_index = batch_start + idx + 1;
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("[简历 {}] 无法获取并发许可: {}", job_index, e);
                    break;
                }
            };

            let flow = Arc::clone(&self.flow);
            let poller = self.poller.clone();
            let job = job.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                submission_processor::process_submission(&flow, &poller, job, job_index).await
            });
            handles.push((job_index, handle));
        }

        let mut result = BatchResult::default();
        result.failed += batch.len() - handles.len();

        // 等待本批所有任务完成
        let outcomes = join_all(
            handles
                .into_iter()
                .map(|(job_index, handle)| async move { (job_index, handle.await) }),
        )
        .await;

        for (job_index, outcome) in outcomes {
            match outcome {
                Ok(Ok(true)) => result.success += 1,
                Ok(Ok(false)) => result.failed += 1,
                Ok(Err(e)) => {
                    warn!("[简历 {}] 处理失败: {}", job_index, e);
                    result.failed += 1;
                }
                Err(e) => {
                    error!("[简历 {}] 任务执行失败: {}", job_index, e);
                    result.failed += 1;
                }
            }
        }

        result
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}
