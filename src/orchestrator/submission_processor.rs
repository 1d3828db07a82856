//! 单份简历处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责处理一个提交任务，同时驱动写入端和读取端：
//!
//! 1. **读取简历**：按任务文件中的相对路径读取简历
//! 2. **启动提交**：在后台任务中运行 `SubmissionFlow`
//! 3. **打开轮询**：拿到已持久化的 ID 后立刻打开 `PollSession`
//! 4. **输出进度**：记录视图状态的每一次变化
//! 5. **收尾**：提交失败时结束轮询会话；成功时等到读取端看到结果

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::models::{read_submission_input, SubmissionJob};
use crate::utils::logging::truncate_text;
use crate::workflow::{PollStatus, ResolutionPoller, ResolutionView, SubmissionFlow};

/// 处理单个提交任务
///
/// # 参数
/// - `flow`: 提交流程
/// - `poller`: 结果轮询器
/// - `job`: 任务数据
/// - `job_index`: 任务索引（用于日志）
///
/// # 返回
/// 读取端是否看到了完整的分析结果
pub async fn process_submission(
    flow: &Arc<SubmissionFlow>,
    poller: &ResolutionPoller,
    job: SubmissionJob,
    job_index: usize,
) -> AppResult<bool> {
    log_job_start(job_index, &job);

    let input = read_submission_input(&job).await?;
    let handle = flow.spawn(input);

    let Some(id) = handle.persisted_id().await else {
        // 记录写入之前就失败了，没有可轮询的 ID
        let Err(err) = handle.join().await else {
            return Ok(false);
        };
        error!("[简历 {}] ❌ {}", job_index, err.user_message());
        return Err(err.into());
    };

    info!("[简历 {}] 🔗 记录已可见: resume:{}", job_index, id);
    let session = poller.watch(id);
    tokio::spawn(log_transitions(job_index, session.subscribe()));

    match handle.join().await {
        Ok(record) => {
            let view = session.wait_terminal().await;
            match view.status {
                PollStatus::Complete => {
                    if let Some(verdict) = record.feedback.as_ref() {
                        info!(
                            "[简历 {}] ✅ ATS 分数: {}，总分: {}",
                            job_index,
                            verdict.ats_score(),
                            verdict
                                .overall_score()
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                    Ok(true)
                }
                _ => {
                    warn!(
                        "[简历 {}] ⚠️ 分析已写入但读取端未看到结果: {}",
                        job_index, view.status_message
                    );
                    Ok(false)
                }
            }
        }
        Err(e) => {
            session.teardown();
            error!("[简历 {}] ❌ {}", job_index, e.user_message());
            Err(e.into())
        }
    }
}

/// 记录视图状态变化，直到会话结束
async fn log_transitions(job_index: usize, mut views: watch::Receiver<ResolutionView>) {
    let mut last: Option<PollStatus> = None;
    loop {
        let view = views.borrow_and_update().clone();
        if last != Some(view.status) {
            info!("[简历 {}] 👀 {:?}: {}", job_index, view.status, view.status_message);
            last = Some(view.status);
        }
        if view.is_terminal() || views.changed().await.is_err() {
            break;
        }
    }
}

fn log_job_start(job_index: usize, job: &SubmissionJob) {
    info!("\n[简历 {}] {}", job_index, "─".repeat(40));
    info!(
        "[简历 {}] 🏢 {} / {}",
        job_index, job.company_name, job.job_title
    );
    info!(
        "[简历 {}] 📝 {}",
        job_index,
        truncate_text(job.job_description.trim(), 60)
    );
}
