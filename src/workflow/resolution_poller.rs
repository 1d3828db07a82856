//! 结果轮询 - 流程层
//!
//! 核心职责：按固定间隔读取提交记录，直到拿到 feedback 或遇到不可恢复的情况
//!
//! - 每个会话一个后台任务，视图通过 `watch` 通道发布
//! - 会话结束（`teardown` 或 drop）后不再发起任何读取，正在进行的读取结果被丢弃
//! - 每轮取回的 blob 登记在会话的 [`ViewRegistry`] 中，被取代即释放，会话结束时全部释放

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::PollError;
use crate::infrastructure::{BlobStore, RecordStore};
use crate::models::{BlobPath, RecordKey, RecordStatus, SubmissionId, SubmissionRecord};
use crate::services::{MaterializedBlob, ObjectUrl, ViewRegistry};
use crate::workflow::poll_state::{reduce, PollEvent, ResolutionView};

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(4000);

/// 结果轮询器
///
/// 只依赖记录存储和 Blob 存储，与写入端不共享任何内存状态
#[derive(Clone)]
pub struct ResolutionPoller {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    interval: Duration,
    max_attempts: Option<u32>,
}

impl ResolutionPoller {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            records,
            blobs,
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }

    pub fn from_config(
        config: &Config,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self::new(records, blobs)
            .with_interval(config.poll_interval())
            .with_max_attempts(config.max_poll_attempts())
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 最大读取次数，`None` 表示不限
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.filter(|n| *n > 0);
        self
    }

    /// 为指定提交打开一个轮询会话
    pub fn watch(&self, id: SubmissionId) -> PollSession {
        let (view_tx, view_rx) = watch::channel(ResolutionView::loading());
        let cancel = CancellationToken::new();
        let registry = Arc::new(ViewRegistry::new());

        let worker = PollWorker {
            key: RecordKey::for_submission(&id),
            records: Arc::clone(&self.records),
            blobs: Arc::clone(&self.blobs),
            interval: self.interval,
            max_attempts: self.max_attempts,
            registry: Arc::clone(&registry),
            cancel: cancel.clone(),
            view: view_tx,
        };
        let task = tokio::spawn(worker.run());

        PollSession {
            id,
            view: view_rx,
            cancel,
            registry,
            task,
        }
    }
}

/// 一次轮询会话
///
/// drop 时自动 teardown
pub struct PollSession {
    id: SubmissionId,
    view: watch::Receiver<ResolutionView>,
    cancel: CancellationToken,
    registry: Arc<ViewRegistry>,
    task: JoinHandle<()>,
}

impl PollSession {
    pub fn id(&self) -> SubmissionId {
        self.id
    }

    /// 当前视图
    pub fn view(&self) -> ResolutionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolutionView> {
        self.view.clone()
    }

    pub fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    /// 等待终态；会话先被 teardown 时返回最后的视图
    pub async fn wait_terminal(&self) -> ResolutionView {
        let mut rx = self.view.clone();
        let waited = rx.wait_for(|view| view.is_terminal()).await.map(|view| view.clone());
        match waited {
            Ok(view) => view,
            Err(_) => rx.borrow().clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// 结束会话：取消等待中的读取，释放所有对象 URL
    pub fn teardown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let released = self.registry.release_all();
        debug!("轮询会话 {} 已结束，释放 {} 个对象 URL", self.id, released);
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

struct PollWorker {
    key: RecordKey,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    interval: Duration,
    max_attempts: Option<u32>,
    registry: Arc<ViewRegistry>,
    cancel: CancellationToken,
    view: watch::Sender<ResolutionView>,
}

impl PollWorker {
    async fn run(self) {
        let mut current = ResolutionView::loading();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let Some(event) = self.poll_once().await else {
                break;
            };

            if self.cancel.is_cancelled() {
                // 会话已结束，丢弃本轮结果
                for url in event.object_urls() {
                    self.registry.release(url);
                }
                break;
            }

            let fresh: Vec<ObjectUrl> = event.object_urls().into_iter().cloned().collect();
            let mut next = reduce(&current, event);

            if !next.is_terminal() {
                if let Some(max) = self.max_attempts {
                    if next.attempts >= max {
                        warn!("{} 已读取 {} 次仍未完成，停止轮询", self.key, next.attempts);
                        next = reduce(&next, PollEvent::Exhausted);
                    }
                }
            }

            self.release_unreferenced(&current, &fresh, &next);
            if next.status != current.status {
                info!("{} 状态: {:?} → {:?}", self.key, current.status, next.status);
            }
            self.view.send_replace(next.clone());
            current = next;

            if current.is_terminal() {
                break;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// 读取一次记录；会话在读取途中结束时返回 `None`
    async fn poll_once(&self) -> Option<PollEvent> {
        let raw = match self.records.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                let err = PollError::RecordNotFound {
                    key: self.key.to_string(),
                };
                warn!("{}", err);
                return Some(PollEvent::Missing);
            }
            Err(e) => {
                warn!("{}", PollError::from(e));
                return Some(PollEvent::Unavailable);
            }
        };

        let record = match SubmissionRecord::from_json(&raw) {
            Ok(record) => record,
            Err(source) => {
                let err = PollError::RecordParse {
                    key: self.key.to_string(),
                    source,
                };
                warn!("{}", err);
                return Some(PollEvent::Corrupt);
            }
        };

        if self.cancel.is_cancelled() {
            return None;
        }

        let status = record.effective_status();
        let (resume, image) = tokio::join!(
            self.materialize(&record.resume_path),
            self.materialize(&record.image_path)
        );

        let feedback = match status {
            RecordStatus::Complete => record.feedback,
            RecordStatus::Processing => None,
        };

        Some(PollEvent::Observed {
            status,
            feedback,
            resume,
            image,
        })
    }

    async fn materialize(&self, path: &BlobPath) -> Option<MaterializedBlob> {
        if path.is_empty() {
            return None;
        }
        match self.blobs.read(path).await {
            Ok(bytes) => {
                debug!("{} 已取回 {} ({} 字节)", self.key, path, bytes.len());
                Some(self.registry.materialize(bytes, path.content_type()))
            }
            Err(e) => {
                warn!("{} 读取 blob 失败: {}", self.key, e);
                None
            }
        }
    }

    /// 释放新视图不再引用的对象 URL（上一轮被取代的，以及本轮未被采用的）
    fn release_unreferenced(
        &self,
        previous: &ResolutionView,
        fresh: &[ObjectUrl],
        next: &ResolutionView,
    ) {
        let kept = next.object_urls();
        for url in previous.object_urls().into_iter().chain(fresh.iter()) {
            if !kept.contains(&url) {
                self.registry.release(url);
            }
        }
    }
}
