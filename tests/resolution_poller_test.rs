use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use resume_review::infrastructure::{BlobStore, MemoryBlobStore, MemoryRecordStore, RecordStore};
use resume_review::models::{
    BlobPath, Document, RecordKey, RecordStatus, SubmissionId, SubmissionInput, SubmissionRecord,
    Verdict,
};
use resume_review::testing::{
    FailingConverter, FailingRecordStore, SlowRecordStore, StaticAnalysisClient, StaticConverter,
    FAKE_PDF, FAKE_PNG,
};
use resume_review::workflow::poll_state::{
    MSG_COMPLETE, MSG_EXHAUSTED, MSG_LOADING, MSG_LOAD_FAILED, MSG_NOT_FOUND, MSG_PROCESSING,
};
use resume_review::workflow::{PollStatus, ResolutionPoller, SubmissionFlow};

const ATS_PAYLOAD: &str = r#"{"ATS":{"score":80,"tips":[]}}"#;

struct Stores {
    blobs: Arc<MemoryBlobStore>,
    records: Arc<MemoryRecordStore>,
}

impl Stores {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt::try_init();
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            records: Arc::new(MemoryRecordStore::new()),
        }
    }

    fn poller(&self) -> ResolutionPoller {
        ResolutionPoller::new(self.records.clone(), self.blobs.clone())
    }

    /// 写入一条记录，两个 blob 都已上传
    async fn seed(&self, feedback: Option<&str>, status: Option<RecordStatus>) -> SubmissionRecord {
        let resume = self
            .blobs
            .upload(&Document::from_bytes("cv.pdf", FAKE_PDF.to_vec()))
            .await
            .unwrap();
        let image = self
            .blobs
            .upload(&Document::from_bytes("cv.png", FAKE_PNG.to_vec()))
            .await
            .unwrap();

        let mut record = SubmissionRecord::processing(
            SubmissionId::new(),
            resume,
            image,
            "Acme",
            "Engineer",
            "Build things",
        );
        record.feedback = feedback.map(|text| Verdict::parse(text).unwrap());
        record.status = status;
        self.write(&record).await;
        record
    }

    async fn write(&self, record: &SubmissionRecord) {
        self.records
            .set(&record.key(), &record.to_json().unwrap())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_missing_record_goes_to_error_without_blob_reads() {
    let stores = Stores::new();
    let session = stores.poller().watch(SubmissionId::new());

    assert_eq!(session.view().status, PollStatus::Loading);
    assert_eq!(session.view().status_message, MSG_LOADING);

    let view = session.wait_terminal().await;
    assert_eq!(view.status, PollStatus::Error);
    assert_eq!(view.status_message, MSG_NOT_FOUND);
    assert_eq!(stores.records.get_count(), 1);
    assert_eq!(stores.blobs.read_count(), 0);
}

#[tokio::test]
async fn test_complete_record_materializes_blobs_and_stops() {
    let stores = Stores::new();
    let record = stores
        .seed(Some(ATS_PAYLOAD), Some(RecordStatus::Complete))
        .await;

    let session = stores.poller().watch(record.id);
    let view = session.wait_terminal().await;

    assert_eq!(view.status, PollStatus::Complete);
    assert_eq!(view.status_message, MSG_COMPLETE);
    assert_eq!(view.feedback.as_ref().unwrap().ats_score(), 80);
    assert_eq!(stores.records.get_count(), 1);

    let image = view.image.expect("预览图应已取回");
    let (content_type, bytes) = session.registry().resolve(&image.url).unwrap();
    assert_eq!(content_type, "image/png");
    assert_eq!(bytes, Bytes::from_static(FAKE_PNG));

    let resume = view.resume.expect("简历应已取回");
    assert_eq!(resume.content_type, "application/pdf");
    assert_eq!(resume.len, FAKE_PDF.len());
}

#[tokio::test]
async fn test_feedback_without_complete_status_counts_as_complete() {
    let stores = Stores::new();
    let record = stores
        .seed(Some(ATS_PAYLOAD), Some(RecordStatus::Processing))
        .await;

    let view = stores.poller().watch(record.id).wait_terminal().await;
    assert_eq!(view.status, PollStatus::Complete);
    assert!(view.feedback.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_missing_status_defaults_to_processing() {
    let stores = Stores::new();
    let record = stores.seed(None, None).await;

    let session = stores.poller().watch(record.id);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let view = session.view();
    assert_eq!(view.status, PollStatus::Processing);
    assert_eq!(view.status_message, MSG_PROCESSING);
    assert!(view.feedback.is_none());
    assert!(view.resume.is_some() && view.image.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_processing_record_is_polled_every_four_seconds() {
    let stores = Stores::new();
    let record = stores.seed(None, Some(RecordStatus::Processing)).await;

    let session = stores.poller().watch(record.id);

    // t = 0, 4000, 8000, 12000
    tokio::time::sleep(Duration::from_millis(12_100)).await;
    assert_eq!(stores.records.get_count(), 4);

    let view = session.view();
    assert_eq!(view.status, PollStatus::Processing);
    assert_eq!(view.attempts, 4);

    // 每轮都重新取回，只保留最新一轮
    assert_eq!(stores.blobs.read_count(), 8);
    assert_eq!(session.registry().live_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_processing_then_complete() {
    let stores = Stores::new();
    let mut record = stores.seed(None, Some(RecordStatus::Processing)).await;

    let session = stores.poller().watch(record.id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.view().status, PollStatus::Processing);

    assert!(record.complete_with(Verdict::parse(ATS_PAYLOAD).unwrap()));
    stores.write(&record).await;

    let view = session.wait_terminal().await;
    assert_eq!(view.status, PollStatus::Complete);
    assert_eq!(view.feedback, record.feedback);
    assert_eq!(stores.records.get_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_identical_rewrite_is_not_observable() {
    let stores = Stores::new();
    let record = stores.seed(None, Some(RecordStatus::Processing)).await;

    let session = stores.poller().watch(record.id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let before = session.view();

    stores.write(&record).await;
    tokio::time::sleep(Duration::from_millis(4_000)).await;
    let after = session.view();

    assert_eq!(after.status, before.status);
    assert_eq!(after.status_message, before.status_message);
    assert_eq!(after.feedback, before.feedback);
    assert_eq!(after.attempts, before.attempts + 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_mid_delay_stops_reads() {
    let stores = Stores::new();
    let record = stores.seed(None, Some(RecordStatus::Processing)).await;

    let session = stores.poller().watch(record.id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stores.records.get_count(), 1);
    assert_eq!(session.registry().live_count(), 2);

    session.teardown();
    assert!(!session.is_active());
    assert_eq!(session.registry().live_count(), 0);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(stores.records.get_count(), 1);
    assert_eq!(stores.blobs.read_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_session_stops_reads() {
    let stores = Stores::new();
    let record = stores.seed(None, Some(RecordStatus::Processing)).await;

    let session = stores.poller().watch(record.id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let registry = Arc::clone(session.registry());
    drop(session);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(stores.records.get_count(), 1);
    assert_eq!(registry.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_mid_read_discards_the_result() {
    let stores = Stores::new();
    let record = stores.seed(None, Some(RecordStatus::Processing)).await;
    let reads_before = stores.blobs.read_count();

    let slow = SlowRecordStore::new(stores.records.clone(), Duration::from_secs(1));
    let session = ResolutionPoller::new(Arc::new(slow), stores.blobs.clone()).watch(record.id);

    // 第一次 get 还在等待
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.teardown();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let view = session.view();
    assert_eq!(view.status, PollStatus::Loading);
    assert_eq!(view.status_message, MSG_LOADING);
    assert_eq!(view.attempts, 0);
    assert_eq!(stores.blobs.read_count(), reads_before);
    assert_eq!(session.registry().live_count(), 0);
    assert_eq!(stores.records.get_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let stores = Stores::new();
    let record = stores.seed(None, Some(RecordStatus::Processing)).await;

    let session = stores
        .poller()
        .with_max_attempts(Some(3))
        .watch(record.id);
    let view = session.wait_terminal().await;

    assert_eq!(view.status, PollStatus::Error);
    assert_eq!(view.status_message, MSG_EXHAUSTED);
    assert_eq!(stores.records.get_count(), 3);
}

#[tokio::test]
async fn test_corrupt_record_is_a_load_error() {
    let stores = Stores::new();
    let id = SubmissionId::new();
    stores
        .records
        .set(&RecordKey::for_submission(&id), "{\"id\": ")
        .await
        .unwrap();

    let view = stores.poller().watch(id).wait_terminal().await;
    assert_eq!(view.status, PollStatus::Error);
    assert_eq!(view.status_message, MSG_LOAD_FAILED);
    assert_eq!(stores.blobs.read_count(), 0);
}

#[tokio::test]
async fn test_unreachable_store_is_a_load_error() {
    let poller = ResolutionPoller::new(
        Arc::new(FailingRecordStore),
        Arc::new(MemoryBlobStore::new()),
    );

    let view = poller.watch(SubmissionId::new()).wait_terminal().await;
    assert_eq!(view.status, PollStatus::Error);
    assert_eq!(view.status_message, MSG_LOAD_FAILED);
}

#[tokio::test]
async fn test_missing_blob_does_not_block_the_view() {
    let stores = Stores::new();
    let mut record = stores
        .seed(Some(ATS_PAYLOAD), Some(RecordStatus::Complete))
        .await;
    record.image_path = BlobPath::new("/gone.png");
    stores.write(&record).await;

    let session = stores.poller().watch(record.id);
    let view = session.wait_terminal().await;

    assert_eq!(view.status, PollStatus::Complete);
    assert!(view.resume.is_some());
    assert!(view.image.is_none());
    assert_eq!(session.registry().live_count(), 1);
}

// ========== 写入端 + 读取端 ==========

fn acme_input() -> SubmissionInput {
    SubmissionInput::new(
        "Acme",
        "Engineer",
        "Build things",
        Document::from_bytes("resume.pdf", FAKE_PDF.to_vec()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_poller_follows_submission_to_completion() {
    let stores = Stores::new();
    let flow = Arc::new(SubmissionFlow::new(
        stores.blobs.clone(),
        stores.records.clone(),
        Arc::new(StaticAnalysisClient::text(ATS_PAYLOAD)),
        Arc::new(StaticConverter::new()),
    ));

    let handle = flow.spawn(acme_input());
    let id = handle.persisted_id().await.unwrap();
    let session = stores.poller().watch(id);

    let record = handle.join().await.unwrap();
    let view = session.wait_terminal().await;

    assert_eq!(view.status, PollStatus::Complete);
    assert_eq!(view.feedback, record.feedback);
    assert_eq!(view.feedback.unwrap().ats_score(), 80);
}

#[tokio::test]
async fn test_aborted_submission_is_not_found_by_poller() {
    let stores = Stores::new();
    let flow = Arc::new(SubmissionFlow::new(
        stores.blobs.clone(),
        stores.records.clone(),
        Arc::new(StaticAnalysisClient::text(ATS_PAYLOAD)),
        Arc::new(FailingConverter),
    ));

    let handle = flow.spawn(acme_input());
    assert_eq!(handle.persisted_id().await, None);
    assert!(handle.join().await.is_err());
    assert_eq!(stores.records.write_count(), 0);

    let view = stores.poller().watch(SubmissionId::new()).wait_terminal().await;
    assert_eq!(view.status_message, MSG_NOT_FOUND);
}
