pub mod loaders;
pub mod record;
pub mod submission;
pub mod verdict;

pub use loaders::{load_all_submission_jobs, load_submission_job, read_submission_input};
pub use record::{RecordKey, RecordStatus, SubmissionRecord};
pub use submission::{BlobPath, Document, SubmissionId, SubmissionInput, SubmissionJob};
pub use verdict::Verdict;
