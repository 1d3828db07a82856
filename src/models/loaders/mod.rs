pub mod toml_loader;

pub use toml_loader::{load_all_submission_jobs, load_submission_job, read_submission_input};
