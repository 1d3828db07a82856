use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{AppError, AppResult};
use crate::models::submission::{Document, SubmissionInput, SubmissionJob};

/// 从 TOML 文件加载提交任务
pub async fn load_submission_job(toml_file_path: &Path) -> AppResult<SubmissionJob> {
    let display = toml_file_path.display().to_string();
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file(&display, e))?;

    let mut job: SubmissionJob = toml::from_str(&content).map_err(|source| AppError::TomlParse {
        path: display,
        source,
    })?;

    // 设置文件路径
    job.file_path = Some(toml_file_path.to_path_buf());

    Ok(job)
}

/// 从文件夹中加载所有 TOML 提交任务
pub async fn load_all_submission_jobs(folder_path: &str) -> AppResult<Vec<SubmissionJob>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(AppError::DirectoryNotFound(folder_path.to_string()));
    }

    let mut jobs = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file(folder_path, e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file(folder_path, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_submission_job(&path).await {
            Ok(job) => jobs.push(job),
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(jobs)
}

/// 读取简历文件，组装提交输入
pub async fn read_submission_input(job: &SubmissionJob) -> AppResult<SubmissionInput> {
    let resume_path = job.resume_path();
    let bytes = fs::read(&resume_path)
        .await
        .map_err(|e| AppError::file(resume_path.display().to_string(), e))?;

    let file_name = resume_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "resume.pdf".to_string());

    Ok(SubmissionInput::new(
        job.company_name.clone(),
        job.job_title.clone(),
        job.job_description.clone(),
        Document::from_bytes(file_name, bytes),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_jobs_and_read_resume() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cv.pdf"), b"%PDF-1.7 fake").unwrap();
        std::fs::write(
            dir.path().join("acme.toml"),
            r#"
company_name = "Acme"
job_title = "Engineer"
job_description = "Build things"
resume = "cv.pdf"
"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.toml"), "company_name = ").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let jobs = load_all_submission_jobs(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company_name, "Acme");

        let input = read_submission_input(&jobs[0]).await.unwrap();
        assert_eq!(input.document.file_name, "cv.pdf");
        assert_eq!(input.document.content_type, "application/pdf");
        assert!(input.is_complete());
    }

    #[tokio::test]
    async fn test_missing_folder_is_an_error() {
        let result = load_all_submission_jobs("/definitely/not/here").await;
        assert!(matches!(result, Err(AppError::DirectoryNotFound(_))));
    }
}
