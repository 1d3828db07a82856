use std::str::FromStr;
use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的提交数量
    pub max_concurrent_submissions: usize,
    /// 待提交任务（TOML）存放目录
    pub submissions_folder: String,
    /// Blob 存储根目录
    pub blob_root: String,
    /// 记录存储根目录
    pub record_root: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 最大轮询次数，0 表示不限
    pub max_poll_attempts: u32,
    /// 分析超时（秒），0 表示不限
    pub analysis_timeout_secs: u64,
    // --- 文档转换配置 ---
    pub converter_program: String,
    pub converter_resolution: u32,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_submissions: 4,
            submissions_folder: "submissions".to_string(),
            blob_root: "data/blobs".to_string(),
            record_root: "data/records".to_string(),
            poll_interval_ms: 4000,
            max_poll_attempts: 0,
            analysis_timeout_secs: 180,
            converter_program: "pdftoppm".to_string(),
            converter_resolution: 144,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取配置，无法解析的值回落到默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            max_concurrent_submissions: parsed(&lookup, "MAX_CONCURRENT_SUBMISSIONS").filter(|n: &usize| *n > 0).unwrap_or(default.max_concurrent_submissions),
            submissions_folder: lookup("SUBMISSIONS_FOLDER").unwrap_or(default.submissions_folder),
            blob_root: lookup("BLOB_ROOT").unwrap_or(default.blob_root),
            record_root: lookup("RECORD_ROOT").unwrap_or(default.record_root),
            poll_interval_ms: parsed(&lookup, "POLL_INTERVAL_MS").unwrap_or(default.poll_interval_ms),
            max_poll_attempts: parsed(&lookup, "MAX_POLL_ATTEMPTS").unwrap_or(default.max_poll_attempts),
            analysis_timeout_secs: parsed(&lookup, "ANALYSIS_TIMEOUT_SECS").unwrap_or(default.analysis_timeout_secs),
            converter_program: lookup("CONVERTER_PROGRAM").unwrap_or(default.converter_program),
            converter_resolution: parsed(&lookup, "CONVERTER_RESOLUTION").unwrap_or(default.converter_resolution),
            verbose_logging: parsed(&lookup, "VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_log_file: lookup("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: lookup("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: lookup("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: lookup("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_attempts(&self) -> Option<u32> {
        (self.max_poll_attempts > 0).then_some(self.max_poll_attempts)
    }

    pub fn analysis_timeout(&self) -> Option<Duration> {
        (self.analysis_timeout_secs > 0).then(|| Duration::from_secs(self.analysis_timeout_secs))
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
