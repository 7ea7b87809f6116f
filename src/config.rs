use std::path::PathBuf;

use crate::clients::Provider;
use crate::error::{AppResult, ConfigError};

/// 程序配置
///
/// 进程启动时构建一次，按引用传给各组件
#[derive(Clone, Debug)]
pub struct Config {
    /// 数据根目录（包含各个数据集）
    pub data_dir: PathBuf,
    /// 数据集名称
    pub dataset: String,
    /// 输出根目录
    pub outputs_dir: PathBuf,
    /// 同时运行的任务数量
    pub max_concurrent_runs: usize,
    /// 失败任务的重试次数
    pub retries: usize,
    /// 默认采样温度
    pub temperature: f64,
    /// 默认 max_tokens
    pub max_tokens: Option<i64>,
    /// 调用方施加的模型超时（秒），None 表示不限
    pub request_timeout_secs: Option<u64>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 是否落盘三类产物
    pub save: bool,
    // --- 服务商配置 ---
    pub openai_api_key: Option<String>,
    pub openai_api_base_url: Option<String>,
    pub openai_default_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_api_base_url: String,
    pub anthropic_default_model: String,
    pub google_api_key: Option<String>,
    pub google_api_base_url: String,
    pub google_default_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            dataset: "fux-counterpoint".to_string(),
            outputs_dir: PathBuf::from("outputs"),
            max_concurrent_runs: 1,
            retries: 0,
            temperature: 0.0,
            max_tokens: None,
            request_timeout_secs: None,
            verbose_logging: false,
            save: true,
            openai_api_key: None,
            openai_api_base_url: None,
            openai_default_model: "gpt-5-pro-2025-10-06".to_string(),
            anthropic_api_key: None,
            anthropic_api_base_url: "https://api.anthropic.com/v1".to_string(),
            anthropic_default_model: "claude-sonnet-4-5".to_string(),
            google_api_key: None,
            google_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            google_default_model: "gemini-2.5-pro".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            data_dir: std::env::var("FUX_DATA_DIR").map(PathBuf::from).unwrap_or(default.data_dir),
            dataset: std::env::var("FUX_DATASET").unwrap_or(default.dataset),
            outputs_dir: std::env::var("FUX_OUTPUTS_DIR").map(PathBuf::from).unwrap_or(default.outputs_dir),
            max_concurrent_runs: std::env::var("FUX_JOBS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_runs),
            retries: std::env::var("FUX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retries),
            temperature: std::env::var("FUX_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.temperature),
            max_tokens: std::env::var("FUX_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).or(default.max_tokens),
            request_timeout_secs: std::env::var("FUX_REQUEST_TIMEOUT").ok().and_then(|v| v.parse().ok()).or(default.request_timeout_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            save: default.save,
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_api_base_url: std::env::var("OPENAI_API_BASE_URL").ok(),
            openai_default_model: std::env::var("OPENAI_DEFAULT_MODEL").unwrap_or(default.openai_default_model),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            anthropic_api_base_url: std::env::var("ANTHROPIC_API_BASE_URL").unwrap_or(default.anthropic_api_base_url),
            anthropic_default_model: std::env::var("ANTHROPIC_DEFAULT_MODEL").unwrap_or(default.anthropic_default_model),
            google_api_key: std::env::var("GOOGLE_API_KEY").or_else(|_| std::env::var("GOOGLE_GENAI_API_KEY")).ok(),
            google_api_base_url: std::env::var("GOOGLE_API_BASE_URL").unwrap_or(default.google_api_base_url),
            google_default_model: std::env::var("GOOGLE_DEFAULT_MODEL").unwrap_or(default.google_default_model),
        }
    }

    /// 当前数据集根目录
    pub fn dataset_root(&self) -> PathBuf {
        self.data_dir.join(&self.dataset)
    }

    pub fn encoded_dir(&self) -> PathBuf {
        self.dataset_root().join("encoded")
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.dataset_root().join("prompts")
    }

    pub fn guides_dir(&self) -> PathBuf {
        self.dataset_root().join("guides")
    }

    /// 服务商的默认模型名
    pub fn default_model(&self, provider: Provider) -> &str {
        match provider {
            Provider::ChatGpt => &self.openai_default_model,
            Provider::Claude => &self.anthropic_default_model,
            Provider::Gemini => &self.google_default_model,
        }
    }

    /// 服务商的 API Key（原始值，未校验）
    pub fn raw_api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::ChatGpt => self.openai_api_key.as_deref(),
            Provider::Claude => self.anthropic_api_key.as_deref(),
            Provider::Gemini => self.google_api_key.as_deref(),
        }
    }

    /// 取出 API Key，缺失、为空或仍是占位符时报错
    pub fn api_key(&self, provider: Provider) -> AppResult<&str> {
        match self.raw_api_key(provider) {
            Some(key) if is_real_key(key) => Ok(key),
            _ => Err(ConfigError::MissingApiKey {
                var_name: provider.env_var().to_string(),
            }
            .into()),
        }
    }
}

/// `your_` 一类的占位符视为未配置
fn is_real_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && !key.to_lowercase().contains("your_")
}
