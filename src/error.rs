use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 参数校验错误（调用方可修正）
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 必需的源文件不存在
    #[error("文件缺失: {0}")]
    NotFound(#[from] NotFoundError),
    /// 模型服务商调用错误（原样向上传递）
    #[error("模型调用错误: {0}")]
    Provider(#[from] ProviderError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件系统错误
    #[error("IO错误 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 参数校验错误
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// 温度不在 [0.0, 1.0] 内，或不是有限数值
    #[error("temperature 必须在 0.0 到 1.0 之间 (实际: {0})")]
    TemperatureOutOfRange(f64),
    /// max_tokens 必须为正整数
    #[error("max_tokens 必须为正整数 (实际: {0})")]
    InvalidMaxTokens(i64),
    /// file_id 为空
    #[error("file_id 不能为空")]
    EmptyFileId,
    /// 未知的数据格式
    #[error("未知的数据格式 '{0}'，支持: abc, humdrum, mei, musicxml")]
    UnknownDatatype(String),
    /// 无法识别的模型或服务商
    #[error("无法识别模型 '{0}'，支持: chatgpt, claude, gemini，或 gpt-*/claude-*/gemini-* 等具体模型名")]
    UnknownModel(String),
    /// 指定了 guide 却没有开启 context
    #[error("--guide 需要同时开启 --context")]
    GuideWithoutContext,
    /// guide 不在可用列表中
    #[error("guide '{guide}' 不存在，可用: {available}")]
    UnknownGuide { guide: String, available: String },
    /// 并发数不合法
    #[error("jobs 必须 >= 1")]
    InvalidJobs,
    /// 输出目录中的运行编号已到上限
    #[error("运行编号已达上限，请清理目录: {0}")]
    RunNumberExhausted(PathBuf),
}

/// 必需文件缺失
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// 文本文件不存在
    #[error("期望在 {0} 找到文件，但不存在")]
    TextFile(PathBuf),
    /// 乐谱编码文件不存在
    #[error("未找到 {file_id} 的编码文件 (目录: {dir})")]
    EncodedFile { file_id: String, dir: PathBuf },
    /// 题目文件不存在（旧版数据集）
    #[error("未找到 {file_id} 的题目文件 (目录: {dir})")]
    QuestionFile { file_id: String, dir: PathBuf },
    /// 格式说明文件不存在
    #[error("未找到 {datatype} 的格式说明 (目录: {dir})")]
    BaseFormatPrompt { datatype: String, dir: PathBuf },
    /// 数据集目录缺失
    #[error("数据集缺少必需的子目录: {0}")]
    DatasetDir(PathBuf),
}

/// 模型服务商错误
#[derive(Debug, Error)]
pub enum ProviderError {
    /// API 调用失败
    #[error("API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回错误状态
    #[error("API返回错误响应 (模型: {model}): status={status}, body={body}")]
    BadResponse {
        model: String,
        status: u16,
        body: String,
    },
    /// 返回内容为空
    #[error("模型返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 调用超时
    #[error("模型调用超时 (模型: {model}, {secs} 秒)")]
    Timeout { model: String, secs: u64 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// API Key 缺失或仍是占位符
    #[error("环境变量 {var_name} 缺失或为占位符，请在 .env 中填写真实的 key")]
    MissingApiKey { var_name: String },
    /// 运行计划文件解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 运行计划不完整
    #[error("运行计划无效: {0}")]
    InvalidPlan(String),
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 包装文件系统错误并附带路径
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// 创建模型 API 调用错误
    pub fn provider_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Provider(ProviderError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否属于调用方可修正的校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
