//! 模型服务商识别
//!
//! 用户可以写服务商名（`chatgpt`、别名 `openai`），也可以直接写具体模型名
//! （`gpt-4o`、`claude-3-haiku`），这里统一解析成 `ModelSpec`

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// 支持的服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    ChatGpt,
    Claude,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::ChatGpt, Provider::Claude, Provider::Gemini];

    /// 规范名，命令行与配置文件里使用
    pub fn canonical(self) -> &'static str {
        match self {
            Provider::ChatGpt => "chatgpt",
            Provider::Claude => "claude",
            Provider::Gemini => "gemini",
        }
    }

    /// 展示名，同时作为输出目录中的 model_label
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::ChatGpt => "ChatGPT",
            Provider::Claude => "Claude",
            Provider::Gemini => "Gemini",
        }
    }

    /// API Key 所在的环境变量
    pub fn env_var(self) -> &'static str {
        match self {
            Provider::ChatGpt => "OPENAI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::Gemini => "GOOGLE_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    /// 只接受规范名和别名（大小写不敏感）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chatgpt" | "openai" | "gpt" => Ok(Provider::ChatGpt),
            "claude" | "anthropic" => Ok(Provider::Claude),
            "gemini" | "google" => Ok(Provider::Gemini),
            _ => Err(ValidationError::UnknownModel(s.to_string())),
        }
    }
}

const OPENAI_PATTERNS: &[&str] = &[
    "gpt-", "gpt3", "gpt4", "o1-", "o3-", "text-davinci", "text-ada", "text-babbage", "text-curie",
];
const ANTHROPIC_PATTERNS: &[&str] = &["claude", "anthropic", "haiku", "sonnet", "opus"];
const GOOGLE_PATTERNS: &[&str] = &["gemini", "bison", "gecko", "palm", "google"];

/// 根据具体模型名推断服务商
///
/// 按 OpenAI → Anthropic → Google 的顺序做子串匹配
pub fn detect_provider(model_name: &str) -> Result<Provider, ValidationError> {
    let name = model_name.trim().to_lowercase();
    let hit = |patterns: &[&str]| patterns.iter().any(|p| name.contains(p));

    if hit(OPENAI_PATTERNS) {
        Ok(Provider::ChatGpt)
    } else if hit(ANTHROPIC_PATTERNS) {
        Ok(Provider::Claude)
    } else if hit(GOOGLE_PATTERNS) {
        Ok(Provider::Gemini)
    } else {
        Err(ValidationError::UnknownModel(model_name.to_string()))
    }
}

/// 服务商名或具体模型名都可以
pub fn classify_provider(name: &str) -> Result<Provider, ValidationError> {
    name.parse::<Provider>().or_else(|_| detect_provider(name))
}

/// 规范服务商名列表
pub fn list_available_models() -> Vec<&'static str> {
    Provider::ALL.iter().map(|p| p.canonical()).collect()
}

/// 解析后的模型选择
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSpec {
    pub provider: Provider,
    /// 具体模型名，`None` 时使用服务商默认模型
    pub model_name: Option<String>,
}

impl ModelSpec {
    pub fn provider_default(provider: Provider) -> Self {
        Self {
            provider,
            model_name: None,
        }
    }

    /// 解析单个模型写法：服务商名/别名，或具体模型名
    pub fn parse(spec: &str) -> Result<Self, ValidationError> {
        let spec = spec.trim();
        if let Ok(provider) = spec.parse::<Provider>() {
            return Ok(Self::provider_default(provider));
        }
        let provider = detect_provider(spec)?;
        Ok(Self {
            provider,
            model_name: Some(spec.to_string()),
        })
    }

    /// 组合 `--model` 与 `--model-name`
    ///
    /// 给了 `model_name` 时，服务商取 `model`（如有）否则自动推断；
    /// 两者都没有时报错
    pub fn resolve(model: Option<&str>, model_name: Option<&str>) -> Result<Self, ValidationError> {
        let model_name = model_name.map(str::trim).filter(|s| !s.is_empty());
        let model = model.map(str::trim).filter(|s| !s.is_empty());

        match (model, model_name) {
            (provider, Some(name)) => {
                let provider = match provider {
                    Some(p) => p.parse::<Provider>()?,
                    None => detect_provider(name)?,
                };
                Ok(Self {
                    provider,
                    model_name: Some(name.to_string()),
                })
            }
            (Some(spec), None) => Self::parse(spec),
            (None, None) => Err(ValidationError::UnknownModel(String::new())),
        }
    }

    /// 输出目录使用的模型标签
    pub fn label(&self) -> &'static str {
        self.provider.display_name()
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model_name {
            Some(name) => write!(f, "{}", name),
            None => f.write_str(self.provider.canonical()),
        }
    }
}

/// 展开批量运行的模型列表
///
/// `all` 展开为全部服务商；否则按逗号分隔逐个解析，重复项只保留一个
pub fn expand_models(raw: &str) -> Result<Vec<ModelSpec>, ValidationError> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(Provider::ALL
            .iter()
            .copied()
            .map(ModelSpec::provider_default)
            .collect());
    }

    let mut specs: Vec<ModelSpec> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let spec = ModelSpec::parse(item)?;
        if !specs.contains(&spec) {
            specs.push(spec);
        }
    }
    if specs.is_empty() {
        return Err(ValidationError::UnknownModel(raw.to_string()));
    }
    Ok(specs)
}
