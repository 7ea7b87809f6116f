//! 模型客户端 - 基础设施层
//!
//! 每个服务商一个适配器，统一实现 `LlmModel`：输入一份 `CompiledPrompt`，
//! 返回模型回复文本。适配器之外的代码不关心具体是哪家服务商。

pub mod anthropic_client;
pub mod gemini_client;
pub mod openai_client;
pub mod provider;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::CompiledPrompt;

pub use anthropic_client::AnthropicClient;
pub use gemini_client::GeminiClient;
pub use openai_client::OpenAiClient;
pub use provider::{classify_provider, detect_provider, expand_models, list_available_models, ModelSpec, Provider};

/// 统一的模型接口
///
/// 实现方负责把 `CompiledPrompt` 翻译成各家 API 的请求格式。
/// `model_name_override` 不为空时优先于实现方自带的模型名。
#[async_trait]
pub trait LlmModel: Send + Sync {
    /// 输出目录中使用的模型标签（ChatGPT / Claude / Gemini）
    fn label(&self) -> &str;

    /// 发送提示词，返回回复文本
    async fn query(&self, prompt: &CompiledPrompt) -> AppResult<String>;
}

/// 按模型选择创建客户端
///
/// API Key 缺失或仍是占位符时返回配置错误
pub fn build_model(config: &Config, spec: &ModelSpec) -> AppResult<Arc<dyn LlmModel>> {
    let api_key = config.api_key(spec.provider)?;
    let model_name = spec
        .model_name
        .clone()
        .unwrap_or_else(|| config.default_model(spec.provider).to_string());

    let model: Arc<dyn LlmModel> = match spec.provider {
        Provider::ChatGpt => Arc::new(OpenAiClient::new(
            api_key,
            config.openai_api_base_url.as_deref(),
            model_name,
        )),
        Provider::Claude => Arc::new(AnthropicClient::new(
            api_key,
            &config.anthropic_api_base_url,
            model_name,
        )),
        Provider::Gemini => Arc::new(GeminiClient::new(
            api_key,
            &config.google_api_base_url,
            model_name,
        )),
    };
    Ok(model)
}
