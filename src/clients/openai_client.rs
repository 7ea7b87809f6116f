//! OpenAI 客户端
//!
//! 使用 `async-openai` 调用 Chat Completions 接口，兼容任何 OpenAI 协议的端点

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::{LlmModel, Provider};
use crate::error::{AppError, AppResult, ProviderError};
use crate::models::CompiledPrompt;
use crate::utils::clean_code_blocks;

/// OpenAI (ChatGPT) 客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl OpenAiClient {
    /// 创建客户端，`api_base` 为空时使用官方端点
    pub fn new(api_key: &str, api_base: Option<&str>, model_name: impl Into<String>) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            openai_config = openai_config.with_api_base(base);
        }

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl LlmModel for OpenAiClient {
    fn label(&self) -> &str {
        Provider::ChatGpt.display_name()
    }

    async fn query(&self, prompt: &CompiledPrompt) -> AppResult<String> {
        let model = prompt.model_name_override().unwrap_or(&self.model_name).to_string();
        debug!("调用 OpenAI API，模型: {}", model);
        debug!("用户消息长度: {} 字符", prompt.user_body().len());

        let failed = |e: async_openai::error::OpenAIError| AppError::provider_failed(&model, e);

        let mut messages = Vec::new();
        if !prompt.system_instructions().is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system_instructions())
                .build()
                .map_err(failed)?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.user_body())
            .build()
            .map_err(failed)?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&model)
            .messages(messages)
            .temperature(prompt.temperature() as f32);
        if let Some(max_tokens) = prompt.max_tokens() {
            builder.max_completion_tokens(max_tokens);
        }
        let request = builder.build().map_err(failed)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("OpenAI API 调用失败: {}", e);
            failed(e)
        })?;

        debug!("OpenAI API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(ProviderError::EmptyContent { model })?;

        Ok(clean_code_blocks(content.trim()))
    }
}
