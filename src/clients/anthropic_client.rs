//! Anthropic 客户端
//!
//! 直接用 reqwest 调用 Messages API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LlmModel, Provider};
use crate::error::{AppError, AppResult, ProviderError};
use crate::models::CompiledPrompt;

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// 未指定 max_tokens 时的默认值（该接口要求必填）
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic (Claude) 客户端
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    api_base_url: String,
    model_name: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str, api_base_url: &str, model_name: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            model_name: model_name.into(),
        }
    }

    fn build_request<'a>(&'a self, prompt: &'a CompiledPrompt) -> MessagesRequest<'a> {
        let system = Some(prompt.system_instructions()).filter(|s| !s.is_empty());
        MessagesRequest {
            model: prompt.model_name_override().unwrap_or(&self.model_name),
            max_tokens: prompt.max_tokens().unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: prompt.temperature(),
            system,
            messages: vec![Message {
                role: "user",
                content: prompt.user_body(),
            }],
        }
    }
}

#[async_trait]
impl LlmModel for AnthropicClient {
    fn label(&self) -> &str {
        Provider::Claude.display_name()
    }

    async fn query(&self, prompt: &CompiledPrompt) -> AppResult<String> {
        let body = self.build_request(prompt);
        let model = body.model.to_string();
        debug!("调用 Anthropic API，模型: {}", model);

        let response = self
            .http
            .post(format!("{}/messages", self.api_base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Anthropic API 调用失败: {}", e);
                AppError::provider_failed(&model, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::BadResponse {
                model,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider_failed(&model, e))?;

        debug!("Anthropic API 调用成功");

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| ProviderError::EmptyContent { model }.into())
    }
}
