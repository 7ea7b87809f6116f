//! Google Gemini 客户端
//!
//! 调用 generateContent 接口。该接口没有独立的系统消息字段，
//! 系统指令与用户正文以空行拼接后作为单条内容发送

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LlmModel, Provider};
use crate::error::{AppError, AppResult, ProviderError};
use crate::models::CompiledPrompt;

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Google (Gemini) 客户端
pub struct GeminiClient {
    http: Client,
    api_key: String,
    api_base_url: String,
    model_name: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, api_base_url: &str, model_name: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            model_name: model_name.into(),
        }
    }

    /// 实际请求的模型 ID，去掉 `models/` 前缀
    fn model_id<'a>(&'a self, prompt: &'a CompiledPrompt) -> &'a str {
        let name = prompt.model_name_override().unwrap_or(&self.model_name);
        name.strip_prefix("models/").unwrap_or(name)
    }

    fn build_request(prompt: &CompiledPrompt) -> GenerateRequest {
        let text = format!("{}\n\n{}", prompt.system_instructions(), prompt.user_body());
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: Some(text) }],
            }],
            generation_config: GenerationConfig {
                temperature: prompt.temperature(),
                max_output_tokens: prompt.max_tokens(),
            },
        }
    }
}

/// 拼接第一个候选的全部文本片段
fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl LlmModel for GeminiClient {
    fn label(&self) -> &str {
        Provider::Gemini.display_name()
    }

    async fn query(&self, prompt: &CompiledPrompt) -> AppResult<String> {
        let model = self.model_id(prompt).to_string();
        debug!("调用 Gemini API，模型: {}", model);

        let url = format!("{}/models/{}:generateContent", self.api_base_url, model);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!("Gemini API 调用失败: {}", e);
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

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::provider_failed(&model, e))?;

        debug!("Gemini API 调用成功");

        first_candidate_text(parsed).ok_or_else(|| ProviderError::EmptyContent { model }.into())
    }
}
