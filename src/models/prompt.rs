//! 提示词数据契约
//!
//! `PromptRequest` 是组装器的输入，`CompiledPrompt` 是交给模型的最终结果

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 提示词正文中的一个具名段落
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    FormatInstructions,
    EncodedScore,
    Guides,
    TaskText,
}

impl SectionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::FormatInstructions => "format_instructions",
            SectionKey::EncodedScore => "encoded_score",
            SectionKey::Guides => "guides",
            SectionKey::TaskText => "task_text",
        }
    }

    /// 把字符串列表解析为段落顺序，无法识别的键直接丢弃
    pub fn filter_known<S: AsRef<str>>(keys: &[S]) -> Vec<SectionKey> {
        keys.iter()
            .filter_map(|k| k.as_ref().parse::<SectionKey>().ok())
            .collect()
    }
}

impl FromStr for SectionKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 同时接受旧版数据集里的命名
        match s {
            "format_instructions" | "format_prompt" => Ok(SectionKey::FormatInstructions),
            "encoded_score" | "encoded_data" => Ok(SectionKey::EncodedScore),
            "guides" => Ok(SectionKey::Guides),
            "task_text" | "question_prompt" => Ok(SectionKey::TaskText),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 组装器的输入
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    /// 系统指令（可以为空）
    pub system_instructions: String,
    pub format_instructions: String,
    pub encoded_score: String,
    /// 上下文指南，空白项在组装前被过滤
    pub guides: Vec<Option<String>>,
    pub task_text: String,
    /// 在 `build` 时才校验
    pub temperature: f64,
    pub max_tokens: Option<i64>,
    pub model_name_override: Option<String>,
    /// `None` 时使用固定的旧版顺序
    pub section_order: Option<Vec<SectionKey>>,
    pub section_headers: HashMap<SectionKey, String>,
}

impl PromptRequest {
    /// 使用默认（旧版）顺序创建请求
    pub fn new(
        format_instructions: impl Into<String>,
        encoded_score: impl Into<String>,
        guides: Vec<Option<String>>,
        task_text: impl Into<String>,
    ) -> Self {
        Self {
            format_instructions: format_instructions.into(),
            encoded_score: encoded_score.into(),
            guides,
            task_text: task_text.into(),
            ..Default::default()
        }
    }

    pub fn with_system_instructions(mut self, system: impl Into<String>) -> Self {
        self.system_instructions = system.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<i64>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_model_name_override(mut self, name: Option<String>) -> Self {
        self.model_name_override = name;
        self
    }

    pub fn with_section_order(mut self, order: Vec<SectionKey>) -> Self {
        self.section_order = Some(order);
        self
    }

    pub fn with_header(mut self, key: SectionKey, header: impl Into<String>) -> Self {
        self.section_headers.insert(key, header.into());
        self
    }

    /// 去掉 None / 空白后的指南列表（保持原有顺序）
    pub fn normalized_guides(&self) -> Vec<&str> {
        self.guides
            .iter()
            .flatten()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .collect()
    }
}

/// 交给模型的最终提示词，构建后不可变
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPrompt {
    system_instructions: String,
    user_body: String,
    temperature: f64,
    model_name_override: Option<String>,
    max_tokens: Option<u32>,
}

impl CompiledPrompt {
    pub(crate) fn new(
        system_instructions: String,
        user_body: String,
        temperature: f64,
        model_name_override: Option<String>,
        max_tokens: Option<u32>,
    ) -> Self {
        Self {
            system_instructions,
            user_body,
            temperature,
            model_name_override,
            max_tokens,
        }
    }

    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }

    pub fn user_body(&self) -> &str {
        &self.user_body
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn model_name_override(&self) -> Option<&str> {
        self.model_name_override.as_deref()
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_known_drops_unknown_keys() {
        let order = SectionKey::filter_known(&["task_text", "bogus", "encoded_data", "guides"]);
        assert_eq!(
            order,
            vec![SectionKey::TaskText, SectionKey::EncodedScore, SectionKey::Guides]
        );
    }

    #[test]
    fn test_normalized_guides() {
        let req = PromptRequest::new(
            "F",
            "D",
            vec![
                Some(" A ".to_string()),
                None,
                Some(String::new()),
                Some("  ".to_string()),
                Some("B".to_string()),
            ],
            "Q",
        );
        assert_eq!(req.normalized_guides(), vec!["A", "B"]);
    }
}
