//! 运行计划（config.toml）
//!
//! `[single_run]` 与 `[batch_run]` 两段，`enabled = true` 的那一段会被执行

use serde::Deserialize;

/// 运行计划文件
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunPlan {
    /// 全局温度，batch 使用
    pub temperature: Option<f64>,
    /// 全局 max_tokens，batch 使用
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub single_run: SingleRunPlan,
    #[serde(default)]
    pub batch_run: BatchRunPlan,
}

/// 单次运行配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SingleRunPlan {
    #[serde(default)]
    pub enabled: bool,
    pub file: Option<String>,
    /// 服务商（chatgpt / claude / gemini）
    pub model: Option<String>,
    /// 具体模型名，会覆盖服务商默认模型
    pub model_name: Option<String>,
    pub datatype: Option<String>,
    /// 设置后自动开启 context
    pub guide_path: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
}

/// 批量运行配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRunPlan {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub datatypes: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    /// "with" / "without"，每种 context 模式各跑一遍
    #[serde(default)]
    pub contexts: Vec<ContextMode>,
    pub guide_path: Option<String>,
    /// 并发数
    pub parallel: Option<usize>,
    pub retry: Option<usize>,
}

/// 批量运行的 context 模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    With,
    Without,
}

impl BatchRunPlan {
    /// 未配置时默认只跑无 context
    pub fn context_modes(&self) -> Vec<ContextMode> {
        if self.contexts.is_empty() {
            vec![ContextMode::Without]
        } else {
            self.contexts.clone()
        }
    }
}
