//! 产物写入服务 - 业务能力层
//!
//! 只负责"把一次运行的三类产物写到磁盘"，不关心流程：
//!
//! - response：模型回复原文
//! - prompt：元数据头 + 系统指令 + 编译后的用户正文
//! - input：全部原始组件的 JSON
//!
//! 三次写入互相独立，任何一次失败只记一条警告，不影响另外两次。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::infrastructure::OutputPathDeriver;
use crate::models::{CompiledPrompt, OutputKind, PromptRequest, RunIdentity};

/// 一次运行需要落盘的全部信息
#[derive(Debug, Clone, Copy)]
pub struct RunRecord<'a> {
    /// 运行标识（output_kind 会被逐一替换）
    pub identity: &'a RunIdentity,
    pub dataset: &'a str,
    pub exam_date: Option<&'a str>,
    /// 组装前的原始组件
    pub request: &'a PromptRequest,
    pub prompt: &'a CompiledPrompt,
    pub response: &'a str,
    pub api_duration: Duration,
}

/// 写入结果，失败的产物路径为 `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedArtifacts {
    pub response_path: Option<PathBuf>,
    pub prompt_path: Option<PathBuf>,
    pub input_path: Option<PathBuf>,
}

impl PersistedArtifacts {
    /// 失败的写入次数
    pub fn warnings(&self) -> usize {
        [&self.response_path, &self.prompt_path, &self.input_path]
            .iter()
            .filter(|p| p.is_none())
            .count()
    }
}

/// 产物写入服务
///
/// 职责：
/// - 为每类产物推导路径（路径推导会占住文件）
/// - 写入内容，失败时记录警告
/// - 只处理单次运行
pub struct ArtifactWriter {
    deriver: OutputPathDeriver,
}

impl ArtifactWriter {
    pub fn new(outputs_root: impl Into<PathBuf>) -> Self {
        Self {
            deriver: OutputPathDeriver::new(outputs_root),
        }
    }

    pub fn with_deriver(deriver: OutputPathDeriver) -> Self {
        Self { deriver }
    }

    pub fn outputs_root(&self) -> &Path {
        self.deriver.outputs_root()
    }

    /// 写入三类产物
    ///
    /// # 返回
    /// 各产物的实际路径；单个写入失败不会返回错误
    pub async fn persist(&self, record: &RunRecord<'_>) -> PersistedArtifacts {
        let response_path = self
            .write_artifact(
                record,
                OutputKind::Response,
                record.identity.datatype.extension(),
                record.response.to_string(),
            )
            .await;

        let prompt_text = render_prompt_file(record, response_path.as_deref());
        let prompt_path = self
            .write_artifact(record, OutputKind::Prompt, ".txt", prompt_text)
            .await;

        let input_path = match serde_json::to_string_pretty(&input_bundle(record)) {
            Ok(text) => self.write_artifact(record, OutputKind::Input, ".json", text).await,
            Err(e) => {
                warn!("⚠️ 输入组件序列化失败: {}", e);
                None
            }
        };

        PersistedArtifacts {
            response_path,
            prompt_path,
            input_path,
        }
    }

    async fn write_artifact(
        &self,
        record: &RunRecord<'_>,
        kind: OutputKind,
        extension: &str,
        content: String,
    ) -> Option<PathBuf> {
        match self.try_write(record, kind, extension, content).await {
            Ok(path) => {
                info!("✓ 已保存 {}: {}", kind, path.display());
                Some(path)
            }
            Err(e) => {
                warn!("⚠️ 保存 {} 失败: {}", kind, e);
                None
            }
        }
    }

    async fn try_write(
        &self,
        record: &RunRecord<'_>,
        kind: OutputKind,
        extension: &str,
        content: String,
    ) -> AppResult<PathBuf> {
        let path = self
            .deriver
            .derive_path(&record.identity.for_kind(kind), extension)?;
        let written = tokio::fs::write(&path, content).await;
        release_on_failure(&path, written).await?;
        Ok(path)
    }
}

/// 写入失败时删除占位的空文件，避免它被算作一次运行
async fn release_on_failure(path: &Path, written: std::io::Result<()>) -> AppResult<()> {
    let Err(e) = written else {
        return Ok(());
    };
    if let Err(rm) = tokio::fs::remove_file(path).await {
        warn!("⚠️ 清理占位文件失败 {}: {}", path.display(), rm);
    }
    Err(AppError::io(path, e))
}

/// 组件名与字符数，guides 为各项之和
fn component_lengths(request: &PromptRequest) -> [(&'static str, usize); 4] {
    let guides: usize = request.normalized_guides().iter().map(|g| g.chars().count()).sum();
    [
        ("format_prompt", request.format_instructions.chars().count()),
        ("encoded_data", request.encoded_score.chars().count()),
        ("guides", guides),
        ("question_prompt", request.task_text.chars().count()),
    ]
}

/// prompt 产物的完整文本
pub fn render_prompt_file(record: &RunRecord<'_>, response_path: Option<&Path>) -> String {
    let identity = record.identity;
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S %:z");

    let mut lines = vec![
        "=== MODEL PARAMETERS ===".to_string(),
        format!("Timestamp: {}", timestamp),
        format!("File: {}", identity.file_id),
        format!("Dataset: {}", record.dataset),
        format!("Datatype: {}", identity.datatype),
        format!(
            "Context: {}",
            if identity.context_enabled { "context" } else { "nocontext" }
        ),
        format!(
            "Guide File: {}",
            identity.guide_reference.as_deref().unwrap_or("None")
        ),
        format!("Model: {}", identity.model_label),
        format!("Temperature: {:?}", record.prompt.temperature()),
        format!(
            "Max Tokens: {}",
            record
                .prompt
                .max_tokens()
                .map_or_else(|| "None".to_string(), |n| n.to_string())
        ),
        format!("API Duration: {:.2} seconds", record.api_duration.as_secs_f64()),
        format!(
            "Response Path: {}",
            response_path.map_or_else(|| "None".to_string(), |p| p.display().to_string())
        ),
    ];

    if let Some(name) = record.prompt.model_name_override() {
        lines.push(format!("Model Name Override: {}", name));
    }
    if let Some(date) = record.exam_date {
        lines.push(format!("Exam Date: {}", date));
    }

    lines.push(String::new());
    lines.push("Component Lengths:".to_string());
    for (key, len) in component_lengths(record.request) {
        lines.push(format!("  {}: {} chars", key, len));
    }

    let system = record.prompt.system_instructions().trim();
    if !system.is_empty() {
        lines.push(String::new());
        lines.push("=== SYSTEM PROMPT ===".to_string());
        lines.push(system.to_string());
    }

    lines.push(String::new());
    lines.push("=== USER PROMPT ===".to_string());
    lines.push(record.prompt.user_body().to_string());

    lines.join("\n")
}

/// input 产物的 JSON
pub fn input_bundle(record: &RunRecord<'_>) -> serde_json::Value {
    let identity = record.identity;
    let request = record.request;
    json!({
        "file_id": identity.file_id,
        "dataset": record.dataset,
        "datatype": identity.datatype.name(),
        "context": identity.context_enabled,
        "guide_path": identity.guide_reference,
        "exam_date": record.exam_date,
        "temperature": record.prompt.temperature(),
        "max_tokens": record.prompt.max_tokens(),
        "model": identity.model_label,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "system_prompt": record.prompt.system_instructions(),
        "user_prompt_compiled": record.prompt.user_body(),
        "model_name_override": record.prompt.model_name_override(),
        "format_prompt": request.format_instructions,
        "encoded_data": request.encoded_score,
        "guides": request.normalized_guides(),
        "question_prompt": request.task_text,
    })
}
