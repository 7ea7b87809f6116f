//! 单次运行流程 - 流程层
//!
//! 核心职责：定义"一次运行"的完整处理流程
//!
//! 流程顺序：
//! 1. 读取源文本 → 组装并校验提示词
//! 2. 调用模型（可选超时）
//! 3. 写入三类产物（尽力而为）
//!
//! 状态：`Created → PromptBuilt → ModelQueried → Persisted | Failed`。
//! 流程内部不重试，重试由批量编排层以整个任务为单位进行。

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::clients::LlmModel;
use crate::config::Config;
use crate::error::{AppResult, ProviderError, ValidationError};
use crate::infrastructure::ArtifactLocator;
use crate::services::{ArtifactWriter, PersistedArtifacts, PromptAssembler, RunRecord, SectionLoader};
use crate::utils::truncate_text;
use crate::workflow::run_ctx::RunCtx;

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    PromptBuilt,
    ModelQueried,
    Persisted,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Created => "CREATED",
            RunState::PromptBuilt => "PROMPT_BUILT",
            RunState::ModelQueried => "MODEL_QUERIED",
            RunState::Persisted => "PERSISTED",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// 运行结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub response: String,
    pub api_duration: Duration,
    /// `save = false` 时为 `None`
    pub artifacts: Option<PersistedArtifacts>,
    pub state: RunState,
}

/// 单次运行流程
///
/// - 编排 读取 → 组装 → 调用 → 落盘
/// - 模型错误原样向上传递
/// - 落盘失败只记警告
/// - 不持有模型，模型由调用方传入
pub struct RunFlow {
    loader: SectionLoader,
    writer: ArtifactWriter,
    request_timeout: Option<Duration>,
}

impl RunFlow {
    /// 按配置创建流程
    pub fn new(config: &Config) -> Self {
        Self {
            loader: SectionLoader::new(ArtifactLocator::for_dataset(&config.dataset_root())),
            writer: ArtifactWriter::new(&config.outputs_dir),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_parts(loader: SectionLoader, writer: ArtifactWriter) -> Self {
        Self {
            loader,
            writer,
            request_timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn run(&self, model: &dyn LlmModel, ctx: &RunCtx) -> AppResult<RunOutcome> {
        let result = self.execute(model, ctx).await;
        if let Err(e) = &result {
            error!("{} ❌ 状态 {}: {}", ctx, RunState::Failed, e);
        }
        result
    }

    async fn execute(&self, model: &dyn LlmModel, ctx: &RunCtx) -> AppResult<RunOutcome> {
        let mut state = RunState::Created;
        debug!("{} 状态 {}", ctx, state);

        if ctx.file_id.trim().is_empty() {
            return Err(ValidationError::EmptyFileId.into());
        }

        // ========== 步骤 1: 组装提示词 ==========
        let request = self
            .loader
            .load(&ctx.lookup(), ctx.guide.as_deref(), &ctx.dataset)?
            .with_temperature(ctx.temperature)
            .with_max_tokens(ctx.max_tokens)
            .with_model_name_override(ctx.model_name_override.clone());
        let prompt = PromptAssembler::new(&request).build()?;
        state = RunState::PromptBuilt;
        debug!(
            "{} 状态 {}，正文 {} 字符: {}",
            ctx,
            state,
            prompt.user_body().chars().count(),
            truncate_text(prompt.user_body(), 80)
        );

        info!(
            "{} 🚀 dataset={} context={} temp={:.1}",
            ctx, ctx.dataset, ctx.context, ctx.temperature
        );

        // ========== 步骤 2: 调用模型 ==========
        let started = Instant::now();
        let response = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, model.query(&prompt))
                .await
                .map_err(|_| ProviderError::Timeout {
                    model: model.label().to_string(),
                    secs: limit.as_secs(),
                })??,
            None => model.query(&prompt).await?,
        };
        let api_duration = started.elapsed();
        state = RunState::ModelQueried;
        info!(
            "{} ✓ 收到回复 ({} 字符, {:.2}s)",
            ctx,
            response.chars().count(),
            api_duration.as_secs_f64()
        );

        // ========== 步骤 3: 落盘 ==========
        if !ctx.save {
            debug!("{} 未开启保存，跳过落盘", ctx);
            return Ok(RunOutcome {
                response,
                api_duration,
                artifacts: None,
                state,
            });
        }

        let identity = ctx.identity(model.label());
        let record = RunRecord {
            identity: &identity,
            dataset: &ctx.dataset,
            exam_date: ctx.exam_date.as_deref(),
            request: &request,
            prompt: &prompt,
            response: &response,
            api_duration,
        };
        let artifacts = self.writer.persist(&record).await;
        state = RunState::Persisted;
        debug!("{} 状态 {}，警告 {} 条", ctx, state, artifacts.warnings());

        Ok(RunOutcome {
            response,
            api_duration,
            artifacts: Some(artifacts),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{CompiledPrompt, Datatype};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoModel {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl EchoModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl LlmModel for EchoModel {
        fn label(&self) -> &str {
            "Claude"
        }

        async fn query(&self, prompt: &CompiledPrompt) -> AppResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            Ok(format!("echo: {}", prompt.user_body().len()))
        }
    }

    fn dataset(root: &Path) {
        fs::create_dir_all(root.join("encoded/mei")).unwrap();
        fs::create_dir_all(root.join("prompts/base")).unwrap();
        fs::write(root.join("encoded/mei/Fux1.mei"), "<mei/>").unwrap();
        fs::write(root.join("prompts/base/base_mei.md"), "Answer in MEI.").unwrap();
        fs::write(root.join("prompts/prompt.md"), "Complete the exercise.").unwrap();
    }

    fn flow(data: &Path, out: &Path) -> RunFlow {
        RunFlow::with_parts(
            SectionLoader::new(ArtifactLocator::for_dataset(data)),
            ArtifactWriter::new(out),
        )
    }

    #[tokio::test]
    async fn test_run_persists_and_reaches_final_state() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        dataset(data.path());
        let model = EchoModel::new();

        let outcome = flow(data.path(), out.path())
            .run(&model, &RunCtx::new("Fux1", Datatype::Mei))
            .await
            .unwrap();

        assert_eq!(outcome.state, RunState::Persisted);
        let artifacts = outcome.artifacts.unwrap();
        assert_eq!(artifacts.warnings(), 0);
        assert!(artifacts
            .response_path
            .unwrap()
            .ends_with("response/Claude/no-context/temp-0.0/mei/Fux1_no-context_1.mei"));
    }

    #[tokio::test]
    async fn test_invalid_temperature_fails_before_any_write() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        dataset(data.path());
        let model = EchoModel::new();
        let mut ctx = RunCtx::new("Fux1", Datatype::Mei);
        ctx.temperature = 1.5;

        let err = flow(data.path(), out.path()).run(&model, &ctx).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_save_disabled_writes_nothing() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        dataset(data.path());
        let model = EchoModel::new();
        let mut ctx = RunCtx::new("Fux1", Datatype::Mei);
        ctx.save = false;

        let outcome = flow(data.path(), out.path()).run(&model, &ctx).await.unwrap();

        assert_eq!(outcome.state, RunState::ModelQueried);
        assert!(outcome.artifacts.is_none());
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_id_is_validation_error() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let model = EchoModel::new();

        let err = flow(data.path(), out.path())
            .run(&model, &RunCtx::new("  ", Datatype::Mei))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::EmptyFileId)));
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_provider_error() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        dataset(data.path());
        let model = EchoModel {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_secs(5)),
        };

        let err = flow(data.path(), out.path())
            .with_timeout(Some(Duration::from_millis(20)))
            .run(&model, &RunCtx::new("Fux1", Datatype::Mei))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Provider(ProviderError::Timeout { .. })));
    }
}
