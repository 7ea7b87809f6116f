//! 应用入口 - 编排层
//!
//! 把命令行/运行计划翻译成一次单跑或一次批量运行：
//! 参数校验 → 创建模型 → 交给 `RunFlow` / `BatchDriver`。
//! 本层不解析命令行，`main.rs` 负责把 clap 参数转换成这里的请求结构。

use std::sync::Arc;

use tracing::info;

use crate::clients::{build_model, expand_models, list_available_models, LlmModel, ModelSpec};
use crate::config::Config;
use crate::error::{AppResult, ConfigError, NotFoundError, ValidationError};
use crate::infrastructure::{list_datatypes, list_file_ids, list_guides, ArtifactLocator};
use crate::models::{ContextMode, Datatype, RunPlan};
use crate::orchestrator::batch_processor::{prepare_tasks, BatchDriver, BatchReport};
use crate::utils::logging::log_startup;
use crate::workflow::{RunCtx, RunFlow, RunOutcome};

/// 单次运行参数
#[derive(Debug, Clone, Default)]
pub struct SingleRunRequest {
    pub file: String,
    pub datatype: String,
    /// 服务商或别名
    pub model: Option<String>,
    /// 具体模型名
    pub model_name: Option<String>,
    pub context: bool,
    pub guide: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub exam_date: Option<String>,
}

/// 批量运行参数
#[derive(Debug, Clone, Default)]
pub struct BatchRunRequest {
    /// 逗号分隔的模型列表，或 `all`
    pub models: String,
    /// 为空时使用数据集中的全部文件
    pub files: Vec<String>,
    /// 为空时使用数据集中的全部格式
    pub datatypes: Vec<String>,
    /// 每个取值各跑一遍，为空时只跑无 context
    pub contexts: Vec<bool>,
    pub guide: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub jobs: Option<usize>,
    pub retries: Option<usize>,
}

/// 运行计划的执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfiguredMode {
    Single,
    Batch,
    Auto,
}

/// 列表查询目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    Files,
    Datatypes,
    Guides,
    Models,
}

/// 运行计划执行结果
#[derive(Debug)]
pub enum ConfiguredOutcome {
    Single(RunOutcome),
    Batch(BatchReport),
}

/// 应用主结构
pub struct App {
    config: Config,
    locator: ArtifactLocator,
}

impl App {
    pub fn new(config: Config) -> Self {
        let locator = ArtifactLocator::for_dataset(&config.dataset_root());
        Self { config, locator }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========== 单次运行 ==========

    /// 运行一次
    pub async fn run_single(&self, request: &SingleRunRequest) -> AppResult<RunOutcome> {
        let spec = ModelSpec::resolve(request.model.as_deref(), request.model_name.as_deref())?;
        let model = build_model(&self.config, &spec)?;
        self.run_single_with(request, &spec, model.as_ref()).await
    }

    /// 使用指定模型运行一次
    pub async fn run_single_with(
        &self,
        request: &SingleRunRequest,
        spec: &ModelSpec,
        model: &dyn LlmModel,
    ) -> AppResult<RunOutcome> {
        log_startup("single", 1);

        if request.file.trim().is_empty() {
            return Err(ValidationError::EmptyFileId.into());
        }
        let datatype: Datatype = request.datatype.parse()?;
        self.validate_guide(request.context, request.guide.as_deref())?;

        let mut ctx = RunCtx::new(request.file.trim(), datatype);
        ctx.model_label = model.label().to_string();
        ctx.context = request.context;
        ctx.guide = request.guide.clone();
        ctx.exam_date = request.exam_date.clone();
        ctx.dataset = self.config.dataset.clone();
        ctx.temperature = request.temperature.unwrap_or(self.config.temperature);
        ctx.max_tokens = request.max_tokens.or(self.config.max_tokens);
        ctx.model_name_override = spec.model_name.clone();
        ctx.save = self.config.save;

        info!("{} 使用模型 {}", ctx, spec);
        RunFlow::new(&self.config).run(model, &ctx).await
    }

    // ========== 批量运行 ==========

    /// 批量运行
    pub async fn run_batch(&self, request: &BatchRunRequest) -> AppResult<BatchReport> {
        let specs = expand_models(&request.models)?;
        let models = specs
            .iter()
            .map(|spec| Ok((spec.clone(), build_model(&self.config, spec)?)))
            .collect::<AppResult<Vec<_>>>()?;
        self.run_batch_with(request, models).await
    }

    /// 使用指定模型批量运行
    pub async fn run_batch_with(
        &self,
        request: &BatchRunRequest,
        models: Vec<(ModelSpec, Arc<dyn LlmModel>)>,
    ) -> AppResult<BatchReport> {
        let jobs = request.jobs.unwrap_or(self.config.max_concurrent_runs);
        if jobs < 1 {
            return Err(ValidationError::InvalidJobs.into());
        }
        log_startup("batch", jobs);

        self.validate_dataset()?;
        let contexts = if request.contexts.is_empty() {
            vec![false]
        } else {
            request.contexts.clone()
        };
        // guide 只随 context 任务带出，有一个 context 任务即可
        self.validate_guide(contexts.contains(&true), request.guide.as_deref())?;

        let files = if request.files.is_empty() {
            list_file_ids(self.locator.encoded_root())
        } else {
            request.files.clone()
        };
        if files.is_empty() {
            return Err(ConfigError::InvalidPlan("数据集中没有可用的文件".to_string()).into());
        }

        let datatypes = if request.datatypes.is_empty() {
            list_datatypes(self.locator.encoded_root())
        } else {
            request
                .datatypes
                .iter()
                .map(|d| d.parse::<Datatype>())
                .collect::<Result<Vec<_>, _>>()?
        };
        if datatypes.is_empty() {
            return Err(ConfigError::InvalidPlan("数据集中没有可用的格式".to_string()).into());
        }

        let mut template = RunCtx::new("", Datatype::Mei);
        template.guide = request.guide.clone();
        template.dataset = self.config.dataset.clone();
        template.temperature = request.temperature.unwrap_or(self.config.temperature);
        template.max_tokens = request.max_tokens.or(self.config.max_tokens);
        template.save = self.config.save;

        let specs: Vec<ModelSpec> = models.iter().map(|(s, _)| s.clone()).collect();
        let tasks = prepare_tasks(&specs, &files, &datatypes, &contexts, &template);

        let retries = request.retries.unwrap_or(self.config.retries);
        let driver = BatchDriver::new(RunFlow::new(&self.config), models, jobs, retries)?;
        Ok(driver.run(tasks).await)
    }

    // ========== 运行计划 ==========

    /// 执行运行计划
    pub async fn run_configured(&self, plan: &RunPlan, mode: ConfiguredMode) -> AppResult<ConfiguredOutcome> {
        match resolve_mode(plan, mode)? {
            ConfiguredMode::Single => {
                let request = single_request_from_plan(plan)?;
                info!("按运行计划执行单次运行: {}", request.file);
                Ok(ConfiguredOutcome::Single(self.run_single(&request).await?))
            }
            _ => {
                let request = batch_request_from_plan(plan)?;
                info!("按运行计划执行批量运行: {}", request.models);
                Ok(ConfiguredOutcome::Batch(self.run_batch(&request).await?))
            }
        }
    }

    // ========== 列表 ==========

    pub fn list(&self, target: ListTarget) -> Vec<String> {
        match target {
            ListTarget::Files => list_file_ids(self.locator.encoded_root()),
            ListTarget::Datatypes => list_datatypes(self.locator.encoded_root())
                .into_iter()
                .map(|d| d.name().to_string())
                .collect(),
            ListTarget::Guides => list_guides(self.locator.guides_root()),
            ListTarget::Models => list_available_models().into_iter().map(str::to_string).collect(),
        }
    }

    // ========== 校验 ==========

    /// guide 需要 context，且必须能在数据集中找到
    fn validate_guide(&self, context: bool, guide: Option<&str>) -> AppResult<()> {
        let Some(guide) = guide.filter(|g| !g.trim().is_empty()) else {
            return Ok(());
        };
        if !context {
            return Err(ValidationError::GuideWithoutContext.into());
        }
        let available = list_guides(self.locator.guides_root());
        if self.locator.find_guide(guide).is_some() || available.iter().any(|g| g == guide) {
            return Ok(());
        }
        Err(ValidationError::UnknownGuide {
            guide: guide.to_string(),
            available: if available.is_empty() {
                "(无)".to_string()
            } else {
                available.join(", ")
            },
        }
        .into())
    }

    /// 数据集必须包含 encoded/ 与 prompts/
    fn validate_dataset(&self) -> AppResult<()> {
        for dir in [self.locator.encoded_root(), self.locator.prompts_root()] {
            if !dir.is_dir() {
                return Err(NotFoundError::DatasetDir(dir.to_path_buf()).into());
            }
        }
        Ok(())
    }
}

/// auto 模式下只能有一段启用
fn resolve_mode(plan: &RunPlan, mode: ConfiguredMode) -> AppResult<ConfiguredMode> {
    if mode != ConfiguredMode::Auto {
        return Ok(mode);
    }
    match (plan.single_run.enabled, plan.batch_run.enabled) {
        (true, true) => Err(ConfigError::InvalidPlan(
            "single_run 与 batch_run 同时启用，请只启用一个或显式指定模式".to_string(),
        )
        .into()),
        (true, false) => Ok(ConfiguredMode::Single),
        (false, true) => Ok(ConfiguredMode::Batch),
        (false, false) => Err(ConfigError::InvalidPlan(
            "single_run 与 batch_run 都未启用".to_string(),
        )
        .into()),
    }
}

fn single_request_from_plan(plan: &RunPlan) -> AppResult<SingleRunRequest> {
    let single = &plan.single_run;
    let file = single
        .file
        .clone()
        .ok_or_else(|| ConfigError::InvalidPlan("single_run.file 必填".to_string()))?;
    let datatype = single
        .datatype
        .clone()
        .ok_or_else(|| ConfigError::InvalidPlan("single_run.datatype 必填".to_string()))?;
    let guide = single.guide_path.clone().filter(|g| !g.trim().is_empty());

    Ok(SingleRunRequest {
        file,
        datatype,
        model: single.model.clone(),
        model_name: single.model_name.clone().filter(|n| !n.trim().is_empty()),
        context: guide.is_some(),
        guide,
        temperature: single.temperature,
        max_tokens: single.max_tokens,
        exam_date: None,
    })
}

fn batch_request_from_plan(plan: &RunPlan) -> AppResult<BatchRunRequest> {
    let batch = &plan.batch_run;
    if batch.models.is_empty() {
        return Err(ConfigError::InvalidPlan("batch_run.models 必填".to_string()).into());
    }
    let contexts = batch
        .context_modes()
        .into_iter()
        .map(|mode| mode == ContextMode::With)
        .collect();

    Ok(BatchRunRequest {
        models: batch.models.join(","),
        files: batch.files.clone(),
        datatypes: batch.datatypes.clone(),
        contexts,
        guide: batch.guide_path.clone().filter(|g| !g.trim().is_empty()),
        temperature: plan.temperature,
        max_tokens: plan.max_tokens,
        jobs: batch.parallel,
        retries: batch.retry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchRunPlan, SingleRunPlan};
    use std::fs;

    fn app_with_dataset() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data/fux-counterpoint");
        fs::create_dir_all(root.join("encoded/mei")).unwrap();
        fs::create_dir_all(root.join("encoded/abc")).unwrap();
        fs::create_dir_all(root.join("prompts")).unwrap();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::write(root.join("encoded/mei/Fux1.mei"), "<mei/>").unwrap();
        fs::write(root.join("encoded/abc/Fux2.abc"), "X:1").unwrap();
        fs::write(root.join("guides/Pierre-Guide.md"), "guide").unwrap();

        let config = Config {
            data_dir: dir.path().join("data"),
            outputs_dir: dir.path().join("outputs"),
            ..Config::default()
        };
        (dir, App::new(config))
    }

    #[test]
    fn test_list_targets() {
        let (_dir, app) = app_with_dataset();
        assert_eq!(app.list(ListTarget::Files), vec!["Fux1", "Fux2"]);
        assert_eq!(app.list(ListTarget::Datatypes), vec!["abc", "mei"]);
        assert_eq!(app.list(ListTarget::Guides), vec!["Pierre-Guide.md"]);
        assert_eq!(app.list(ListTarget::Models), vec!["chatgpt", "claude", "gemini"]);
    }

    #[test]
    fn test_guide_validation() {
        let (_dir, app) = app_with_dataset();
        assert!(app.validate_guide(false, None).is_ok());
        assert!(app.validate_guide(true, Some("Pierre-Guide.md")).is_ok());

        let err = app.validate_guide(false, Some("Pierre-Guide.md")).unwrap_err();
        assert!(err.is_validation());

        let err = app.validate_guide(true, Some("Nope.md")).unwrap_err();
        assert!(err.to_string().contains("Pierre-Guide.md"));
    }

    #[test]
    fn test_resolve_mode() {
        let mut plan = RunPlan::default();
        assert!(resolve_mode(&plan, ConfiguredMode::Auto).is_err());

        plan.batch_run.enabled = true;
        assert_eq!(resolve_mode(&plan, ConfiguredMode::Auto).unwrap(), ConfiguredMode::Batch);

        plan.single_run.enabled = true;
        assert!(resolve_mode(&plan, ConfiguredMode::Auto).is_err());
        assert_eq!(resolve_mode(&plan, ConfiguredMode::Single).unwrap(), ConfiguredMode::Single);
    }

    #[test]
    fn test_single_request_from_plan_enables_context_with_guide() {
        let plan = RunPlan {
            single_run: SingleRunPlan {
                enabled: true,
                file: Some("Fux1".to_string()),
                model: Some("claude".to_string()),
                datatype: Some("mei".to_string()),
                guide_path: Some("Pierre-Guide.md".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let request = single_request_from_plan(&plan).unwrap();
        assert!(request.context);
        assert_eq!(request.guide.as_deref(), Some("Pierre-Guide.md"));

        let missing = RunPlan::default();
        assert!(single_request_from_plan(&missing).is_err());
    }

    #[test]
    fn test_batch_request_from_plan() {
        let plan = RunPlan {
            temperature: Some(0.3),
            batch_run: BatchRunPlan {
                enabled: true,
                models: vec!["chatgpt".to_string(), "claude".to_string()],
                contexts: vec![ContextMode::With, ContextMode::Without],
                parallel: Some(4),
                ..Default::default()
            },
            ..Default::default()
        };
        let request = batch_request_from_plan(&plan).unwrap();
        assert_eq!(request.models, "chatgpt,claude");
        assert_eq!(request.contexts, vec![true, false]);
        assert_eq!(request.jobs, Some(4));
        assert_eq!(request.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_batch_requires_dataset_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::new(Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        });
        let err = app
            .run_batch_with(&BatchRunRequest::default(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::NotFound(_)));
    }
}
