//! 批量运行处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **任务展开**：模型 × 文件 × 格式 × context 的笛卡尔积
//! 2. **并发控制**：使用 Semaphore 限制同时运行的任务数
//! 3. **失败重试**：整轮结束后把失败任务重新跑一遍，最多 `retries` 轮，无退避
//! 4. **全局统计**：按任务标识汇总结果，不依赖完成顺序
//!
//! ## 设计特点
//!
//! - **无共享可变状态**：每个任务只读自己的源文件、只写自己的输出路径
//! - **向下委托**：单次运行交给 `workflow::RunFlow`

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::clients::{LlmModel, ModelSpec};
use crate::error::{AppResult, ValidationError};
use crate::models::Datatype;
use crate::utils::logging::{log_retry_round, log_tasks_prepared, print_final_stats};
use crate::workflow::{RunCtx, RunFlow};

/// 一个批量任务
#[derive(Debug, Clone)]
pub struct BatchTask {
    pub spec: ModelSpec,
    pub ctx: RunCtx,
}

impl BatchTask {
    /// 用于失败列表的简短描述
    pub fn describe(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.spec,
            self.ctx.file_id,
            self.ctx.datatype,
            if self.ctx.context { "context" } else { "nocontext" }
        )
    }
}

/// 展开任务
///
/// # 参数
/// - `models` / `files` / `datatypes` / `contexts`: 各维度取值
/// - `template`: 其余参数（dataset、温度、guide、保存开关等）
///
/// # 返回
/// 按 模型 → 文件 → 格式 → context 顺序排列的任务，序号从 1 开始
pub fn prepare_tasks(
    models: &[ModelSpec],
    files: &[String],
    datatypes: &[Datatype],
    contexts: &[bool],
    template: &RunCtx,
) -> Vec<BatchTask> {
    let mut tasks = Vec::new();
    for spec in models {
        for file_id in files {
            for &datatype in datatypes {
                for &context in contexts {
                    let mut ctx = template.clone();
                    ctx.task_index = tasks.len() + 1;
                    ctx.model_label = spec.label().to_string();
                    ctx.file_id = file_id.clone();
                    ctx.datatype = datatype;
                    ctx.context = context;
                    ctx.guide = if context { template.guide.clone() } else { None };
                    ctx.model_name_override = spec.model_name.clone();
                    tasks.push(BatchTask {
                        spec: spec.clone(),
                        ctx,
                    });
                }
            }
        }
    }
    tasks
}

/// 处理统计
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

/// 批量运行结果
#[derive(Debug, Default)]
pub struct BatchReport {
    pub stats: ProcessingStats,
    /// 重试后仍失败的任务及最后一次错误
    pub failures: Vec<(BatchTask, String)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 批量驱动器
pub struct BatchDriver {
    flow: Arc<RunFlow>,
    models: Vec<(ModelSpec, Arc<dyn LlmModel>)>,
    jobs: usize,
    retries: usize,
}

impl BatchDriver {
    /// 创建驱动器，`jobs` 必须 >= 1
    pub fn new(
        flow: RunFlow,
        models: Vec<(ModelSpec, Arc<dyn LlmModel>)>,
        jobs: usize,
        retries: usize,
    ) -> AppResult<Self> {
        if jobs < 1 {
            return Err(ValidationError::InvalidJobs.into());
        }
        Ok(Self {
            flow: Arc::new(flow),
            models,
            jobs,
            retries,
        })
    }

    fn model_for(&self, spec: &ModelSpec) -> Option<Arc<dyn LlmModel>> {
        self.models
            .iter()
            .find(|(s, _)| s == spec)
            .map(|(_, m)| Arc::clone(m))
    }

    /// 运行全部任务
    pub async fn run(&self, tasks: Vec<BatchTask>) -> BatchReport {
        let total = tasks.len();
        let model_count = {
            let mut specs: Vec<&ModelSpec> = tasks.iter().map(|t| &t.spec).collect();
            specs.dedup();
            specs.len()
        };
        let file_count = distinct(tasks.iter().map(|t| t.ctx.file_id.as_str()));
        let datatype_count = distinct(tasks.iter().map(|t| t.ctx.datatype.name()));
        log_tasks_prepared(total, model_count, file_count, datatype_count, self.jobs);

        let mut failures = self.execute_round(tasks).await;

        for attempt in 1..=self.retries {
            if failures.is_empty() {
                break;
            }
            log_retry_round(attempt, self.retries, failures.len());
            let pending = failures.into_iter().map(|(task, _)| task).collect();
            failures = self.execute_round(pending).await;
        }

        let stats = ProcessingStats {
            success: total - failures.len(),
            failed: failures.len(),
            total,
        };
        let lines: Vec<String> = failures
            .iter()
            .map(|(task, e)| format!("{}: {}", task.describe(), e))
            .collect();
        print_final_stats(stats.success, stats.failed, stats.total, &lines);

        BatchReport { stats, failures }
    }

    /// 跑一轮，返回失败的任务（按任务序号排序）
    async fn execute_round(&self, tasks: Vec<BatchTask>) -> Vec<(BatchTask, String)> {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut handles = Vec::new();
        let mut failures: BTreeMap<usize, (BatchTask, String)> = BTreeMap::new();

        for task in tasks {
            let index = task.ctx.task_index;
            let Some(model) = self.model_for(&task.spec) else {
                error!("{} ❌ 未找到模型 {}", task.ctx, task.spec);
                let reason = format!("未找到模型 {}", task.spec);
                failures.insert(index, (task, reason));
                continue;
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    failures.insert(index, (task, e.to_string()));
                    continue;
                }
            };
            let flow = Arc::clone(&self.flow);
            let ctx = task.ctx.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                flow.run(model.as_ref(), &ctx)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            });
            handles.push((task, handle));
        }

        // 等待本轮所有任务完成
        for (task, handle) in handles {
            let index = task.ctx.task_index;
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures.insert(index, (task, e));
                }
                Err(e) => {
                    error!("{} 任务执行失败: {}", task.ctx, e);
                    failures.insert(index, (task, e.to_string()));
                }
            }
        }

        info!("本轮完成，失败 {} 个", failures.len());
        failures.into_values().collect()
    }
}

fn distinct<'a>(items: impl Iterator<Item = &'a str>) -> usize {
    let mut seen: Vec<&str> = items.collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}
