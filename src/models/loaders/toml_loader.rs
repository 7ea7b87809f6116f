use crate::error::{AppError, AppResult, ConfigError};
use crate::models::plan::RunPlan;
use std::path::{Path, PathBuf};
use tokio::fs;

const PLAN_FILE_NAMES: [&str; 2] = ["config.toml", "fux.toml"];

/// 从 TOML 文件加载运行计划
pub async fn load_run_plan(plan_path: &Path) -> AppResult<RunPlan> {
    let content = fs::read_to_string(plan_path)
        .await
        .map_err(|e| AppError::io(plan_path, e))?;

    let plan: RunPlan = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
        path: plan_path.to_path_buf(),
        source,
    })?;

    tracing::info!("已加载运行计划: {}", plan_path.display());
    Ok(plan)
}

/// 从起始目录向上查找运行计划文件
///
/// 遇到包含 `Cargo.toml` 的目录（项目根）后停止
pub fn find_run_plan(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        for name in PLAN_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if dir.join("Cargo.toml").exists() {
            break;
        }
    }
    None
}
