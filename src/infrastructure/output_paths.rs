//! 输出路径推导 - 基础设施层
//!
//! 目录结构：
//!
//! ```text
//! <outputs_root>/<output_kind>/<model_label>/<context_label>/temp-<T.1f>/<datatype>/
//!     <file_id>_<context_label>_<run_number><extension>
//! ```
//!
//! 运行编号每次调用时重新扫描目录得出（不缓存），重复运行不会覆盖旧文件。
//! 选中的路径以 create-new 方式创建一个空文件占位：编号被并发的另一个任务
//! 抢先占用时重新扫描，所以同一目录下的编号分配是原子的。

use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult, ValidationError};
use crate::models::RunIdentity;

/// 未使用 guide 时的上下文标签
pub const NO_CONTEXT_LABEL: &str = "no-context";

const GUIDE_SUFFIX: &str = "-Guide";

/// 输出路径推导器
#[derive(Debug, Clone)]
pub struct OutputPathDeriver {
    outputs_root: PathBuf,
}

impl OutputPathDeriver {
    pub fn new(outputs_root: impl Into<PathBuf>) -> Self {
        Self {
            outputs_root: outputs_root.into(),
        }
    }

    pub fn outputs_root(&self) -> &Path {
        &self.outputs_root
    }

    /// 推导产物路径，返回前保证父目录已存在，并以空文件占住该路径
    ///
    /// # 参数
    /// - `identity`: 运行标识
    /// - `extension`: 扩展名（带或不带点均可，空字符串表示无扩展名）
    ///
    /// # 返回
    /// 该目录下尚未使用的下一个运行编号对应的路径
    pub fn derive_path(&self, identity: &RunIdentity, extension: &str) -> AppResult<PathBuf> {
        if identity.file_id.trim().is_empty() {
            return Err(ValidationError::EmptyFileId.into());
        }

        let label = context_label(identity.context_enabled, identity.guide_reference.as_deref());
        let extension = normalize_extension(extension);

        let dir = self
            .outputs_root
            .join(identity.output_kind.dir_name())
            .join(&identity.model_label)
            .join(&label)
            .join(temperature_dir(identity.temperature))
            .join(identity.datatype.name());

        std::fs::create_dir_all(&dir).map_err(|e| AppError::io(&dir, e))?;

        let base_name = format!("{}_{}", identity.file_id, label);
        loop {
            let run_number = next_run_number(&dir, &base_name, &extension)?;
            let path = dir.join(format!("{}_{}{}", base_name, run_number, extension));
            match reserve(&path) {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tracing::debug!("运行编号 {} 已被占用，重新扫描: {}", run_number, path.display());
                }
                Err(e) => return Err(AppError::io(&path, e)),
            }
        }
    }
}

/// 上下文标签
///
/// 开启 context 且给了 guide 时取 guide 文件名（去扩展名），并去掉结尾的
/// `-Guide`；其余情况都是 `no-context`。标签总是非空
pub fn context_label(context_enabled: bool, guide_reference: Option<&str>) -> String {
    let guide = match guide_reference {
        Some(g) if context_enabled && !g.trim().is_empty() => g,
        _ => return NO_CONTEXT_LABEL.to_string(),
    };
    let Some(stem) = Path::new(guide)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
    else {
        return NO_CONTEXT_LABEL.to_string();
    };
    // 去掉后缀后为空（如 `-Guide.md`）时保留原文件名
    match stem.strip_suffix(GUIDE_SUFFIX) {
        Some(prefix) if !prefix.is_empty() => prefix.to_string(),
        _ => stem,
    }
}

/// `temp-0.0` / `temp-0.7`
pub fn temperature_dir(temperature: f64) -> String {
    format!("temp-{:.1}", temperature)
}

/// 只在文件不存在时创建，绝不覆盖
fn reserve(path: &Path) -> std::io::Result<()> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(|_| ())
}

fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}

fn suffix_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// 扫描目录，返回 `max(已有编号) + 1`，没有已有文件时为 1
///
/// 与 `<base_name><ext>` 同名的文件（无编号）视为第 1 次运行
pub fn next_run_number(dir: &Path, base_name: &str, extension: &str) -> AppResult<u64> {
    if !dir.exists() {
        return Ok(1);
    }
    let entries = std::fs::read_dir(dir).map_err(|e| AppError::io(dir, e))?;
    let numbered_prefix = format!("{}_", base_name);

    let mut max_seen: Option<u64> = None;
    for entry in entries {
        let path = entry.map_err(|e| AppError::io(dir, e))?.path();
        if !path.is_file() || suffix_of(&path) != extension {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let candidate = if stem == base_name {
            Some(1)
        } else {
            stem.strip_prefix(&numbered_prefix)
                .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|n| n.parse::<u64>().ok())
        };
        if let Some(n) = candidate {
            max_seen = Some(max_seen.map_or(n, |m| m.max(n)));
        }
    }

    match max_seen {
        None => Ok(1),
        Some(m) => m
            .checked_add(1)
            .ok_or_else(|| ValidationError::RunNumberExhausted(dir.to_path_buf()).into()),
    }
}
