//! 文本加载 - 基础设施层
//!
//! 只负责"读一个 UTF-8 文本文件并去掉首尾空白"

use std::path::Path;

use crate::error::{AppError, AppResult, NotFoundError};

/// 读取 UTF-8 文本并去掉首尾空白
///
/// 路径不是已存在的文件时返回 `NotFound`
pub fn load_text_file(path: &Path) -> AppResult<String> {
    if !path.is_file() {
        return Err(NotFoundError::TextFile(path.to_path_buf()).into());
    }
    let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
    Ok(content.trim().to_string())
}
