//! 运行上下文
//!
//! 封装"我正在用哪个模型跑哪份乐谱的哪种格式"这一信息

use std::fmt::Display;

use crate::infrastructure::Lookup;
use crate::models::{Datatype, OutputKind, RunIdentity};

/// 单次运行的上下文
///
/// 包含一次运行所需的全部参数，模型本身单独传入
#[derive(Debug, Clone)]
pub struct RunCtx {
    /// 任务序号（仅用于日志显示）
    pub task_index: usize,
    /// 模型标签（仅用于日志显示，落盘以模型自身的 label 为准）
    pub model_label: String,
    pub file_id: String,
    pub datatype: Datatype,
    pub context: bool,
    pub guide: Option<String>,
    /// 旧版数据集的考试日期目录
    pub exam_date: Option<String>,
    pub dataset: String,
    pub temperature: f64,
    pub max_tokens: Option<i64>,
    pub model_name_override: Option<String>,
    /// 为 false 时不推导路径、不写文件
    pub save: bool,
}

impl RunCtx {
    /// 创建新的运行上下文，其余参数取默认值
    pub fn new(file_id: impl Into<String>, datatype: Datatype) -> Self {
        Self {
            task_index: 1,
            model_label: String::new(),
            file_id: file_id.into(),
            datatype,
            context: false,
            guide: None,
            exam_date: None,
            dataset: "fux-counterpoint".to_string(),
            temperature: 0.0,
            max_tokens: None,
            model_name_override: None,
            save: true,
        }
    }

    pub fn lookup(&self) -> Lookup<'_> {
        Lookup::new(&self.file_id, self.datatype)
            .with_context(self.context)
            .with_exam_date(self.exam_date.as_deref())
    }

    /// 回复产物的运行标识
    pub fn identity(&self, model_label: &str) -> RunIdentity {
        RunIdentity {
            model_label: model_label.to_string(),
            file_id: self.file_id.clone(),
            datatype: self.datatype,
            context_enabled: self.context,
            guide_reference: self.guide.clone(),
            temperature: self.temperature,
            output_kind: OutputKind::Response,
        }
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[任务 #{} {}/{}/{}]",
            self.task_index, self.model_label, self.file_id, self.datatype
        )
    }
}
