use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Datatype;

/// 一次运行落盘的三类产物
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// 模型原始回复
    Response,
    /// 编译后的提示词 + 元数据
    Prompt,
    /// 所有原始组件的 JSON
    Input,
}

impl OutputKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            OutputKind::Response => "response",
            OutputKind::Prompt => "prompt",
            OutputKind::Input => "input",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// 只用于推导输出路径的运行标识，不带行为
#[derive(Debug, Clone, PartialEq)]
pub struct RunIdentity {
    pub model_label: String,
    pub file_id: String,
    pub datatype: Datatype,
    pub context_enabled: bool,
    pub guide_reference: Option<String>,
    pub temperature: f64,
    pub output_kind: OutputKind,
}

impl RunIdentity {
    /// 同一次运行的另一类产物
    pub fn for_kind(&self, output_kind: OutputKind) -> Self {
        Self {
            output_kind,
            ..self.clone()
        }
    }
}
