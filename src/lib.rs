//! # Fux Prompt Bench
//!
//! 把乐理题目（格式说明 + 乐谱编码 + guide + 题目）组装成提示词，
//! 发给 ChatGPT / Claude / Gemini，并把回复、提示词、输入包按运行编号落盘。
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露文件系统能力
//! - `load_text_file` - 读取并去除首尾空白
//! - `ArtifactLocator` - 按布局策略查找编码、题目、格式说明、guide
//! - `OutputPathDeriver` - 推导 `<kind>/<model>/<context>/temp-X.X/<datatype>/<file>_<context>_<N>.<ext>`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 只处理单次运行
//! - `SectionLoader` - 读齐所有源文本
//! - `PromptAssembler` - 按段落顺序组装并校验提示词
//! - `ArtifactWriter` - 写 response / prompt / input 三类产物
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次运行"的完整处理流程
//! - `RunCtx` - 一次运行的全部参数
//! - `RunFlow` - 流程编排（加载 → 组装 → 调用 → 落盘）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 单跑、批量、运行计划、列表
//! - `orchestrator/batch_processor` - 批量展开、并发与重试
//!
//! 另有 `clients/`（模型适配器）、`models/`（数据类型）、`utils/`（日志与文本工具）。

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{build_model, LlmModel, ModelSpec, Provider};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{CompiledPrompt, Datatype, PromptRequest, RunPlan, SectionKey};
pub use orchestrator::{App, BatchRunRequest, ConfiguredMode, ConfiguredOutcome, ListTarget, SingleRunRequest};
pub use services::PromptAssembler;
pub use infrastructure::OutputPathDeriver;
pub use workflow::{RunCtx, RunFlow, RunOutcome};
