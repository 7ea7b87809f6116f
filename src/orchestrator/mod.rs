//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 把一次命令（单跑 / 批量 / 运行计划 / 列表）调度成若干次 `RunFlow`，
//! 负责参数校验、模型创建、并发、重试和全局统计。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 校验 datatype / guide / 数据集目录 / jobs
//! - 创建模型客户端（同时检查 API Key）
//! - 执行运行计划，auto 模式下只允许启用一段
//! - 列出文件、格式、guide、模型
//!
//! ### `batch_processor` - 批量运行处理器
//! - 展开 模型 × 文件 × 格式 × context
//! - 控制并发数量（Semaphore）
//! - 失败任务整轮重试
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! app (单跑 / 批量 / 运行计划)
//!     ↓
//! batch_processor (处理 Vec<BatchTask>)
//!     ↓
//! workflow::RunFlow (处理单次运行)
//!     ↓
//! services (能力层：加载 / 组装 / 落盘)
//!     ↓
//! infrastructure (基础设施：读文件 / 定位 / 输出路径)
//! ```

pub mod app;
pub mod batch_processor;

// 重新导出主要类型
pub use app::{App, BatchRunRequest, ConfiguredMode, ConfiguredOutcome, ListTarget, SingleRunRequest};
pub use batch_processor::{prepare_tasks, BatchDriver, BatchReport, BatchTask, ProcessingStats};
