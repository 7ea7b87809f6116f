//! 业务能力层
//!
//! 每个服务只描述"我能做什么"，只处理单次运行，不关心流程顺序

pub mod artifact_writer;
pub mod prompt_assembler;
pub mod section_loader;

pub use artifact_writer::{ArtifactWriter, PersistedArtifacts, RunRecord};
pub use prompt_assembler::PromptAssembler;
pub use section_loader::{apply_dataset_layout, SectionLoader};
