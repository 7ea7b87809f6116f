//! 基础设施层
//!
//! 只暴露文件系统能力：读文本、定位源文件、推导输出路径。
//! 不认识模型，也不关心一次运行的流程。

pub mod artifact_locator;
pub mod output_paths;
pub mod text_loader;

pub use artifact_locator::{
    find_encoded_file, find_question_file, list_datatypes, list_file_ids, list_guides,
    ArtifactLocator, Lookup,
};
pub use output_paths::{context_label, OutputPathDeriver, NO_CONTEXT_LABEL};
pub use text_loader::load_text_file;
