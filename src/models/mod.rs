pub mod datatype;
pub mod loaders;
pub mod plan;
pub mod prompt;
pub mod run;

pub use datatype::Datatype;
pub use loaders::{find_run_plan, load_run_plan};
pub use plan::{BatchRunPlan, ContextMode, RunPlan, SingleRunPlan};
pub use prompt::{CompiledPrompt, PromptRequest, SectionKey};
pub use run::{OutputKind, RunIdentity};
