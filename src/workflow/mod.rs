pub mod run_ctx;
pub mod run_flow;

pub use run_ctx::RunCtx;
pub use run_flow::{RunFlow, RunOutcome, RunState};
