pub mod toml_loader;

pub use toml_loader::{find_run_plan, load_run_plan};
