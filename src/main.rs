use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use fux_prompt_bench::error::AppError;
use fux_prompt_bench::models::{find_run_plan, load_run_plan};
use fux_prompt_bench::utils::logging;
use fux_prompt_bench::{
    App, BatchRunRequest, Config, ConfiguredMode, ConfiguredOutcome, ListTarget, SingleRunRequest,
};

#[derive(Parser)]
#[command(name = "fux-prompt-bench")]
#[command(version, about = "Run music-theory prompts against ChatGPT, Claude and Gemini", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root data directory (contains dataset subfolders)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Dataset name inside data-dir
    #[arg(long, global = true)]
    dataset: Option<String>,

    /// Where to save model responses
    #[arg(long, global = true)]
    outputs_dir: Option<PathBuf>,

    /// Don't save outputs to disk
    #[arg(long, global = true)]
    no_save: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single prompt
    Single {
        /// File ID, e.g. Fux_CantusFirmus
        #[arg(long)]
        file: String,

        /// Encoding format: abc, humdrum, mei, musicxml
        #[arg(long)]
        datatype: String,

        /// Provider (chatgpt, claude, gemini) or a specific model name
        #[arg(long)]
        model: Option<String>,

        /// Specific model name, overrides the provider default
        #[arg(long)]
        model_name: Option<String>,

        /// Include contextual guides
        #[arg(long)]
        context: bool,

        /// Guide to use (requires --context)
        #[arg(long)]
        guide: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<i64>,

        /// Exam date directory for date-scoped encoded files
        #[arg(long)]
        exam_date: Option<String>,
    },
    /// Run the cartesian product of models, files, datatypes and contexts
    Batch {
        /// Comma-separated models or 'all'
        #[arg(long)]
        models: String,

        /// File IDs (default: all discovered)
        #[arg(long, num_args = 1..)]
        files: Vec<String>,

        /// Formats (default: all discovered)
        #[arg(long, num_args = 1..)]
        datatypes: Vec<String>,

        /// Include contextual guides
        #[arg(long)]
        context: bool,

        /// Run every task with and without context
        #[arg(long, conflicts_with = "context")]
        both_contexts: bool,

        #[arg(long)]
        guide: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        max_tokens: Option<i64>,

        /// Number of parallel jobs
        #[arg(long)]
        jobs: Option<usize>,

        /// Number of retry rounds for failed runs
        #[arg(long)]
        retry: Option<usize>,
    },
    /// Run the plan in config.toml
    Configured {
        #[arg(value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,

        /// Plan file (default: config.toml found upwards from the current directory)
        #[arg(long)]
        plan: Option<PathBuf>,
    },
    /// List available resources and exit
    List {
        #[arg(value_enum)]
        target: ListArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Single,
    Batch,
    Auto,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListArg {
    Files,
    Datatypes,
    Guides,
    Models,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    logging::init(cli.verbose || config.verbose_logging);

    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = dir;
    }
    if let Some(dataset) = cli.dataset.clone() {
        config.dataset = dataset;
    }
    if let Some(dir) = cli.outputs_dir.clone() {
        config.outputs_dir = dir;
    }
    if cli.no_save {
        config.save = false;
    }

    match run(cli.command, App::new(config)).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("❌ {:#}", e);
            exit_code_for(&e)
        }
    }
}

/// 返回 `Ok(false)` 表示批量运行中有任务最终失败
async fn run(command: Commands, app: App) -> Result<bool> {
    match command {
        Commands::Single {
            file,
            datatype,
            model,
            model_name,
            context,
            guide,
            temperature,
            max_tokens,
            exam_date,
        } => {
            let request = SingleRunRequest {
                file,
                datatype,
                model,
                model_name,
                context,
                guide,
                temperature,
                max_tokens,
                exam_date,
            };
            let outcome = app.run_single(&request).await?;
            println!("{}", outcome.response);
            Ok(true)
        }
        Commands::Batch {
            models,
            files,
            datatypes,
            context,
            both_contexts,
            guide,
            temperature,
            max_tokens,
            jobs,
            retry,
        } => {
            let contexts = if both_contexts {
                vec![true, false]
            } else {
                vec![context]
            };
            let request = BatchRunRequest {
                models,
                files,
                datatypes,
                contexts,
                guide,
                temperature,
                max_tokens,
                jobs,
                retries: retry,
            };
            let report = app.run_batch(&request).await?;
            Ok(report.all_succeeded())
        }
        Commands::Configured { mode, plan } => {
            let plan_path = match plan {
                Some(path) => path,
                None => {
                    let cwd = std::env::current_dir()?;
                    find_run_plan(&cwd).ok_or_else(|| anyhow!("未找到 config.toml"))?
                }
            };
            let plan = load_run_plan(&plan_path).await?;
            let mode = match mode {
                ModeArg::Single => ConfiguredMode::Single,
                ModeArg::Batch => ConfiguredMode::Batch,
                ModeArg::Auto => ConfiguredMode::Auto,
            };
            match app.run_configured(&plan, mode).await? {
                ConfiguredOutcome::Single(outcome) => {
                    println!("{}", outcome.response);
                    Ok(true)
                }
                ConfiguredOutcome::Batch(report) => Ok(report.all_succeeded()),
            }
        }
        Commands::List { target } => {
            let target = match target {
                ListArg::Files => ListTarget::Files,
                ListArg::Datatypes => ListTarget::Datatypes,
                ListArg::Guides => ListTarget::Guides,
                ListArg::Models => ListTarget::Models,
            };
            let items = app.list(target);
            if items.is_empty() {
                info!("(无)");
            }
            for item in items {
                println!("{}", item);
            }
            Ok(true)
        }
    }
}

/// 校验与配置错误退出码为 2，其余为 1
fn exit_code_for(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<AppError>() {
        Some(AppError::Validation(_)) | Some(AppError::Config(_)) => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}
