use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use lineage::config::Config;
use lineage::execution::informer_chain;
use lineage::{builtin, llog, Error, Event, Parameters, Result, Task, TaskScheduler, TaskStatus};

/// Lineage - run operations and record their provenance
#[derive(Parser, Debug)]
#[command(name = "lineage")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    LINEAGE_DEBUG=1     Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.lineage/lineage.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Configuration file (defaults to ~/.lineage/lineage.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Dispatch an operation, wait for it, and print the task as JSON
    Run {
        /// Operation id
        operation: String,

        /// Entity the operation acts on (a URI)
        #[arg(short, long)]
        target: Option<String>,

        /// Operation parameter as key=value; repeatable
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// List the available operations
    Ops,
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[derive(Serialize)]
struct RunReport {
    status: TaskStatus,
    task: Task,
    /// Informer chain of the task's event, newest first.
    provenance: Vec<Event>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    lineage::log::init_with_debug(cli.debug || config.debug);
    llog!("lineage starting: {:?}", cli.command);

    let scheduler = TaskScheduler::from_config(builtin::registry()?, &config)?;

    match cli.command {
        Command::Ops => {
            for id in scheduler.operations() {
                println!("{}", id);
            }
            Ok(())
        }
        Command::Run {
            operation,
            target,
            params,
        } => {
            let parameters: Parameters = params.into_iter().collect();
            let task = scheduler.dispatch(target.as_deref(), &operation, parameters)?;
            let status = scheduler.wait_for_ending(&task);

            let provenance = match task.running_event() {
                Some(event) => informer_chain(scheduler.services().events.as_ref(), &event.id)?,
                None => Vec::new(),
            };
            let report = RunReport {
                status,
                task: task.snapshot(),
                provenance,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);

            match status {
                TaskStatus::Done => Ok(()),
                _ => Err(Error::OperationFailed {
                    operation,
                    message: task.failure().unwrap_or_else(|| status.to_string()),
                }),
            }
        }
    }
}
