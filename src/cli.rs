// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_PATH;

/// Command-line arguments for `taskfork`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskfork",
    version,
    about = "Run build tasks in forked worker processes.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). A missing file means defaults.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKFORK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run one task from a task graph in its own worker.
    RunTask {
        /// Task graph as JSON.
        #[arg(long, value_name = "PATH")]
        graph: PathBuf,

        /// Id of the task to run.
        #[arg(long, value_name = "ID")]
        task: String,

        /// Where the terminal output is stored.
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Show output live.
        #[arg(long)]
        stream: bool,

        /// Attach the worker to this terminal; the worker stores its own output.
        #[arg(long)]
        direct: bool,
    },

    /// Run several tasks of one executor in a single batch worker.
    RunBatch {
        /// Task graph as JSON.
        #[arg(long, value_name = "PATH")]
        graph: PathBuf,

        #[arg(long, value_name = "NAME")]
        executor: String,

        /// Tasks to include; every task in the graph when omitted.
        #[arg(long = "task", value_name = "ID")]
        tasks: Vec<String>,
    },

    /// Fallback single-task worker, forked when no worker is configured.
    #[command(name = "__task-worker", hide = true)]
    TaskWorker,

    /// Fallback batch worker, forked when no batch worker is configured.
    #[command(name = "__batch-worker", hide = true)]
    BatchWorker,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
