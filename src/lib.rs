// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod model;
pub mod output;
pub mod pool;
pub mod protocol;
pub mod runner;
pub mod worker;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{error, info};

use crate::cli::{CliArgs, Command};
use crate::config::load_or_default;
use crate::errors::TaskforkError;
use crate::model::{Batch, Environment, TaskGraph};
use crate::pool::ProcessPool;
use crate::pool::signals::install_signal_handlers;
use crate::protocol::ControlChannel;
use crate::runner::{RunOptions, TaskProcessRunner};

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::RunTask {
            graph,
            task,
            output,
            stream,
            direct,
        } => {
            let runner = build_runner(&args.config)?;
            run_task(&runner, &graph, &task, &output, stream, direct).await
        }
        Command::RunBatch {
            graph,
            executor,
            tasks,
        } => {
            let runner = build_runner(&args.config)?;
            run_batch(&runner, &graph, executor, &tasks).await
        }
        Command::TaskWorker => Ok(worker::run_task_worker().await?),
        Command::BatchWorker => Ok(worker::run_batch_worker().await?),
    }
}

/// Wire config, pool, signal handlers and, when we were forked by another
/// runner, the upstream control channel.
fn build_runner(config_path: &str) -> Result<TaskProcessRunner> {
    let config = load_or_default(config_path)
        .with_context(|| format!("loading config from '{config_path}'"))?;

    let pool = ProcessPool::new();
    install_signal_handlers(pool.clone())?;

    let runner = TaskProcessRunner::new(pool, config);
    Ok(match ControlChannel::from_env()? {
        Some(upstream) => runner.attach_upstream(upstream),
        None => runner,
    })
}

async fn run_task(
    runner: &TaskProcessRunner,
    graph_path: &Path,
    task_id: &str,
    output: &Path,
    stream: bool,
    direct: bool,
) -> Result<i32> {
    let graph = read_graph(graph_path)?;
    let task = graph
        .task(task_id)
        .cloned()
        .ok_or_else(|| anyhow!("task '{task_id}' not found in task graph"))?;

    let env = Environment::new();
    let options = RunOptions {
        stream_output: stream,
        output_path: output,
        task_graph: &graph,
        env: &env,
    };
    let result = if direct {
        runner.run_direct(&task, options).await?
    } else {
        runner.run_captured(&task, options).await?
    };

    info!(task = %task.id, exit_code = result.code, "run-task finished");
    Ok(result.code)
}

async fn run_batch(
    runner: &TaskProcessRunner,
    graph_path: &Path,
    executor: String,
    tasks: &[String],
) -> Result<i32> {
    let graph = read_graph(graph_path)?;
    let batch = if tasks.is_empty() {
        Batch::new(executor, graph.clone())
    } else {
        Batch::from_graph(executor, &graph, tasks.iter().map(String::as_str))
    };

    match runner.run_batch(&batch, &graph, &Environment::new()).await {
        Ok(results) => {
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(0)
        }
        Err(TaskforkError::BatchExited {
            executor,
            code,
            results,
        }) => {
            println!("{}", serde_json::to_string_pretty(&results)?);
            error!(executor = %executor, exit_code = code, "batch worker exited unexpectedly");
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}

fn read_graph(path: &Path) -> Result<TaskGraph> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading task graph {:?}", path))?;
    let graph: TaskGraph = serde_json::from_str(&contents)
        .with_context(|| format!("parsing task graph {:?}", path))?;
    Ok(graph)
}
