// tests/fallback_workers.rs

mod common;
use crate::common::{Harness, TaskBuilder, TaskGraphBuilder, TestResult, with_timeout};

use std::path::Path;

use taskfork::config::{BATCH_WORKER_ARG, RunnerConfig, TASK_WORKER_ARG};
use taskfork::model::Batch;
use taskfork::pool::WorkerCommand;
use taskfork::runner::RunOptions;
use taskfork::worker::NO_EXECUTOR_EXIT_CODE;

fn self_forking_config() -> RunnerConfig {
    let exe = env!("CARGO_BIN_EXE_taskfork");
    RunnerConfig::new(
        WorkerCommand::new(exe).arg(TASK_WORKER_ARG),
        WorkerCommand::new(exe).arg(BATCH_WORKER_ARG),
    )
}

#[tokio::test]
async fn fallback_batch_worker_fails_every_task() -> TestResult {
    let graph = TaskGraphBuilder::new()
        .build_task("app")
        .build_task("lib")
        .depends_on("app:build", &["lib:build"])
        .build();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["app:build", "lib:build"]);
    let h = Harness::with_config(self_forking_config());

    let results = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await?;

    assert_eq!(results.len(), 2);
    for (id, result) in &results {
        assert!(!result.success, "{id} should fail");
        assert!(result.terminal_output.contains("@acme/tsc"));
    }
    Ok(())
}

#[tokio::test]
async fn fallback_task_worker_reports_missing_executor() -> TestResult {
    let graph = TaskGraphBuilder::new().build_task("app").build();
    let task = TaskBuilder::new("app", "build").build();
    let h = Harness::with_config(self_forking_config());
    let options = RunOptions {
        stream_output: false,
        output_path: Path::new("/tmp/taskfork-tests/fallback-app-build.log"),
        task_graph: &graph,
        env: &h.env,
    };

    let result = with_timeout(h.runner.run_captured(&task, options)).await?;

    assert_eq!(result.code, NO_EXECUTOR_EXIT_CODE);
    assert!(result.terminal_output.contains("No executor is configured to run app:build."));
    Ok(())
}
