// tests/batch_execution.rs

mod common;
use crate::common::{Harness, ReporterEvent, TaskGraphBuilder, TestResult, with_timeout, workers};

use serde_json::json;
use taskfork::errors::TaskforkError;
use taskfork::model::{Batch, TaskGraph, TaskResult};
use taskfork::protocol::ControlSender;

/// app:build <- lib:build, plus an unrelated docs:build.
fn full_graph() -> TaskGraph {
    TaskGraphBuilder::new()
        .build_task("app")
        .build_task("lib")
        .build_task("docs")
        .depends_on("app:build", &["lib:build"])
        .build()
}

#[tokio::test]
async fn completed_batch_returns_worker_results_unchanged() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["app:build", "lib:build"]);

    let completion = json!({
        "type": "completeBatchExecution",
        "results": {
            "app:build": { "success": true, "terminalOutput": "built app\n" },
            "lib:build": { "success": false, "terminalOutput": "lib failed\n" }
        }
    });
    let h = Harness::new(workers::replying(&[completion], 0));

    let results = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await?;

    assert_eq!(results.len(), 2);
    assert_eq!(results["app:build"], TaskResult::succeeded("built app\n"));
    assert_eq!(
        results["lib:build"],
        TaskResult {
            success: false,
            terminal_output: "lib failed\n".to_string()
        }
    );
    Ok(())
}

#[tokio::test]
async fn worker_receives_run_tasks_with_both_graphs() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["app:build", "lib:build"]);

    let (upstream, mut forwarded) = ControlSender::detached();
    let mut h = Harness::new(workers::echoing_request());
    h.runner = h.runner.with_upstream(upstream);

    // The echo worker never completes, so the batch fails once it exits.
    let result = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await;
    assert!(matches!(result, Err(TaskforkError::BatchIncomplete { .. })));

    let echoed = with_timeout(forwarded.recv()).await.ok_or("nothing forwarded")?;
    let request = &echoed["echo"];
    assert_eq!(request["type"], "runTasks");
    assert_eq!(request["executorName"], "@acme/tsc");
    assert_eq!(request["batchTaskGraph"]["roots"], json!(["lib:build"]));
    assert!(request["batchTaskGraph"]["tasks"].get("docs:build").is_none());
    assert!(request["fullTaskGraph"]["tasks"].get("docs:build").is_some());
    Ok(())
}

#[tokio::test]
async fn worker_crash_fails_batch_with_root_results_only() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["app:build", "lib:build"]);
    let h = Harness::new(workers::exiting_with(1));

    let err = with_timeout(h.runner.run_batch(&batch, &graph, &h.env))
        .await
        .expect_err("batch should fail");

    assert_eq!(
        err.to_string(),
        "\"@acme/tsc\" exited unexpectedly with code: 1"
    );
    match err {
        TaskforkError::BatchExited {
            executor,
            code,
            results,
        } => {
            assert_eq!(executor, "@acme/tsc");
            assert_eq!(code, 1);
            assert_eq!(results.len(), 1);
            assert_eq!(results["lib:build"], TaskResult::failed_without_output());
            assert!(!results.contains_key("app:build"));
        }
        other => panic!("expected BatchExited, got {other:?}"),
    }
    assert_eq!(h.pool().live_count(), 0);
    Ok(())
}

#[tokio::test]
async fn signalled_worker_reports_derived_code() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);
    let h = Harness::new(workers::killed_by("KILL"));

    let err = with_timeout(h.runner.run_batch(&batch, &graph, &h.env))
        .await
        .expect_err("batch should fail");

    match err {
        TaskforkError::BatchExited { code, results, .. } => {
            assert_eq!(code, 128);
            assert_eq!(results.len(), 1);
        }
        other => panic!("expected BatchExited, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn clean_exit_without_completion_is_incomplete() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);
    let h = Harness::new(workers::exiting_with(0));

    let result = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await;

    match result {
        Err(TaskforkError::BatchIncomplete { executor }) => assert_eq!(executor, "@acme/tsc"),
        other => panic!("expected BatchIncomplete, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn passthrough_messages_are_forwarded_upstream() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);

    let progress = json!({ "kind": "progress", "done": 1 });
    let completion = json!({
        "type": "completeBatchExecution",
        "results": { "docs:build": { "success": true, "terminalOutput": "" } }
    });
    let (upstream, mut forwarded) = ControlSender::detached();
    let mut h = Harness::new(workers::replying(&[progress.clone(), completion], 0));
    h.runner = h.runner.with_upstream(upstream);

    let results = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await?;
    assert!(results["docs:build"].success);

    let relayed = with_timeout(forwarded.recv()).await.ok_or("nothing forwarded")?;
    assert_eq!(relayed, progress);
    Ok(())
}

#[tokio::test]
async fn multi_task_batch_prints_summary_line() -> TestResult {
    let graph = full_graph();
    let batch = Batch::new("@acme/tsc", graph.clone());
    let h = Harness::new(workers::exiting_with(0));

    let _ = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await;

    assert_eq!(
        h.reporter.events(),
        vec![ReporterEvent::SingleLine(
            "Running 3 tasks with @acme/tsc".to_string()
        )]
    );
    Ok(())
}

#[tokio::test]
async fn single_task_batch_prints_its_command() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);
    let h = Harness::new(workers::exiting_with(0));

    let _ = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await;

    assert_eq!(
        h.reporter.events(),
        vec![ReporterEvent::Command("taskfork run docs:build".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn spawn_failure_leaves_pool_empty() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);
    let h = Harness::new(taskfork::pool::WorkerCommand::new(
        "/nonexistent/taskfork-worker",
    ));

    let result = h.runner.run_batch(&batch, &graph, &h.env).await;

    assert!(matches!(result, Err(TaskforkError::Spawn { .. })));
    assert_eq!(h.pool().live_count(), 0);
    Ok(())
}

#[tokio::test]
async fn undecodable_control_line_does_not_close_the_channel() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);
    let completion = json!({
        "type": "completeBatchExecution",
        "results": { "docs:build": { "success": true, "terminalOutput": "docs\n" } }
    });
    let h = Harness::new(workers::script(&format!(
        "read -r _ <&3; printf '\\377\\n' >&3; printf '%s\\n' '{completion}' >&3; exit 0"
    )));

    let results = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await?;

    assert_eq!(results["docs:build"], TaskResult::succeeded("docs\n"));
    Ok(())
}

#[tokio::test]
async fn completion_written_before_a_failing_exit_still_wins() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);
    let completion = json!({
        "type": "completeBatchExecution",
        "results": { "docs:build": { "success": true, "terminalOutput": "" } }
    });
    // The worker exits first; a background child still holding fd 3
    // delivers the completion afterwards.
    let h = Harness::new(workers::script(&format!(
        "read -r _ <&3; (sleep 0.2; printf '%s\\n' '{completion}' >&3) & exit 1"
    )));

    let results = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await?;

    assert_eq!(results.len(), 1);
    assert!(results["docs:build"].success);
    Ok(())
}

#[tokio::test]
async fn only_passthrough_messages_flow_after_completion() -> TestResult {
    let graph = full_graph();
    let batch = Batch::from_graph("@acme/tsc", &graph, ["docs:build"]);

    let first = json!({
        "type": "completeBatchExecution",
        "results": { "docs:build": { "success": true, "terminalOutput": "first" } }
    });
    let second = json!({
        "type": "completeBatchExecution",
        "results": { "docs:build": { "success": false, "terminalOutput": "second" } }
    });
    let progress = json!({ "kind": "progress", "done": 1 });
    let (upstream, mut forwarded) = ControlSender::detached();
    let mut h = Harness::new(workers::replying(&[first, second, progress.clone()], 0));
    h.runner = h.runner.with_upstream(upstream);

    let results = with_timeout(h.runner.run_batch(&batch, &graph, &h.env)).await?;
    assert_eq!(results["docs:build"], TaskResult::succeeded("first"));

    let relayed = with_timeout(forwarded.recv()).await.ok_or("nothing forwarded")?;
    assert_eq!(relayed, progress);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(forwarded.try_recv().is_err(), "typed message leaked upstream");
    Ok(())
}
