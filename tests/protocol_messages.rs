// tests/protocol_messages.rs

mod common;
use crate::common::{TaskBuilder, TaskGraphBuilder};

use serde_json::json;
use taskfork::model::TaskResult;
use taskfork::protocol::{BatchMessage, CompleteBatchExecution, RunTaskRequest, RunTasks};

#[test]
fn run_tasks_is_tagged_and_camel_cased() -> Result<(), serde_json::Error> {
    let graph = TaskGraphBuilder::new().build_task("app").build();
    let message = BatchMessage::RunTasks(RunTasks {
        executor_name: "@acme/jest".to_string(),
        batch_task_graph: graph.clone(),
        full_task_graph: graph,
    });

    let value = serde_json::to_value(&message)?;

    assert_eq!(value["type"], "runTasks");
    assert_eq!(value["executorName"], "@acme/jest");
    assert_eq!(value["batchTaskGraph"]["roots"], json!(["app:build"]));
    assert!(value["fullTaskGraph"]["tasks"]["app:build"].is_object());
    Ok(())
}

#[test]
fn completion_is_decoded_with_results() -> Result<(), serde_json::Error> {
    let value = json!({
        "type": "completeBatchExecution",
        "results": {
            "app:test": { "success": true, "terminalOutput": "ok" },
            "lib:test": { "success": false }
        }
    });

    match BatchMessage::try_from(value)? {
        BatchMessage::CompleteBatchExecution(CompleteBatchExecution { results }) => {
            assert_eq!(results["app:test"], TaskResult::succeeded("ok"));
            assert_eq!(results["lib:test"], TaskResult::failed_without_output());
        }
        other => panic!("expected completion, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_and_untagged_messages_pass_through_unchanged() -> Result<(), serde_json::Error> {
    for value in [
        json!({ "type": "progress", "done": 3 }),
        json!({ "hello": "world" }),
        json!([1, 2, 3]),
        json!("plain string"),
    ] {
        assert_eq!(
            BatchMessage::try_from(value.clone())?,
            BatchMessage::Passthrough(value.clone())
        );
        assert_eq!(serde_json::to_value(BatchMessage::Passthrough(value.clone()))?, value);
    }
    Ok(())
}

#[test]
fn known_tag_with_bad_body_is_an_error() {
    let value = json!({ "type": "completeBatchExecution", "results": "nope" });
    assert!(BatchMessage::try_from(value).is_err());
}

#[test]
fn single_task_request_shape() -> Result<(), serde_json::Error> {
    let task = TaskBuilder::new("app", "serve")
        .override_value("port", json!(4200))
        .build();
    let graph = TaskGraphBuilder::new().task(task.clone()).build();

    let value = serde_json::to_value(RunTaskRequest::for_task(&task, &graph, false))?;

    assert_eq!(
        value,
        json!({
            "targetDescription": { "project": "app", "target": "serve" },
            "overrides": { "port": 4200 },
            "taskGraph": {
                "roots": ["app:serve"],
                "tasks": {
                    "app:serve": {
                        "id": "app:serve",
                        "target": { "project": "app", "target": "serve" },
                        "overrides": { "port": 4200 }
                    }
                },
                "dependencies": { "app:serve": [] }
            },
            "isVerbose": false
        })
    );
    assert!(value.get("type").is_none());
    Ok(())
}
