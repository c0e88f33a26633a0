// src/runner/reporter.rs

//! Presentation hooks used by the runner, and the command line shown for a
//! task.

use colored::Colorize;
use serde_json::Value;

use crate::model::{Task, TaskStatus};

pub const UNPARSED_OVERRIDES_KEY: &str = "__overrides_unparsed__";

const PROGRAM_NAME: &str = "taskfork";

pub trait Reporter: Send + Sync {
    fn log_single_line(&self, text: &str);
    fn log_command(&self, command: &str);
    fn print_task_terminal_output(&self, task: &Task, status: TaskStatus, output: &str);
}

/// Writes to the parent's stdout.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn log_single_line(&self, text: &str) {
        println!("\n{} {}\n", " TASKFORK ".reversed().bold(), text);
    }

    fn log_command(&self, command: &str) {
        println!("{} {}\n", ">".dimmed(), command.bold());
    }

    fn print_task_terminal_output(&self, task: &Task, status: TaskStatus, output: &str) {
        let command = display_command(task);
        let header = match status {
            TaskStatus::Success => command.green(),
            TaskStatus::Failure => command.red(),
        };
        println!("{} {}\n", ">".dimmed(), header.bold());
        print!("{output}");
        if !output.is_empty() && !output.ends_with('\n') {
            println!();
        }
    }
}

/// `taskfork run project:target[:configuration] <overrides...>`.
///
/// This is the invocation of the build tool that schedules tasks, shown so a
/// failing task can be reproduced by hand. It is not a subcommand of this
/// binary, whose own entry points are `run-task` and `run-batch`.
///
/// If the overrides carry the raw argument list under
/// `__overrides_unparsed__`, it is appended verbatim. Otherwise each
/// override renders as a flag: `true` as `--key`, `false` and null are
/// dropped, arrays repeat the flag per element, other values as
/// `--key=value`.
pub fn printable_command_args(task: &Task) -> Vec<String> {
    let mut args = vec![
        PROGRAM_NAME.to_string(),
        "run".to_string(),
        task.target.to_string(),
    ];

    if let Some(Value::Array(raw)) = task.overrides.get(UNPARSED_OVERRIDES_KEY) {
        args.extend(raw.iter().map(render_scalar));
        return args;
    }

    for (key, value) in &task.overrides {
        match value {
            Value::Bool(true) => args.push(format!("--{key}")),
            Value::Bool(false) | Value::Null => {}
            Value::Array(items) => {
                args.extend(items.iter().map(|item| format!("--{key}={}", render_scalar(item))))
            }
            other => args.push(format!("--{key}={}", render_scalar(other))),
        }
    }
    args
}

pub fn display_command(task: &Task) -> String {
    printable_command_args(task).join(" ")
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
