// tests/config_loading.rs

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use taskfork::cli::LogLevel;
use taskfork::config::{PREFIX_OUTPUT_ENV, RunnerConfig, VERBOSE_ENV, load_and_validate, load_from_path};
use taskfork::errors::TaskforkError;
use taskfork::logging::resolve_level;
use taskfork::pool::WorkerCommand;

#[test]
fn full_config_is_loaded() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[worker]
program = "/opt/build/bin/tool"
args = ["__task-worker", "--fast"]

[batch_worker]
program = "/opt/build/bin/tool"
args = ["__batch-worker"]

[output]
prefix = true
verbose = true
message_drain_ms = 250
"#
    )?;

    let raw = load_from_path(file.path())?;
    let config = RunnerConfig::try_from(raw)?;

    assert_eq!(
        config.task_worker,
        WorkerCommand::new("/opt/build/bin/tool")
            .arg("__task-worker")
            .arg("--fast")
    );
    assert_eq!(config.batch_worker.args, vec!["__batch-worker".to_string()]);
    assert!(config.prefix_output);
    assert!(config.verbose);
    assert_eq!(config.message_drain, Duration::from_millis(250));
    Ok(())
}

#[test]
fn empty_file_falls_back_to_current_executable() -> Result<(), Box<dyn std::error::Error>> {
    let file = NamedTempFile::new()?;

    let raw = load_from_path(file.path())?;
    let config = RunnerConfig::try_from(raw)?;

    let exe = std::env::current_exe()?;
    assert_eq!(config.task_worker.program, exe.to_string_lossy());
    assert_eq!(config.task_worker.args, vec!["__task-worker".to_string()]);
    assert_eq!(config.batch_worker.args, vec!["__batch-worker".to_string()]);
    assert!(!config.prefix_output);
    assert_eq!(config.message_drain, Duration::from_millis(100));
    Ok(())
}

#[test]
fn empty_worker_program_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[worker]
program = "  "
"#
    )?;

    match load_and_validate(file.path()) {
        Err(TaskforkError::ConfigError(msg)) => assert!(msg.contains("[worker].program")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    Ok(())
}

#[test]
fn malformed_toml_is_a_toml_error() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    write!(file, "[output\nprefix = ")?;

    assert!(matches!(
        load_from_path(file.path()),
        Err(TaskforkError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn environment_overrides_only_when_set() {
    let base = RunnerConfig::new(WorkerCommand::new("w"), WorkerCommand::new("b"))
        .with_prefix_output(true);

    let env: HashMap<&str, &str> = [(VERBOSE_ENV, "true")].into_iter().collect();
    let config = base.clone().with_env_overrides(|k| env.get(k).map(|v| v.to_string()));
    assert!(config.verbose);
    assert!(config.prefix_output, "unset variable keeps file value");

    let env: HashMap<&str, &str> = [(PREFIX_OUTPUT_ENV, "1")].into_iter().collect();
    let config = base.with_env_overrides(|k| env.get(k).map(|v| v.to_string()));
    assert!(!config.prefix_output, "only the literal `true` enables");
}

#[test]
fn log_level_priority() {
    assert_eq!(resolve_level(Some(LogLevel::Debug), Some("error")), tracing::Level::DEBUG);
    assert_eq!(resolve_level(None, Some(" WARNING ")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("bogus")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}

#[test]
fn config_flag_defaults_to_the_shared_path() -> Result<(), clap::Error> {
    use clap::Parser;
    use taskfork::cli::CliArgs;
    use taskfork::config::DEFAULT_CONFIG_PATH;

    let args = CliArgs::try_parse_from(["taskfork", "__batch-worker"])?;
    assert_eq!(args.config, DEFAULT_CONFIG_PATH);

    let args = CliArgs::try_parse_from(["taskfork", "--config", "ci.toml", "__batch-worker"])?;
    assert_eq!(args.config, "ci.toml");
    Ok(())
}
