#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

pub use taskfork_test_utils::builders::{TaskBuilder, TaskGraphBuilder, runner_config};
pub use taskfork_test_utils::fakes::{
    MemoryOutputStore, RecordingReporter, ReporterEvent, SharedBuffer, recording_terminal,
};
pub use taskfork_test_utils::{init_tracing, with_timeout, workers};

use taskfork::config::RunnerConfig;
use taskfork::model::Environment;
use taskfork::pool::{ProcessPool, WorkerCommand};
use taskfork::runner::TaskProcessRunner;

pub type TestResult = Result<(), Box<dyn Error>>;

/// A runner on a fresh pool, with a recording reporter and in-memory store.
pub struct Harness {
    pub runner: TaskProcessRunner,
    pub reporter: RecordingReporter,
    pub store: MemoryOutputStore,
    pub env: Environment,
}

impl Harness {
    pub fn new(worker: WorkerCommand) -> Self {
        Self::with_config(runner_config(worker))
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self::with_store(config, MemoryOutputStore::new())
    }

    pub fn with_store(config: RunnerConfig, store: MemoryOutputStore) -> Self {
        init_tracing();
        let reporter = RecordingReporter::new();
        let runner = TaskProcessRunner::new(ProcessPool::new(), config)
            .with_reporter(Arc::new(reporter.clone()))
            .with_store(Arc::new(store.clone()));
        Self {
            runner,
            reporter,
            store,
            env: Environment::new(),
        }
    }

    pub fn pool(&self) -> &ProcessPool {
        self.runner.pool()
    }
}
