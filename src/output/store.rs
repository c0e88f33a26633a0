// src/output/store.rs

//! Persistence of a task's terminal output, one plain-text file per execution.

use std::fmt::Debug;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub trait TerminalOutputStore: Send + Sync + Debug {
    fn read(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, content: &str) -> Result<()>;
}

/// Store backed by `std::fs`. Parent directories are created on write.
#[derive(Debug, Clone, Default)]
pub struct FsOutputStore;

impl TerminalOutputStore for FsOutputStore {
    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading terminal output {:?}", path))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
        fs::write(path, content).with_context(|| format!("writing terminal output {:?}", path))
    }
}
