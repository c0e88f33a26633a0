// src/output/mod.rs

//! Worker output handling.
//!
//! - [`transform`] rewrites streamed bytes (prefix repair, line tags).
//! - [`color`] picks a stable colour per project.
//! - [`pump`] reads piped output, accumulates it and tees it to the terminal.
//! - [`store`] persists the accumulated text.

pub mod color;
pub mod pump;
pub mod store;
pub mod transform;

pub use color::{color_for_project, project_prefix};
pub use pump::{OutputBuffer, StreamKind, TerminalSink, TerminalSinks};
pub use store::{FsOutputStore, TerminalOutputStore};
pub use transform::{ClearLinePrefixer, LineTagger, OutputPipeline};
