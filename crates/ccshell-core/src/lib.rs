//! ccshell Core - compile shell for the mini C compiler
//!
//! Provides a compile orchestrator that:
//! - Persists the editor buffer into a per-run directory
//! - Runs the external compiler and classifies its output
//! - Renders the compiler's AST description with Graphviz
//! - Polls for the rendered image and loads it for display

pub mod classify;
pub mod config;
pub mod error;
pub mod fakes;
pub mod log;
pub mod orchestrator;
pub mod request;
pub mod runner;
pub mod session;
pub mod telemetry;
pub mod watcher;

// Re-export key types
pub use classify::{classify_stdout, CompileVerdict, OutputClass};
pub use config::{DisplaySize, ShellConfig, WatchPolicy};
pub use error::{Result, ShellError};
pub use log::{LogEntry, LogSink, MemoryLogSink, Severity};
pub use orchestrator::{CompileOrchestrator, CompileReport, RunOutcome};
pub use request::{CompileRequest, RunPaths};
pub use runner::{CommandRunner, CommandSpec, ProcessResult, ProcessRunner};
pub use session::ShellSession;
pub use telemetry::init_tracing;
pub use watcher::{
    ArtifactProbe, ArtifactWatcher, ImageProbe, ProbeOutcome, RenderedImage, WatchOutcome,
};

/// ccshell version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
