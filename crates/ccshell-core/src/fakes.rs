//! Scripted fakes for the runner and probe seams (testing only)
//!
//! `ScriptedRunner` replays queued process results and can drop files into the
//! command's working directory the way the real compiler and renderer do.
//! `ScriptedProbe` replays queued probe outcomes.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Result, ShellError};
use crate::runner::{CommandSpec, ProcessResult, ProcessRunner};
use crate::watcher::{ArtifactProbe, ProbeOutcome, RenderedImage};

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// One queued reaction to a `run` call.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    /// `None` simulates an executable that cannot be launched.
    pub result: Option<ProcessResult>,
    /// File names written into the command's working directory.
    pub creates: Vec<String>,
}

impl ScriptedStep {
    pub fn exit(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            result: Some(ProcessResult {
                exit_code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                duration_ms: 0,
            }),
            creates: Vec::new(),
        }
    }

    pub fn launch_failure() -> Self {
        Self {
            result: None,
            creates: Vec::new(),
        }
    }

    pub fn creating(mut self, file_name: &str) -> Self {
        self.creates.push(file_name.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    steps: VecDeque<ScriptedStep>,
    calls: Vec<CommandSpec>,
}

/// Runner that replays `ScriptedStep`s in order. Unscripted calls exit 0
/// with empty output.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, step: ScriptedStep) -> &Self {
        self.lock().steps.push_back(step);
        self
    }

    /// Every command received, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessResult> {
        let step = {
            let mut state = self.lock();
            state.calls.push(spec.clone());
            state
                .steps
                .pop_front()
                .unwrap_or_else(|| ScriptedStep::exit(0, "", ""))
        };

        let Some(result) = step.result else {
            return Err(ShellError::Launch {
                program: spec.program.to_string_lossy().into_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted launch failure"),
            });
        };

        let cwd = spec.cwd.as_deref().unwrap_or_else(|| Path::new("."));
        for name in &step.creates {
            std::fs::write(cwd.join(name), b"digraph AST {}\n")?;
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// ScriptedProbe
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProbeState {
    outcomes: VecDeque<ProbeOutcome>,
    calls: u32,
}

/// Probe that replays queued outcomes, then reports `NotReady` forever.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ready(&self, image: RenderedImage) {
        self.lock().outcomes.push_back(ProbeOutcome::Ready(image));
    }

    pub fn push_not_ready(&self, reason: &str) {
        self.lock()
            .outcomes
            .push_back(ProbeOutcome::NotReady(reason.to_string()));
    }

    pub fn push_failed(&self, reason: &str) {
        self.lock()
            .outcomes
            .push_back(ProbeOutcome::Failed(reason.to_string()));
    }

    /// Number of probes performed.
    pub fn calls(&self) -> u32 {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ArtifactProbe for ScriptedProbe {
    fn probe(&self, _path: &Path) -> ProbeOutcome {
        let mut state = self.lock();
        state.calls += 1;
        state
            .outcomes
            .pop_front()
            .unwrap_or_else(|| ProbeOutcome::NotReady("unscripted".to_string()))
    }
}
