//! Compile orchestration: persist source, run compiler, render and load the AST.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classify::{CompileVerdict, OutputClass};
use crate::config::ShellConfig;
use crate::error::{Result, ShellError};
use crate::log::LogSink;
use crate::request::{CompileRequest, RunPaths};
use crate::runner::{CommandRunner, CommandSpec, ProcessResult, ProcessRunner};
use crate::watcher::{ArtifactProbe, ArtifactWatcher, ImageProbe, RenderedImage, WatchOutcome};

/// How a compile run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Renderer succeeded and the image decoded.
    ImageLoaded { image: RenderedImage, attempts: u32 },

    /// Renderer succeeded but the image never became decodable.
    ImageExhausted { attempts: u32 },

    /// Renderer exited non-zero; no watch was attempted.
    RenderFailed { exit_code: i32 },

    /// The compiler produced no AST description.
    NoDescription,

    /// An error interrupted the sequence (I/O, launch failure).
    Aborted { reason: String },
}

impl RunOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            RunOutcome::ImageLoaded { .. } => "image_loaded",
            RunOutcome::ImageExhausted { .. } => "image_exhausted",
            RunOutcome::RenderFailed { .. } => "render_failed",
            RunOutcome::NoDescription => "no_description",
            RunOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// Result of one compile run.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub request_id: Uuid,
    pub source_digest: String,
    pub paths: RunPaths,

    /// Absent when the run aborted before the compiler returned.
    pub verdict: Option<CompileVerdict>,
    pub compiler: Option<ProcessResult>,
    pub render: Option<ProcessResult>,

    pub outcome: RunOutcome,
    pub duration_ms: u64,
}

impl CompileReport {
    fn pending(request: &CompileRequest) -> Self {
        Self {
            request_id: request.id,
            source_digest: request.source_digest.clone(),
            paths: request.paths.clone(),
            verdict: None,
            compiler: None,
            render: None,
            outcome: RunOutcome::NoDescription,
            duration_ms: 0,
        }
    }

    /// Whether the compiler output was classified as a semantic error.
    pub fn is_semantic_error(&self) -> bool {
        self.verdict
            .as_ref()
            .is_some_and(|v| v.class == OutputClass::SemanticError)
    }

    pub fn image(&self) -> Option<&RenderedImage> {
        match &self.outcome {
            RunOutcome::ImageLoaded { image, .. } => Some(image),
            _ => None,
        }
    }
}

/// Releases the single-flight flag when a run ends, including on panic.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sequences one compile: persist → compile → classify → render → watch.
///
/// At most one compile runs per orchestrator; a second trigger while one is in
/// flight gets `ShellError::Busy`. All other failures end up in the log sink.
pub struct CompileOrchestrator<R = CommandRunner, P = ImageProbe> {
    config: ShellConfig,
    runner: R,
    watcher: ArtifactWatcher<P>,
    sink: Arc<dyn LogSink>,
    in_flight: AtomicBool,
}

impl CompileOrchestrator {
    /// Orchestrator over real child processes and image decoding.
    pub fn new(config: ShellConfig, sink: Arc<dyn LogSink>) -> Self {
        let probe = ImageProbe::new(config.display);
        Self::with_parts(config, CommandRunner, probe, sink)
    }
}

impl<R: ProcessRunner, P: ArtifactProbe + 'static> CompileOrchestrator<R, P> {
    pub fn with_parts(config: ShellConfig, runner: R, probe: P, sink: Arc<dyn LogSink>) -> Self {
        let watcher = ArtifactWatcher::new(probe, config.watch);
        Self {
            config,
            runner,
            watcher,
            sink,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one compile of `source`.
    ///
    /// Only `ShellError::Busy` is returned as an error; every other failure is
    /// logged as a single error entry and reported as `RunOutcome::Aborted`.
    pub async fn compile(&self, source: &str) -> Result<CompileReport> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(ShellError::Busy)?;

        let start = Instant::now();
        let request = CompileRequest::new(&self.config, source);
        let mut report = CompileReport::pending(&request);

        info!(
            request_id = %request.id,
            source_digest = %request.short_digest(),
            "Starting compile"
        );

        let result = match self.persist(&request).await {
            Ok(()) => {
                self.sink.clear();
                self.sink.info("Compilation started...");
                self.run_toolchain(&request, &mut report).await
            }
            Err(e) => {
                self.sink.clear();
                Err(e)
            }
        };

        if let Err(e) = result {
            error!(request_id = %request.id, error = %e, "Compile aborted");
            self.sink.error(&format!("Error running compiler: {e}"));
            report.outcome = RunOutcome::Aborted {
                reason: e.to_string(),
            };
        }

        if !self.config.retain_artifacts {
            self.remove_run_dir(&request.paths).await;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            request_id = %request.id,
            outcome = report.outcome.name(),
            duration_ms = report.duration_ms,
            "Compile finished"
        );
        Ok(report)
    }

    /// Run `compile` on a worker task. The returned future resolves when the
    /// run completes; the run starts immediately, whether or not it is polled.
    pub fn spawn(
        self: &Arc<Self>,
        source: String,
    ) -> impl Future<Output = Result<CompileReport>> + Send + 'static
    where
        R: 'static,
    {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.compile(&source).await });
        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ShellError::Join(e.to_string())))
        }
    }

    async fn persist(&self, request: &CompileRequest) -> Result<()> {
        tokio::fs::create_dir_all(request.paths.run_dir()).await?;
        tokio::fs::write(&request.paths.source, request.source.as_bytes()).await?;
        Ok(())
    }

    async fn run_toolchain(
        &self,
        request: &CompileRequest,
        report: &mut CompileReport,
    ) -> Result<()> {
        let paths = &request.paths;

        let compile_cmd = CommandSpec::new(resolve_tool(&self.config.compiler)?)
            .arg(&paths.source)
            .current_dir(paths.run_dir());
        info!(request_id = %request.id, command = %compile_cmd.display(), "Running compiler");

        let result = self.runner.run(&compile_cmd).await?;
        let verdict = CompileVerdict::evaluate(&result);

        match verdict.class {
            OutputClass::SemanticError => {
                self.sink
                    .error(&format!("Semantic error:\n{}", result.stdout));
            }
            OutputClass::Success => {
                self.sink
                    .success(&format!("Compiler output:\n{}", result.stdout));
            }
            OutputClass::Silent => {}
        }
        if verdict.has_stderr {
            self.sink
                .error(&format!("Compiler errors:\n{}", result.stderr));
        }

        info!(
            request_id = %request.id,
            exit_code = result.exit_code,
            class = ?verdict.class,
            "Compiler returned"
        );
        report.verdict = Some(verdict);
        report.compiler = Some(result);

        if !tokio::fs::try_exists(&paths.ast_description).await? {
            info!(request_id = %request.id, "AST description missing");
            self.sink.warning(&format!(
                "{} not found. AST may not have been generated.",
                self.config.description_file
            ));
            report.outcome = RunOutcome::NoDescription;
            return Ok(());
        }

        self.sink.info("Generating AST image with Graphviz...");
        let render_cmd = CommandSpec::new(resolve_tool(&self.config.renderer)?)
            .arg(format!("-T{}", self.config.image_format))
            .arg(&paths.ast_description)
            .arg("-o")
            .arg(&paths.ast_image)
            .current_dir(paths.run_dir());
        info!(request_id = %request.id, command = %render_cmd.display(), "Rendering AST");

        let render = self.runner.run(&render_cmd).await?;
        if !render.success() {
            self.sink
                .error(&format!("Graphviz error:\n{}", render.stderr));
            report.outcome = RunOutcome::RenderFailed {
                exit_code: render.exit_code,
            };
            report.render = Some(render);
            return Ok(());
        }
        report.render = Some(render);

        report.outcome = match self
            .watcher
            .watch(&paths.ast_image, self.sink.as_ref())
            .await
        {
            WatchOutcome::Loaded { image, attempts } => {
                self.sink.info("AST image loaded successfully.");
                RunOutcome::ImageLoaded { image, attempts }
            }
            WatchOutcome::Exhausted { attempts } => {
                self.sink.error(&format!(
                    "Failed to open {} after Graphviz generation.",
                    self.config.image_file
                ));
                RunOutcome::ImageExhausted { attempts }
            }
        };
        Ok(())
    }

    async fn remove_run_dir(&self, paths: &RunPaths) {
        match tokio::fs::remove_dir_all(paths.run_dir()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(run_dir = %paths.run_dir().display(), error = %e, "Failed to remove run directory");
            }
        }
    }
}

/// Tools run with the run directory as cwd, so a relative tool path is
/// anchored to our own cwd first. Bare names are left for `PATH` lookup.
fn resolve_tool(tool: &str) -> Result<PathBuf> {
    let path = Path::new(tool);
    if path.is_relative() && path.components().count() > 1 {
        Ok(std::path::absolute(path)?)
    } else {
        Ok(path.to_path_buf())
    }
}
