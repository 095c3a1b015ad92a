//! Integration tests for the compile orchestrator with scripted and real tools.

use async_trait::async_trait;
use ccshell_core::fakes::{ScriptedProbe, ScriptedRunner, ScriptedStep};
use ccshell_core::{
    CommandSpec, CompileOrchestrator, MemoryLogSink, OutputClass, ProcessResult, ProcessRunner,
    RenderedImage, RunOutcome, Severity, ShellConfig, ShellError, WatchPolicy,
};
use image::RgbaImage;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Notify;

fn config(work_root: &Path) -> ShellConfig {
    ShellConfig {
        compiler: "compiler".to_string(),
        work_root: work_root.to_path_buf(),
        ..ShellConfig::default()
    }
}

fn scripted(
    config: ShellConfig,
) -> (
    Arc<CompileOrchestrator<ScriptedRunner, ScriptedProbe>>,
    ScriptedRunner,
    ScriptedProbe,
    Arc<MemoryLogSink>,
) {
    let runner = ScriptedRunner::new();
    let probe = ScriptedProbe::new();
    let sink = Arc::new(MemoryLogSink::new());
    let orchestrator =
        CompileOrchestrator::with_parts(config, runner.clone(), probe.clone(), sink.clone());
    (Arc::new(orchestrator), runner, probe, sink)
}

fn display_image() -> RenderedImage {
    RenderedImage::new(RgbaImage::new(650, 400), "ast.png")
}

/// Test: clean compile, description produced, render ok, PNG decodes on the 2nd poll
#[tokio::test(start_paused = true)]
async fn test_successful_compile_loads_ast_on_second_attempt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, probe, sink) = scripted(config(dir.path()));

    runner
        .push(ScriptedStep::exit(0, "Compiled 1 function\n", "").creating("ast.dot"))
        .push(ScriptedStep::exit(0, "", ""));
    probe.push_not_ready("ast.png does not exist");
    probe.push_ready(display_image());

    let report = orchestrator
        .compile("int main() { return 0; }\n")
        .await
        .expect("compile");

    // Log sequence
    let entries = sink.entries();
    let severities: Vec<Severity> = entries.iter().map(|e| e.severity).collect();
    assert_eq!(
        severities,
        vec![
            Severity::Info,
            Severity::Success,
            Severity::Info,
            Severity::Info
        ]
    );
    assert_eq!(entries[0].message, "Compilation started...");
    assert!(entries[1].message.contains("Compiled 1 function"));
    assert_eq!(entries[2].message, "Generating AST image with Graphviz...");
    assert_eq!(entries[3].message, "AST image loaded successfully.");

    // Outcome
    match &report.outcome {
        RunOutcome::ImageLoaded { image, attempts } => {
            assert_eq!(*attempts, 2);
            assert_eq!((image.width, image.height), (650, 400));
        }
        other => panic!("expected ImageLoaded, got {other:?}"),
    }
    assert_eq!(probe.calls(), 2);
    assert_eq!(
        report.verdict.as_ref().map(|v| v.class),
        Some(OutputClass::Success)
    );

    // Commands
    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    let paths = &report.paths;
    assert_eq!(calls[0].program, "compiler");
    assert_eq!(calls[0].args, vec![paths.source.clone().into_os_string()]);
    assert_eq!(calls[0].cwd.as_deref(), Some(paths.run_dir()));
    assert_eq!(calls[1].program, "dot");
    assert_eq!(
        calls[1].args,
        vec![
            OsString::from("-Tpng"),
            paths.ast_description.clone().into_os_string(),
            OsString::from("-o"),
            paths.ast_image.clone().into_os_string(),
        ]
    );
}

/// Test: syntax fault → semantic error, missing description warned once, no render
#[tokio::test]
async fn test_semantic_error_without_description() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, probe, sink) = scripted(config(dir.path()));

    runner.push(ScriptedStep::exit(1, "Error: unexpected token '}'\n", ""));

    let report = orchestrator.compile("int main( {").await.expect("compile");

    assert!(report.is_semantic_error());
    assert!(matches!(report.outcome, RunOutcome::NoDescription));
    assert_eq!(
        sink.severities(),
        vec![Severity::Info, Severity::Error, Severity::Warning]
    );
    assert!(sink.entries()[1].message.contains("unexpected token"));
    assert_eq!(sink.count(Severity::Warning), 1);
    assert_eq!(runner.calls().len(), 1, "renderer must not run");
    assert_eq!(probe.calls(), 0);
    assert!(report.render.is_none());
}

/// Test: error marker wins over a zero exit code
#[tokio::test]
async fn test_error_marker_with_zero_exit_is_semantic_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, _probe, sink) = scripted(config(dir.path()));

    runner.push(ScriptedStep::exit(0, "semantic ERROR: x undeclared\n", ""));

    let report = orchestrator.compile("x = 1;").await.expect("compile");
    assert!(report.is_semantic_error());
    assert_eq!(sink.count(Severity::Success), 0);
    assert_eq!(sink.count(Severity::Error), 1);
}

/// Test: empty stdout and stderr log nothing between "started" and the warning
#[tokio::test]
async fn test_silent_compiler_logs_only_started() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, _probe, sink) = scripted(config(dir.path()));

    runner.push(ScriptedStep::exit(0, "", ""));

    let report = orchestrator.compile("").await.expect("compile");
    assert_eq!(
        report.verdict.as_ref().map(|v| v.class),
        Some(OutputClass::Silent)
    );
    assert_eq!(sink.severities(), vec![Severity::Info, Severity::Warning]);
}

/// Test: stderr is logged as error even when stdout looked fine
#[tokio::test]
async fn test_stderr_logged_alongside_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, _probe, sink) = scripted(config(dir.path()));

    runner.push(ScriptedStep::exit(0, "ok\n", "internal: leaked 16 bytes\n"));

    orchestrator.compile("int x;").await.expect("compile");
    assert_eq!(
        sink.severities(),
        vec![
            Severity::Info,
            Severity::Success,
            Severity::Error,
            Severity::Warning
        ]
    );
    assert!(sink.entries()[2].message.contains("leaked 16 bytes"));
}

/// Test: renderer failure logs its stderr and skips the image watch
#[tokio::test]
async fn test_render_failure_skips_watch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, probe, sink) = scripted(config(dir.path()));

    runner
        .push(ScriptedStep::exit(0, "ok\n", "").creating("ast.dot"))
        .push(ScriptedStep::exit(1, "", "Error: syntax error in line 1 near '{'\n"));

    let report = orchestrator.compile("int x;").await.expect("compile");

    assert!(matches!(
        report.outcome,
        RunOutcome::RenderFailed { exit_code: 1 }
    ));
    assert_eq!(probe.calls(), 0);
    let entries = sink.entries();
    let last = entries.last().expect("entries");
    assert_eq!(last.severity, Severity::Error);
    assert!(last.message.starts_with("Graphviz error:"));
    assert!(last.message.contains("syntax error in line 1"));
}

/// Test: image never decodes → exactly five attempts, then one error
#[tokio::test(start_paused = true)]
async fn test_image_watch_exhausted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, probe, sink) = scripted(config(dir.path()));

    runner
        .push(ScriptedStep::exit(0, "ok\n", "").creating("ast.dot"))
        .push(ScriptedStep::exit(0, "", ""));

    let report = orchestrator.compile("int x;").await.expect("compile");

    assert!(matches!(
        report.outcome,
        RunOutcome::ImageExhausted { attempts: 5 }
    ));
    assert_eq!(probe.calls(), 5);
    let entries = sink.entries();
    let last = entries.last().expect("entries");
    assert_eq!(last.severity, Severity::Error);
    assert_eq!(last.message, "Failed to open ast.png after Graphviz generation.");
    assert!(report.image().is_none());
}

/// Test: launch failure is caught and logged as a single error entry
#[tokio::test]
async fn test_launch_failure_is_single_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, runner, _probe, sink) = scripted(config(dir.path()));

    runner.push(ScriptedStep::launch_failure());

    let report = orchestrator.compile("int x;").await.expect("compile");

    match &report.outcome {
        RunOutcome::Aborted { reason } => assert!(reason.contains("failed to launch compiler")),
        other => panic!("expected Aborted, got {other:?}"),
    }
    assert_eq!(sink.severities(), vec![Severity::Info, Severity::Error]);
    assert!(sink.entries()[1]
        .message
        .starts_with("Error running compiler:"));
    assert!(report.verdict.is_none());
}

/// Test: each compile persists its source into its own run directory
#[tokio::test]
async fn test_source_persisted_per_request() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (orchestrator, _runner, _probe, sink) = scripted(config(dir.path()));

    let first = orchestrator.compile("int a;\n").await.expect("first");
    let second = orchestrator.compile("int b;\n").await.expect("second");

    assert_ne!(first.paths.run_dir, second.paths.run_dir);
    assert!(first.paths.run_dir.starts_with(dir.path()));
    assert_eq!(
        std::fs::read_to_string(&first.paths.source).expect("first source"),
        "int a;\n"
    );
    assert_eq!(
        std::fs::read_to_string(&second.paths.source).expect("second source"),
        "int b;\n"
    );
    assert_ne!(first.source_digest, second.source_digest);

    // The sink is cleared at the start of every compile.
    assert_eq!(sink.severities(), vec![Severity::Info, Severity::Warning]);
}

/// Test: run directory removed when artifacts are not retained
#[tokio::test]
async fn test_run_dir_removed_without_retention() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut cfg = config(dir.path());
    cfg.retain_artifacts = false;
    let (orchestrator, runner, probe, _sink) = scripted(cfg);

    runner
        .push(ScriptedStep::exit(0, "ok\n", "").creating("ast.dot"))
        .push(ScriptedStep::exit(0, "", ""));
    probe.push_ready(display_image());

    let report = orchestrator.compile("int x;").await.expect("compile");
    assert!(report.image().is_some(), "image stays available in memory");
    assert!(!report.paths.run_dir.exists());
}

/// Runner that blocks until released, to hold a compile in flight.
struct GatedRunner {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl ProcessRunner for GatedRunner {
    async fn run(&self, _spec: &CommandSpec) -> ccshell_core::Result<ProcessResult> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(ProcessResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        })
    }
}

/// Test: a second trigger while a compile is in flight is rejected
#[tokio::test]
async fn test_concurrent_trigger_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let sink = Arc::new(MemoryLogSink::new());
    let orchestrator = Arc::new(CompileOrchestrator::with_parts(
        config(dir.path()),
        GatedRunner {
            started: started.clone(),
            release: release.clone(),
        },
        ScriptedProbe::new(),
        sink.clone(),
    ));

    let pending = orchestrator.spawn("int first;".to_string());
    started.notified().await;
    assert!(orchestrator.is_busy());

    let rejected = orchestrator.compile("int second;").await;
    assert!(matches!(rejected, Err(ShellError::Busy)));

    release.notify_one();
    let report = pending.await.expect("first compile");
    assert!(matches!(report.outcome, RunOutcome::NoDescription));
    assert!(!orchestrator.is_busy());

    // The rejected trigger left no trace in the log.
    assert_eq!(sink.severities(), vec![Severity::Info, Severity::Warning]);
    let persisted = std::fs::read_to_string(&report.paths.source).expect("source");
    assert_eq!(persisted, "int first;");
}

#[cfg(unix)]
mod real_tools {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod");
        path
    }

    /// Directory named relative to the test's working directory, removed on drop.
    struct RelativeDir(PathBuf);

    impl RelativeDir {
        fn new() -> Self {
            let path = PathBuf::from(format!("ccshell-rel-{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&path).expect("create relative dir");
            Self(path)
        }
    }

    impl Drop for RelativeDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn write_fixture(dir: &Path) -> PathBuf {
        let fixture = dir.join("fixture.png");
        RgbaImage::from_pixel(300, 200, image::Rgba([0, 0, 255, 255]))
            .save(&fixture)
            .expect("fixture png");
        fixture
    }

    fn real_config(dir: &Path, compiler: &Path, renderer: &Path) -> ShellConfig {
        ShellConfig {
            compiler: compiler.to_string_lossy().into_owned(),
            renderer: renderer.to_string_lossy().into_owned(),
            work_root: dir.join("runs"),
            watch: WatchPolicy {
                max_attempts: 5,
                delay_ms: 20,
            },
            ..ShellConfig::default()
        }
    }

    /// Test: end to end with shell-script stand-ins for the compiler and Graphviz
    #[tokio::test]
    async fn test_real_processes_render_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = write_fixture(dir.path());

        let compiler = write_script(
            dir.path(),
            "compiler",
            "echo \"compiled $1\"\necho 'digraph AST { Program -> Func }' > ast.dot",
        );
        let renderer = write_script(
            dir.path(),
            "dot",
            &format!("[ \"$1\" = \"-Tpng\" ] || exit 2\ncp '{}' \"$4\"", fixture.display()),
        );

        let sink = Arc::new(MemoryLogSink::new());
        let orchestrator = CompileOrchestrator::new(
            real_config(dir.path(), &compiler, &renderer),
            sink.clone(),
        );

        let report = orchestrator
            .compile("int main() { return 0; }\n")
            .await
            .expect("compile");

        match &report.outcome {
            RunOutcome::ImageLoaded { image, attempts } => {
                assert_eq!(*attempts, 1);
                assert_eq!((image.width, image.height), (650, 400));
            }
            other => panic!("expected ImageLoaded, got {other:?}; log: {:?}", sink.entries()),
        }
        assert!(sink.entries()[1].message.contains("compiled"));
        assert!(report.paths.ast_description.exists());
    }

    /// Test: a real compiler reporting an error in stdout with exit code 1
    #[tokio::test]
    async fn test_real_compiler_semantic_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let compiler = write_script(
            dir.path(),
            "compiler",
            "echo 'line 1: Error: unexpected token'\nexit 1",
        );
        let renderer = write_script(dir.path(), "dot", "exit 0");

        let sink = Arc::new(MemoryLogSink::new());
        let orchestrator = CompileOrchestrator::new(
            real_config(dir.path(), &compiler, &renderer),
            sink.clone(),
        );

        let report = orchestrator.compile("int main( {").await.expect("compile");

        assert!(report.is_semantic_error());
        assert_eq!(report.compiler.as_ref().map(|c| c.exit_code), Some(1));
        assert!(matches!(report.outcome, RunOutcome::NoDescription));
        assert_eq!(
            sink.severities(),
            vec![Severity::Info, Severity::Error, Severity::Warning]
        );
    }

    /// Test: missing compiler executable aborts with a single error
    #[tokio::test]
    async fn test_real_missing_compiler() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("no-such-compiler");
        let sink = Arc::new(MemoryLogSink::new());
        let orchestrator = CompileOrchestrator::new(
            real_config(dir.path(), &missing, Path::new("dot")),
            sink.clone(),
        );

        let report = orchestrator.compile("int x;").await.expect("compile");
        assert!(matches!(report.outcome, RunOutcome::Aborted { .. }));
        assert_eq!(sink.count(Severity::Error), 1);
    }

    /// Test: a relative work root still hands the tools paths they can open
    #[tokio::test]
    async fn test_relative_work_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = write_fixture(dir.path());
        let compiler = write_script(
            dir.path(),
            "compiler",
            "cat \"$1\" > /dev/null || exit 7\necho \"compiled $1\"\necho 'digraph AST {}' > ast.dot",
        );
        let renderer = write_script(
            dir.path(),
            "dot",
            &format!("cp '{}' \"$4\"", fixture.display()),
        );

        let relative = RelativeDir::new();
        let mut config = real_config(dir.path(), &compiler, &renderer);
        config.work_root = relative.0.join("runs");
        assert!(config.work_root.is_relative());

        let sink = Arc::new(MemoryLogSink::new());
        let orchestrator = CompileOrchestrator::new(config, sink.clone());
        let report = orchestrator.compile("int x;\n").await.expect("compile");

        assert!(report.paths.run_dir.is_absolute());
        let cwd = std::env::current_dir().expect("cwd");
        assert!(report.paths.run_dir.starts_with(cwd.join(&relative.0)));
        assert_eq!(report.compiler.as_ref().map(|c| c.exit_code), Some(0));
        match &report.outcome {
            RunOutcome::ImageLoaded { .. } => {}
            other => panic!("expected ImageLoaded, got {other:?}; log: {:?}", sink.entries()),
        }
        assert_eq!(sink.count(Severity::Error), 0);
    }

    /// Test: a relative compiler path resolves against the caller's directory
    #[tokio::test]
    async fn test_relative_compiler_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let relative = RelativeDir::new();
        write_script(&relative.0, "minicc", "echo \"compiled $1\"");

        let config = ShellConfig {
            compiler: format!("./{}/minicc", relative.0.display()),
            work_root: dir.path().join("runs"),
            ..ShellConfig::default()
        };
        let sink = Arc::new(MemoryLogSink::new());
        let orchestrator = CompileOrchestrator::new(config, sink.clone());
        let report = orchestrator.compile("int x;").await.expect("compile");

        assert_eq!(
            report.compiler.as_ref().map(|c| c.exit_code),
            Some(0),
            "log: {:?}",
            sink.entries()
        );
        assert!(matches!(report.outcome, RunOutcome::NoDescription));
        assert!(sink.entries()[1].message.contains("compiled"));
    }
}
