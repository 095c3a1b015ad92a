//! Editor session: the source buffer plus the open and compile commands.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::{Result, ShellError};
use crate::orchestrator::{CompileOrchestrator, CompileReport};
use crate::runner::{CommandRunner, ProcessRunner};
use crate::watcher::{ArtifactProbe, ImageProbe, RenderedImage};

/// One user's editing session against a compile orchestrator.
pub struct ShellSession<R = CommandRunner, P = ImageProbe> {
    buffer: String,
    orchestrator: Arc<CompileOrchestrator<R, P>>,
    last_image: Option<RenderedImage>,
}

impl<R, P> ShellSession<R, P>
where
    R: ProcessRunner + 'static,
    P: ArtifactProbe + 'static,
{
    pub fn new(orchestrator: Arc<CompileOrchestrator<R, P>>) -> Self {
        Self {
            buffer: String::new(),
            orchestrator,
            last_image: None,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn set_buffer(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    pub fn append_line(&mut self, line: &str) {
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// AST image from the most recent compile that produced one.
    pub fn last_image(&self) -> Option<&RenderedImage> {
        self.last_image.as_ref()
    }

    /// Replace the buffer with the contents of `path`.
    ///
    /// Bytes that are not valid UTF-8 are replaced rather than rejected.
    pub async fn open_file(&mut self, path: &Path) -> Result<()> {
        let sink = self.orchestrator.sink();
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                self.buffer = String::from_utf8_lossy(&bytes).into_owned();
                info!(path = %path.display(), bytes = bytes.len(), "Opened source file");
                sink.info(&format!("Opened file: {}", path.display()));
                Ok(())
            }
            Err(e) => {
                sink.error(&format!("Failed to open {}: {e}", path.display()));
                Err(ShellError::Io(e))
            }
        }
    }

    /// Compile the current buffer on a worker task and wait for the report.
    ///
    /// A newly loaded image replaces the previous one; a run without an image
    /// clears it.
    pub async fn compile(&mut self) -> Result<CompileReport> {
        let report = self.orchestrator.spawn(self.buffer.clone()).await?;
        self.last_image = report.image().cloned();
        Ok(report)
    }

    /// Write the last AST image as PNG.
    pub fn save_image(&self, path: &Path) -> Result<()> {
        let image = self
            .last_image
            .as_ref()
            .ok_or(ShellError::NoImage)?;
        image.save_png(path)
    }
}
