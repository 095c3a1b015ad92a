//! Shell configuration: external tools, artifact names, watch policy.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShellError};

/// Configuration for a compile shell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    /// Path to the mini C compiler executable.
    pub compiler: String,

    /// Graph renderer executable (Graphviz `dot`).
    pub renderer: String,

    /// Output format passed to the renderer as `-T<format>`.
    pub image_format: String,

    /// Directory under which each compile gets its own run directory.
    pub work_root: PathBuf,

    /// File name the editor buffer is persisted to.
    pub source_file: String,

    /// AST description file the compiler writes into its working directory.
    pub description_file: String,

    /// Image file the renderer is asked to produce.
    pub image_file: String,

    /// Keep the per-run directory after the compile finishes.
    pub retain_artifacts: bool,

    pub watch: WatchPolicy,

    pub display: DisplaySize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            compiler: "compiler".to_string(),
            renderer: "dot".to_string(),
            image_format: "png".to_string(),
            work_root: std::env::temp_dir().join("ccshell"),
            source_file: "temp_input.c".to_string(),
            description_file: "ast.dot".to_string(),
            image_file: "ast.png".to_string(),
            retain_artifacts: true,
            watch: WatchPolicy::default(),
            display: DisplaySize::default(),
        }
    }
}

impl ShellConfig {
    /// Load a configuration from a TOML file. Missing keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ShellConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.compiler.trim().is_empty() {
            return Err(ShellError::Config("compiler must not be empty".to_string()));
        }
        if self.renderer.trim().is_empty() {
            return Err(ShellError::Config("renderer must not be empty".to_string()));
        }
        if self.work_root.as_os_str().is_empty() {
            return Err(ShellError::Config("work_root must not be empty".to_string()));
        }
        for (key, name) in [
            ("source_file", &self.source_file),
            ("description_file", &self.description_file),
            ("image_file", &self.image_file),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ShellError::Config(format!(
                    "{key} must be a bare file name, got {name:?}"
                )));
            }
        }
        if self.watch.max_attempts == 0 {
            return Err(ShellError::Config(
                "watch.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ShellError::Config(
                "display width and height must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounded fixed-delay retry policy for the artifact watcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchPolicy {
    /// Total attempts before giving up (>= 1).
    pub max_attempts: u32,

    /// Delay between consecutive attempts (milliseconds).
    pub delay_ms: u64,
}

impl WatchPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for WatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 500,
        }
    }
}

/// Box the AST image is resized into for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self {
            width: 650,
            height: 400,
        }
    }
}
