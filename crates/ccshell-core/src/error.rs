//! Error taxonomy for ccshell.

/// ccshell library errors.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// The executable could not be located or started. Distinct from a
    /// process that ran and exited non-zero.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("a compile is already in flight")]
    Busy,

    #[error("no AST image has been loaded")]
    NoImage,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config render error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("compile task failed: {0}")]
    Join(String),
}

/// Result type for ccshell operations.
pub type Result<T> = std::result::Result<T, ShellError>;
