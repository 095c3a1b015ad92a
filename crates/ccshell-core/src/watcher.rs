//! Bounded polling for artifacts written asynchronously by external tools.
//!
//! The renderer may exit before its output is fully flushed, so the watcher
//! probes the target a fixed number of times with a fixed delay in between.
//! A missing file, or one whose format cannot be identified yet, is "not
//! ready". Any other failure, including a PNG that fails to decode, is
//! reported as a warning but still consumes an attempt.
//!
//! Probes read, decode and resize synchronously, so each one runs on the
//! blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::error::ImageFormatHint;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader, RgbaImage};
use tracing::{debug, info, warn};

use crate::config::{DisplaySize, WatchPolicy};
use crate::log::LogSink;

/// A decoded image scaled to its display box.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub pixels: RgbaImage,
    pub width: u32,
    pub height: u32,
    pub source: PathBuf,
}

impl RenderedImage {
    pub fn new(pixels: RgbaImage, source: impl Into<PathBuf>) -> Self {
        let (width, height) = pixels.dimensions();
        Self {
            pixels,
            width,
            height,
            source: source.into(),
        }
    }

    /// Write the display-sized image as PNG.
    pub fn save_png(&self, path: &Path) -> crate::Result<()> {
        self.pixels.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Result of a single probe of the target path.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Ready(RenderedImage),
    /// Missing or not yet identifiable as an image; retried silently.
    NotReady(String),
    /// Unexpected failure; logged as a warning and retried.
    Failed(String),
}

/// Inspects a path once and reports whether a usable artifact is there.
///
/// May block; the watcher calls it from the blocking pool.
pub trait ArtifactProbe: Send + Sync {
    fn probe(&self, path: &Path) -> ProbeOutcome;
}

/// Decodes the target as an image and resizes it to the display box.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageProbe {
    display: DisplaySize,
}

impl ImageProbe {
    pub fn new(display: DisplaySize) -> Self {
        Self { display }
    }
}

impl ArtifactProbe for ImageProbe {
    fn probe(&self, path: &Path) -> ProbeOutcome {
        if !path.exists() {
            return ProbeOutcome::NotReady(format!("{} does not exist", path.display()));
        }

        match decode(path) {
            Ok(decoded) => {
                let resized = decoded
                    .resize_exact(self.display.width, self.display.height, FilterType::Lanczos3)
                    .to_rgba8();
                ProbeOutcome::Ready(RenderedImage::new(resized, path))
            }
            Err(e) if is_unidentified(&e) => ProbeOutcome::NotReady(e.to_string()),
            Err(e) => ProbeOutcome::Failed(e.to_string()),
        }
    }
}

fn decode(path: &Path) -> Result<DynamicImage, ImageError> {
    ImageReader::open(path)
        .map_err(ImageError::IoError)?
        .with_guessed_format()
        .map_err(ImageError::IoError)?
        .decode()
}

/// No format could be guessed: the file is empty or its header is not
/// written yet.
fn is_unidentified(err: &ImageError) -> bool {
    match err {
        ImageError::Unsupported(e) => matches!(e.format_hint(), ImageFormatHint::Unknown),
        _ => false,
    }
}

/// Terminal state of a watch.
#[derive(Debug, Clone)]
pub enum WatchOutcome {
    Loaded { image: RenderedImage, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl WatchOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            WatchOutcome::Loaded { attempts, .. } | WatchOutcome::Exhausted { attempts } => {
                *attempts
            }
        }
    }
}

/// Fixed-delay, bounded poller over an [`ArtifactProbe`].
#[derive(Debug, Clone)]
pub struct ArtifactWatcher<P = ImageProbe> {
    probe: Arc<P>,
    policy: WatchPolicy,
}

impl<P: ArtifactProbe + 'static> ArtifactWatcher<P> {
    pub fn new(probe: P, policy: WatchPolicy) -> Self {
        Self {
            probe: Arc::new(probe),
            policy,
        }
    }

    pub fn policy(&self) -> WatchPolicy {
        self.policy
    }

    /// Poll `path` until it decodes or the attempt budget is spent.
    ///
    /// Sleeps `policy.delay()` between attempts (never after the last one).
    /// Unexpected probe failures are appended to `sink` as warnings.
    pub async fn watch(&self, path: &Path, sink: &dyn LogSink) -> WatchOutcome {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.probe_once(path).await {
                ProbeOutcome::Ready(image) => {
                    info!(path = %path.display(), attempt, "artifact loaded");
                    return WatchOutcome::Loaded {
                        image,
                        attempts: attempt,
                    };
                }
                ProbeOutcome::NotReady(reason) => {
                    debug!(path = %path.display(), attempt, max_attempts, %reason, "artifact not ready");
                }
                ProbeOutcome::Failed(reason) => {
                    warn!(path = %path.display(), attempt, %reason, "artifact probe failed");
                    sink.warning(&format!("Error loading image: {reason}"));
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay()).await;
            }
        }

        info!(path = %path.display(), attempts = max_attempts, "artifact watch exhausted");
        WatchOutcome::Exhausted {
            attempts: max_attempts,
        }
    }

    async fn probe_once(&self, path: &Path) -> ProbeOutcome {
        let probe = Arc::clone(&self.probe);
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || probe.probe(&target))
            .await
            .unwrap_or_else(|e| ProbeOutcome::Failed(format!("probe task failed: {e}")))
    }
}
