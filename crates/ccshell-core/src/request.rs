//! Compile request identity and per-run artifact paths.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ShellConfig;

/// Locations of one run's artifacts, all inside a run directory unique to the
/// request so repeated or overlapping runs never share files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub run_dir: PathBuf,
    pub source: PathBuf,
    pub ast_description: PathBuf,
    pub ast_image: PathBuf,
}

impl RunPaths {
    /// Paths are absolute: the tools receive them while running inside
    /// `run_dir`. A relative `work_root` is anchored to the current directory.
    pub fn for_request(config: &ShellConfig, request_id: Uuid) -> Self {
        let root = std::path::absolute(&config.work_root)
            .unwrap_or_else(|_| config.work_root.clone());
        let run_dir = root.join(request_id.to_string());
        Self {
            source: run_dir.join(&config.source_file),
            ast_description: run_dir.join(&config.description_file),
            ast_image: run_dir.join(&config.image_file),
            run_dir,
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

/// A single compile invocation: the editor text and where it is persisted.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub id: Uuid,
    pub source: String,
    /// SHA-256 of the source text, hex encoded.
    pub source_digest: String,
    pub paths: RunPaths,
}

impl CompileRequest {
    pub fn new(config: &ShellConfig, source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let source = source.into();
        Self {
            id,
            source_digest: compute_source_digest(&source),
            paths: RunPaths::for_request(config, id),
            source,
        }
    }

    /// Short digest (first 12 chars) for log lines.
    pub fn short_digest(&self) -> &str {
        &self.source_digest[..12.min(self.source_digest.len())]
    }
}

fn compute_source_digest(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}
