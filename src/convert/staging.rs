//! Staging of input documents and their output directories.
//!
//! Every job gets a collision-resistant pair of paths under the staging
//! root: an input file holding the fetched document bytes and an output
//! directory the converter writes into. [`StagingArea::release`] removes
//! both and is invoked on every exit path of a job, however it concludes.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use super::error::{ConvertError, Result};

/// Paths staged for a single job.
#[derive(Debug, Clone)]
pub struct StagedPaths {
    /// Input file holding the document bytes.
    pub input: PathBuf,
    /// Paired output directory. Not created by staging; the supervisor
    /// creates it before spawning the converter.
    pub output_dir: PathBuf,
}

/// Allocates and releases per-job staging paths under a fixed root.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create a staging area, creating the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            ConvertError::internal(format!(
                "failed to create staging root {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to a uniquely named input file and return it together
    /// with the paired output directory path.
    ///
    /// Names combine a millisecond timestamp with a random suffix, so
    /// concurrent server instances sharing the same temp namespace cannot
    /// collide without any cross-instance coordination. The input file
    /// keeps the extension of `original_name` when one is present.
    pub async fn stage(&self, bytes: &[u8], original_name: Option<&str>) -> Result<StagedPaths> {
        let token = format!(
            "{}_{:08x}",
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        );
        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str());
        let input_name = match extension {
            Some(ext) => format!("doc_{token}.{ext}"),
            None => format!("doc_{token}"),
        };

        let input = self.root.join(input_name);
        let output_dir = self.root.join(format!("out_{token}"));

        tokio::fs::write(&input, bytes).await.map_err(|e| {
            ConvertError::internal(format!("failed to stage input {}: {e}", input.display()))
        })?;

        debug!(input = %input.display(), size = bytes.len(), "Staged input document");

        Ok(StagedPaths { input, output_dir })
    }

    /// Delete the staged input file and recursively remove the output
    /// directory.
    ///
    /// Deletion failures are logged and swallowed; already-missing paths
    /// are not an error, so the call is idempotent.
    pub fn release(&self, paths: &StagedPaths) {
        if let Err(e) = std::fs::remove_file(&paths.input) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %paths.input.display(), error = %e, "Failed to remove staged input");
            }
        }
        if let Err(e) = std::fs::remove_dir_all(&paths.output_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %paths.output_dir.display(), error = %e, "Failed to remove output directory");
            }
        }
    }
}
