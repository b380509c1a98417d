//! Per-run artifact directory layout.
//!
//! ```text
//! <base>/runs/<run_id>/
//!     screenshots/step_<index>.png
//!     logs/console.log
//!     network/            (reserved)
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ArtifactError;

/// Directories of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub run_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub network_dir: PathBuf,
}

impl ArtifactLayout {
    /// Compute the layout for `run_id` under `base`. No I/O.
    pub fn for_run(base: &Path, run_id: u64) -> Self {
        let run_dir = base.join("runs").join(run_id.to_string());
        Self {
            screenshots_dir: run_dir.join("screenshots"),
            logs_dir: run_dir.join("logs"),
            network_dir: run_dir.join("network"),
            run_dir,
        }
    }
}

/// Writes screenshots and logs for one run.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    base_path: PathBuf,
    layout: ArtifactLayout,
}

impl ArtifactManager {
    /// Resolve `base_path` to an absolute path and compute the run layout.
    pub fn new(base_path: &Path, run_id: u64) -> Result<Self, ArtifactError> {
        let base_path = std::path::absolute(base_path).map_err(|source| ArtifactError::InvalidBase {
            path: base_path.to_path_buf(),
            source,
        })?;
        let layout = ArtifactLayout::for_run(&base_path, run_id);
        Ok(Self { base_path, layout })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Create the run directories. Safe to call repeatedly.
    pub async fn prepare(&self) -> Result<(), ArtifactError> {
        for dir in [
            &self.layout.screenshots_dir,
            &self.layout.logs_dir,
            &self.layout.network_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ArtifactError::CreateDir {
                    path: dir.clone(),
                    source,
                })?;
        }
        debug!("Artifact directories ready at {:?}", self.layout.run_dir);
        Ok(())
    }

    /// Where the screenshot of step `index` goes.
    pub fn screenshot_path(&self, index: i64) -> PathBuf {
        self.layout
            .screenshots_dir
            .join(format!("step_{}.png", index))
    }

    /// Write a PNG for step `index`, replacing any previous one.
    pub async fn write_screenshot(&self, index: i64, png: &[u8]) -> Result<PathBuf, ArtifactError> {
        let path = self.screenshot_path(index);
        write_file(&path, png).await?;
        debug!("Saved screenshot {:?} ({} bytes)", path, png.len());
        Ok(path)
    }

    /// Write `logs/console.log`, one line per message.
    pub async fn write_console_log(&self, lines: &[String]) -> Result<PathBuf, ArtifactError> {
        let path = self.layout.logs_dir.join("console.log");
        write_file(&path, lines.join("\n").as_bytes()).await?;
        debug!("Saved {} console lines to {:?}", lines.len(), path);
        Ok(path)
    }

    /// Path of `path` relative to the artifacts base, see [`relativize`].
    pub fn relativize(&self, path: &Path) -> String {
        relativize(path, &self.base_path)
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), ArtifactError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Strip `base` from `path` and normalize separators to `/`, without a
/// leading separator. Works on strings so the output does not depend on the
/// host platform. A path outside `base` is returned normalized.
pub fn relativize(path: &Path, base: &Path) -> String {
    let path = normalize_separators(&path.to_string_lossy());
    let base = normalize_separators(&base.to_string_lossy());
    let base = base.trim_end_matches('/');

    let rest = match path.strip_prefix(base) {
        Some(rest) if !base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => path.as_str(),
    };
    rest.trim_start_matches('/').to_string()
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
