//! Output directory setup and verbatim asset copying.
//!
//! The output tree is never patched: every run removes it and starts from
//! an empty directory, so files dropped from the inputs cannot linger.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;
use walkdir::WalkDir;

use crate::site::SourceLayout;

#[derive(Debug, Error)]
#[error("{action} {}: {source}", path.display())]
pub struct AssembleError {
    action: &'static str,
    path: PathBuf,
    source: std::io::Error,
}

impl AssembleError {
    fn new(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self {
            action,
            path,
            source,
        }
    }
}

/// Remove `root` if present and recreate the empty skeleton.
pub fn prepare_output(root: &Path) -> Result<(), AssembleError> {
    if root.exists() {
        fs::remove_dir_all(root).map_err(AssembleError::new("failed to remove", root))?;
        debug!("removed previous output at {}", root.display());
    }

    let blog = root.join("blog");
    fs::create_dir_all(&blog).map_err(AssembleError::new("failed to create", &blog))?;
    Ok(())
}

/// Copy static assets, blog images and singleton root files into `root`.
///
/// Returns the number of files copied. Missing optional inputs are skipped.
pub fn copy_static(
    layout: &SourceLayout,
    root: &Path,
    root_files: &[String],
) -> Result<usize, AssembleError> {
    let mut copied = 0;

    copied += copy_dir(&layout.static_dir(), &root.join("static"))?;
    copied += copy_dir(&layout.images_dir(), &root.join("blog").join("img"))?;

    for name in root_files {
        let from = layout.root.join(name);
        if !from.is_file() {
            continue;
        }
        let to = root.join(name);
        fs::copy(&from, &to).map_err(AssembleError::new("failed to copy", &from))?;
        copied += 1;
    }

    Ok(copied)
}

/// Recursively copy `from` into `to`. A missing `from` copies nothing.
pub fn copy_dir(from: &Path, to: &Path) -> Result<usize, AssembleError> {
    if !from.is_dir() {
        debug!("{} not found, skipping", from.display());
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            AssembleError {
                action: "failed to walk",
                path,
                source: e.into(),
            }
        })?;

        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(AssembleError::new("failed to create", &target))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(AssembleError::new("failed to copy", entry.path()))?;
            copied += 1;
        }
    }

    debug!("copied {} files from {}", copied, from.display());
    Ok(copied)
}
