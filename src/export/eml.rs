//! Write converted messages as `.eml` files.

use std::path::{Path, PathBuf};

use crate::convert::attachment::sanitize_filename;
use crate::error::{ConvertError, Result};

/// Output path for `source`: sanitized stem plus `.eml`, inside `output_dir`
/// (or next to the source), made unique unless `overwrite` is set.
pub fn output_path_for(source: &Path, output_dir: Option<&Path>, overwrite: bool) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConvertError::InvalidPath(source.display().to_string()))?;
    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let path = dir.join(format!("{}.eml", sanitize_filename(&stem)));
    Ok(if overwrite { path } else { unique_path(&path) })
}

/// Write `bytes` to `path`, creating the parent directory.
pub fn write_eml(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConvertError::io(parent, e))?;
    }
    std::fs::write(path, bytes).map_err(|e| ConvertError::io(path, e))
}

/// If `path` already exists, append a counter to make it unique.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("message");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut i = 1;
    loop {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}
