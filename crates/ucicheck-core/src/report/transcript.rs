use super::ensure_parent;
use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};

/// Persist an engine's raw output as `<dir>/<engine>.log`.
pub fn write_transcript(dir: &Path, engine: &str, lines: &[String]) -> Result<PathBuf> {
    let path = dir.join(format!("{engine}.log"));
    ensure_parent(&path)?;
    std::fs::write(&path, lines.join("\n")).map_err(|source| HarnessError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
