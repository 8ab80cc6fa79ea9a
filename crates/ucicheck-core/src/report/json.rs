use super::ensure_parent;
use crate::error::{HarnessError, Result};
use crate::model::EngineReport;
use std::path::Path;

/// Write every report as one JSON array.
pub fn write_json(reports: &[EngineReport], out: &Path) -> Result<()> {
    ensure_parent(out)?;
    let body = serde_json::to_string_pretty(reports)?;
    std::fs::write(out, body).map_err(|source| HarnessError::Write {
        path: out.to_path_buf(),
        source,
    })
}

pub fn read_json(path: &Path) -> Result<Vec<EngineReport>> {
    let content = std::fs::read_to_string(path).map_err(|source| HarnessError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}
