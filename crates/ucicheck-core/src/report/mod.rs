pub mod json;
pub mod markdown;
pub mod transcript;

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

pub use json::{read_json, write_json};
pub use markdown::{render_markdown, write_markdown};

/// `<dir>/engine_test_report_<YYYYmmdd_HHMMSS>.{json,md}`
pub fn default_report_paths(dir: &Path, now: DateTime<Local>) -> (PathBuf, PathBuf) {
    let stem = format!("engine_test_report_{}", now.format("%Y%m%d_%H%M%S"));
    (
        dir.join(format!("{stem}.json")),
        dir.join(format!("{stem}.md")),
    )
}

pub(crate) fn ensure_parent(path: &Path) -> crate::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| crate::HarnessError::Write {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
