use super::ensure_parent;
use crate::error::{HarnessError, Result};
use crate::model::{EngineReport, StageResult};
use std::fmt::Write as _;
use std::path::Path;

pub fn render_markdown(reports: &[EngineReport], detail_max_len: usize) -> String {
    let passed = reports.iter().filter(|r| r.critical_pass()).count();
    let mut out = String::new();
    let _ = writeln!(out, "# Engine Test Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "Total engines: {}", reports.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "Critical PASS: {}/{}", passed, reports.len());
    let _ = writeln!(out);

    for r in reports {
        let _ = writeln!(out, "## Engine: {}", r.engine);
        let _ = writeln!(out, "Path: `{}`", r.path);
        if let Some(id) = &r.engine_id {
            let name = id.name.as_deref().unwrap_or("?");
            match &id.author {
                Some(author) => {
                    let _ = writeln!(out, "Id: {name} by {author}");
                }
                None => {
                    let _ = writeln!(out, "Id: {name}");
                }
            }
        }
        let verdict = if r.critical_pass() { "PASS" } else { "FAIL" };
        let _ = writeln!(out, "Result: {verdict} (critical tests)");
        let _ = writeln!(out, "Total Duration: {:.2}s", r.total_duration.as_secs_f64());
        if let Some(err) = &r.launch_error {
            let _ = writeln!(out, "Launch error: {}", one_line(err));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "| Stage | OK | Time (s) | Detail |");
        let _ = writeln!(out, "|-------|----|----------|--------|");
        for s in r.stages() {
            let glyph = if s.ok { "✅" } else { "❌" };
            let _ = writeln!(
                out,
                "| {} | {} | {:.2} | {} |",
                s.name,
                glyph,
                s.duration.as_secs_f64(),
                detail_cell(s, detail_max_len)
            );
        }
        let _ = writeln!(out);
    }
    out
}

pub fn write_markdown(reports: &[EngineReport], out: &Path, detail_max_len: usize) -> Result<()> {
    ensure_parent(out)?;
    std::fs::write(out, render_markdown(reports, detail_max_len)).map_err(|source| {
        HarnessError::Write {
            path: out.to_path_buf(),
            source,
        }
    })
}

/// `FAILTYPE:` prefix plus the detail, table-safe and cut to `max_len` chars.
fn detail_cell(s: &StageResult, max_len: usize) -> String {
    let prefix = s.fail_type.map(|f| format!("{f}:")).unwrap_or_default();
    let detail: String = one_line(&s.detail).chars().take(max_len).collect();
    format!("{prefix}{detail}")
}

fn one_line(text: &str) -> String {
    text.replace('|', "/")
        .replace("\r\n", "; ")
        .replace('\n', "; ")
}
