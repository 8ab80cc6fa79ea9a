use crate::config::HarnessConfig;
use crate::engine::EngineProcess;
use crate::model::{engine_name, EngineReport, FailType, Stage};
use crate::report::transcript::write_transcript;
use crate::stages::{RunContext, BATTERY};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

/// Run the full battery against one engine binary.
///
/// Stage rules:
/// - a failed `launch` ends the run with exactly one result;
/// - once the engine is seen dead, every remaining stage except
///   `graceful_quit` is skipped.
///
/// The process is always torn down before the transcript is written to
/// `<log_dir>/<basename>.log`.
pub fn run_engine(path: &Path, config: &HarnessConfig) -> EngineReport {
    run_engine_logged(path, config, &engine_name(path))
}

fn run_engine_logged(path: &Path, config: &HarnessConfig, log_stem: &str) -> EngineReport {
    let started = Instant::now();
    let mut report = EngineReport::new(path);
    let mut engine = EngineProcess::new(path);
    let mut ctx = RunContext::new(config);

    let span = tracing::info_span!("engine", engine = %report.engine);
    let _guard = span.enter();

    let mut dead = false;
    for (stage, run) in BATTERY {
        if dead && stage != Stage::GracefulQuit {
            tracing::debug!(stage = %stage, "skipped, engine exited");
            continue;
        }
        let result = run(&mut engine, &mut ctx);
        tracing::info!(
            stage = %stage,
            ok = result.ok,
            fail_type = result.fail_type.map(|f| f.as_str()).unwrap_or("-"),
            duration_ms = result.duration.as_millis() as u64,
            "stage finished"
        );
        let launch_failed = stage == Stage::Launch && !result.ok;
        let exited = result.fail_type == Some(FailType::EngineExited);
        report.push(result);

        if launch_failed {
            break;
        }
        if !dead && stage != Stage::GracefulQuit && (exited || engine.has_exited()) {
            tracing::warn!(after = %stage, "engine exited mid-battery");
            dead = true;
        }
    }

    engine.terminate(Duration::from_millis(config.terminate_grace_ms));
    report.total_duration = started.elapsed();
    report.launch_error = ctx.launch_error;
    report.engine_id = ctx.engine_id;
    report.option_count = ctx.option_count;

    let transcript = engine.transcript();
    match write_transcript(&config.log_dir, log_stem, &transcript) {
        Ok(p) => tracing::debug!(path = %p.display(), lines = transcript.len(), "transcript written"),
        Err(e) => tracing::warn!(error = %e, "failed to write transcript"),
    }
    report
}

/// Progress notifications emitted by [`run_all`].
#[derive(Debug, Clone, Copy)]
pub enum Progress<'a> {
    Started {
        index: usize,
        total: usize,
        path: &'a Path,
    },
    Finished {
        index: usize,
        total: usize,
        report: &'a EngineReport,
    },
}

/// Test engines one at a time, in the given order. Engines sharing a
/// basename get distinct transcript files (see [`log_stems`]).
pub fn run_all<F>(engines: &[PathBuf], config: &HarnessConfig, mut on_progress: F) -> Vec<EngineReport>
where
    F: FnMut(Progress<'_>),
{
    let total = engines.len();
    let stems = log_stems(engines);
    let mut reports = Vec::with_capacity(total);
    for (index, path) in engines.iter().enumerate() {
        on_progress(Progress::Started { index, total, path });
        let report = run_engine_logged(path, config, &stems[index]);
        on_progress(Progress::Finished {
            index,
            total,
            report: &report,
        });
        reports.push(report);
    }
    reports
}

/// Transcript file stems, one per engine and pairwise distinct.
///
/// A basename shared by several engines is widened with the directories
/// that tell them apart, joined by `__`: `v1/engine.exe` and `v2/engine.exe`
/// become `v1__engine.exe` and `v2__engine.exe`. Identical paths fall back
/// to an index suffix.
fn log_stems(engines: &[PathBuf]) -> Vec<String> {
    let mut stems: Vec<String> = engines.iter().map(|p| engine_name(p)).collect();

    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, name) in stems.iter().enumerate() {
        groups.entry(name.as_str()).or_default().push(i);
    }
    let shared: Vec<Vec<usize>> = groups.into_values().filter(|g| g.len() > 1).collect();

    for group in shared {
        let parts: Vec<Vec<String>> = group.iter().map(|&i| normal_components(&engines[i])).collect();
        let shortest = parts.iter().map(Vec::len).min().unwrap_or(0);
        // keep at least the basename
        let common = (0..shortest.saturating_sub(1))
            .take_while(|&k| parts.iter().all(|p| p[k] == parts[0][k]))
            .count();
        for (&i, p) in group.iter().zip(&parts) {
            if p.len() > common {
                stems[i] = p[common..].join("__");
            }
        }
    }

    let mut seen = HashSet::new();
    for (i, stem) in stems.iter_mut().enumerate() {
        if !seen.insert(stem.clone()) {
            *stem = format!("{stem}.{i}");
            seen.insert(stem.clone());
        }
    }
    stems
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
