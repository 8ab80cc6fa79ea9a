#![cfg(unix)]
//! Full battery against stub engines written as POSIX shell scripts.
//!
//! Tests are serialized: writing an executable while another test thread
//! forks can leave the file busy (ETXTBSY) at exec time.

use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use ucicheck_core::{run_all, run_engine, FailType, HarnessConfig, Stage};

const CONFORMING: &str = r#"
while IFS= read -r line; do
  case "$line" in
    uci)
      echo "id name Stub Engine"
      echo "id author ucicheck"
      echo "option name Hash type spin default 16 min 1 max 64"
      echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      echo "info depth 1 score cp 20 pv e2e4"
      echo "bestmove e2e4" ;;
    quit) exit 0 ;;
  esac
done
"#;

/// Engine traffic shows up in failing test output with `RUST_LOG=ucicheck_core=trace`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Short deadlines so failing stubs finish quickly.
fn fast_config(log_dir: &Path, stage_secs: f64) -> HarnessConfig {
    let mut cfg = HarnessConfig::default();
    cfg.launch_grace_ms = 100;
    cfg.terminate_grace_ms = 50;
    cfg.movetime_ms = 50;
    cfg.multi_sequence.movetime_ms = 50;
    cfg.timeouts.uci_handshake = stage_secs;
    cfg.timeouts.isready = stage_secs;
    cfg.timeouts.newgame = stage_secs;
    cfg.timeouts.first_move_movetime = stage_secs;
    cfg.timeouts.first_move_timecontrol = stage_secs;
    cfg.timeouts.multi_sequence_single = stage_secs;
    cfg.timeouts.graceful_quit = stage_secs;
    cfg.log_dir = log_dir.to_path_buf();
    cfg
}

fn stage_names(report: &ucicheck_core::EngineReport) -> Vec<Stage> {
    report.stages().iter().map(|s| s.name).collect()
}

#[test]
#[serial]
fn conforming_engine_passes_every_stage() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let engine = stub(dir.path(), "stub_ok", CONFORMING);
    let cfg = fast_config(&dir.path().join("logs"), 2.0);

    let report = run_engine(&engine, &cfg);

    assert_eq!(stage_names(&report), Stage::ALL.to_vec());
    for s in report.stages() {
        assert!(s.ok, "{} failed: {:?} {}", s.name, s.fail_type, s.detail);
    }
    assert!(report.critical_pass());
    assert!(report.launch_error.is_none());

    let id = report.engine_id.as_ref().expect("engine id captured");
    assert_eq!(id.name.as_deref(), Some("Stub Engine"));
    assert_eq!(id.author.as_deref(), Some("ucicheck"));
    assert_eq!(report.option_count, 1);

    let multi = report.stage(Stage::MultiSequence).unwrap();
    assert_eq!(multi.detail, "Moves=e2e4,e2e4,e2e4");

    let log = std::fs::read_to_string(dir.path().join("logs/stub_ok.log")).unwrap();
    assert!(log.lines().any(|l| l == "uciok"));
    assert!(log.lines().any(|l| l == "bestmove e2e4"));
}

#[test]
#[serial]
fn silent_engine_times_out_without_hanging() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let engine = stub(dir.path(), "stub_silent", "exec sleep 30");
    let cfg = fast_config(&dir.path().join("logs"), 0.3);

    let start = Instant::now();
    let report = run_engine(&engine, &cfg);
    let elapsed = start.elapsed();

    assert!(report.stage(Stage::Launch).unwrap().ok);
    let first_failure = report.stages().iter().find(|s| !s.ok).unwrap();
    assert_eq!(first_failure.name, Stage::UciHandshake);
    assert_eq!(first_failure.fail_type, Some(FailType::Timeout));
    assert!(first_failure.duration >= Duration::from_millis(300));
    assert!(first_failure.duration < Duration::from_millis(1300));
    assert!(!report.critical_pass());

    // seven 0.3s deadlines + multi-move retries stop at the first miss
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
    assert_eq!(
        report.stage(Stage::GracefulQuit).unwrap().fail_type,
        Some(FailType::Timeout)
    );
}

#[test]
#[serial]
fn launch_failure_records_only_launch() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let cfg = fast_config(&dir.path().join("logs"), 0.5);

    let missing = dir.path().join("does_not_exist");
    let report = run_engine(&missing, &cfg);
    assert_eq!(stage_names(&report), vec![Stage::Launch]);
    assert_eq!(report.stages()[0].fail_type, Some(FailType::Crash));
    assert!(report.launch_error.is_some());
    assert!(!report.critical_pass());

    let crashing = stub(dir.path(), "stub_crash", "echo boom; exit 1");
    let report = run_engine(&crashing, &cfg);
    assert_eq!(stage_names(&report), vec![Stage::Launch]);
    assert_eq!(report.stages()[0].fail_type, Some(FailType::Crash));
    assert!(report.launch_error.as_deref().unwrap().contains("exit status: 1"));
}

#[test]
#[serial]
fn traceback_during_handshake_is_classified() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let engine = stub(
        dir.path(),
        "stub_traceback",
        r#"read -r line
echo "Traceback (most recent call last):" 1>&2
echo "  File \"engine.py\", line 1, in <module>" 1>&2
echo "ValueError: bad" 1>&2
exit 1"#,
    );
    let cfg = fast_config(&dir.path().join("logs"), 2.0);

    let report = run_engine(&engine, &cfg);
    let handshake = report.stage(Stage::UciHandshake).unwrap();
    assert_eq!(handshake.fail_type, Some(FailType::Traceback));
    assert!(handshake.detail.contains("ValueError"));
    // dead engine: straight to graceful_quit
    assert_eq!(
        stage_names(&report),
        vec![Stage::Launch, Stage::UciHandshake, Stage::GracefulQuit]
    );
    assert!(report.stage(Stage::GracefulQuit).unwrap().ok);
}

#[test]
#[serial]
fn malformed_and_missing_bestmove() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let cfg = fast_config(&dir.path().join("logs"), 1.0);

    let illegal = stub(
        dir.path(),
        "stub_illegal",
        &CONFORMING.replace("bestmove e2e4", "bestmove e2e9"),
    );
    let report = run_engine(&illegal, &cfg);
    let first = report.stage(Stage::FirstMoveMovetime).unwrap();
    assert_eq!(first.fail_type, Some(FailType::IllegalMove));
    assert_eq!(first.detail, "bestmove e2e9");
    assert!(!report.critical_pass());
    assert_eq!(
        report.stage(Stage::MultiSequence).unwrap().fail_type,
        Some(FailType::IllegalMove)
    );

    let bare = stub(
        dir.path(),
        "stub_bare",
        &CONFORMING.replace("bestmove e2e4", "bestmove"),
    );
    let report = run_engine(&bare, &cfg);
    assert_eq!(
        report.stage(Stage::FirstMoveMovetime).unwrap().fail_type,
        Some(FailType::NoBestmove)
    );
}

#[test]
#[serial]
fn engine_dying_mid_battery_skips_to_quit() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let engine = stub(
        dir.path(),
        "stub_dies_on_go",
        &CONFORMING.replace(
            "echo \"info depth 1 score cp 20 pv e2e4\"",
            "exit 2",
        ),
    );
    let cfg = fast_config(&dir.path().join("logs"), 2.0);

    let report = run_engine(&engine, &cfg);
    assert_eq!(
        stage_names(&report),
        vec![
            Stage::Launch,
            Stage::UciHandshake,
            Stage::Isready,
            Stage::Newgame,
            Stage::FirstMoveMovetime,
            Stage::GracefulQuit,
        ]
    );
    let first = report.stage(Stage::FirstMoveMovetime).unwrap();
    assert_eq!(first.fail_type, Some(FailType::EngineExited));
    assert!(first.detail.contains("exit status: 2"), "{}", first.detail);
    assert!(first.duration < Duration::from_secs(2));
    assert!(report.stage(Stage::GracefulQuit).unwrap().ok);
}

#[test]
#[serial]
fn multi_sequence_replays_engine_replies() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let engine = stub(
        dir.path(),
        "stub_replay",
        r#"mv=a2a3
while IFS= read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    "position startpos") mv=e2e4 ;;
    "position startpos moves e2e4") mv=e7e5 ;;
    "position startpos moves e2e4 e7e5") mv=g1f3 ;;
    position*) mv=a2a3 ;;
    go*) echo "bestmove $mv" ;;
    quit) exit 0 ;;
  esac
done"#,
    );
    let cfg = fast_config(&dir.path().join("logs"), 2.0);

    let report = run_engine(&engine, &cfg);
    let multi = report.stage(Stage::MultiSequence).unwrap();
    assert!(multi.ok, "{}", multi.detail);
    assert_eq!(multi.detail, "Moves=e2e4,e7e5,g1f3");
}

#[test]
#[serial]
fn diagnostic_failures_do_not_affect_critical_pass() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    // Answers the fixed-movetime request but ignores clock-based `go`
    // and never exits on quit.
    let engine = stub(
        dir.path(),
        "stub_partial",
        r#"while IFS= read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    "go movetime"*) echo "bestmove d2d4" ;;
  esac
done"#,
    );
    let cfg = fast_config(&dir.path().join("logs"), 0.5);

    let report = run_engine(&engine, &cfg);
    assert_eq!(
        report.stage(Stage::FirstMoveTimecontrol).unwrap().fail_type,
        Some(FailType::NoBestmove)
    );
    assert_eq!(
        report.stage(Stage::GracefulQuit).unwrap().fail_type,
        Some(FailType::Timeout)
    );
    assert!(report.critical_pass());
}

#[test]
#[serial]
fn same_named_engines_keep_separate_transcripts() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut engines = Vec::new();
    for version in ["v1", "v2"] {
        std::fs::create_dir_all(dir.path().join(version)).unwrap();
        let body = CONFORMING.replace("Stub Engine", &format!("Stub {version}"));
        engines.push(stub(dir.path(), &format!("{version}/engine.exe"), &body));
    }
    let logs = dir.path().join("logs");
    let cfg = fast_config(&logs, 2.0);

    let reports = run_all(&engines, &cfg, |_| {});
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.engine == "engine.exe"));

    let mut written: Vec<String> = std::fs::read_dir(&logs)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["v1__engine.exe.log", "v2__engine.exe.log"]);

    for version in ["v1", "v2"] {
        let log = std::fs::read_to_string(logs.join(format!("{version}__engine.exe.log"))).unwrap();
        assert!(log.lines().any(|l| l == format!("id name Stub {version}")), "{log}");
    }
}
