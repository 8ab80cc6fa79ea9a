//! The conformance battery.
//!
//! Every stage is a plain function with the same signature, listed in
//! [`BATTERY`] in execution order. Stages never fail with an error: each
//! outcome, good or bad, is a [`StageResult`].

use crate::config::HarnessConfig;
use crate::engine::{describe_exit, Collected, EngineProcess, WaitOutcome};
use crate::model::{EngineId, FailType, Stage, StageResult};
use crate::moves::{is_bestmove_line, parse_bestmove, BestMoveError, UciMove};
use std::thread;
use std::time::{Duration, Instant};

/// Markers of an engine runtime dying loudly (Python, Rust, JVM, .NET).
const RUNTIME_ERROR_MARKERS: &[&str] = &[
    "Traceback (most recent call last):",
    "panicked at",
    "Exception in thread",
    "Unhandled exception",
];

/// How long to wait for the exit status once the output streams closed.
const EXIT_STATUS_WAIT: Duration = Duration::from_millis(200);
const QUIT_POLL: Duration = Duration::from_millis(50);

pub type StageFn = fn(&mut EngineProcess, &mut RunContext<'_>) -> StageResult;

pub const BATTERY: [(Stage, StageFn); 8] = [
    (Stage::Launch, launch),
    (Stage::UciHandshake, uci_handshake),
    (Stage::Isready, isready),
    (Stage::Newgame, newgame),
    (Stage::FirstMoveMovetime, first_move_movetime),
    (Stage::FirstMoveTimecontrol, first_move_timecontrol),
    (Stage::MultiSequence, multi_sequence),
    (Stage::GracefulQuit, graceful_quit),
];

/// Per-engine state shared by the stages of one run. Never shared across engines.
#[derive(Debug)]
pub struct RunContext<'a> {
    pub config: &'a HarnessConfig,
    /// Moves played so far by the multi-move sequence.
    pub moves: Vec<String>,
    pub launch_error: Option<String>,
    pub engine_id: Option<EngineId>,
    pub option_count: usize,
}

impl<'a> RunContext<'a> {
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self {
            config,
            moves: Vec::new(),
            launch_error: None,
            engine_id: None,
            option_count: 0,
        }
    }
}

pub fn launch(engine: &mut EngineProcess, ctx: &mut RunContext<'_>) -> StageResult {
    let t0 = Instant::now();
    if let Err(e) = engine.start() {
        let detail = e.to_string();
        ctx.launch_error = Some(detail.clone());
        return StageResult::fail(Stage::Launch, FailType::Crash, t0.elapsed(), detail);
    }

    let grace = Duration::from_millis(ctx.config.launch_grace_ms);
    match engine.wait_exit(grace) {
        None => StageResult::pass(Stage::Launch, t0.elapsed(), ""),
        Some(status) => {
            let mut detail = format!("process not alive after launch ({status})");
            let output = tail(&engine.transcript(), 5, ";");
            if !output.is_empty() {
                detail.push_str(": ");
                detail.push_str(&output);
            }
            ctx.launch_error = Some(detail.clone());
            StageResult::fail(Stage::Launch, FailType::Crash, t0.elapsed(), detail)
        }
    }
}

pub fn uci_handshake(engine: &mut EngineProcess, ctx: &mut RunContext<'_>) -> StageResult {
    let t0 = Instant::now();
    engine.send("uci");
    let got = engine.wait_for(
        |l| l.trim() == "uciok",
        ctx.config.timeouts.for_stage(Stage::UciHandshake),
    );
    capture_identity(&got.lines, ctx);

    let detail = tail(&got.lines, 10, "\n");
    if got.outcome == WaitOutcome::Matched {
        return StageResult::pass(Stage::UciHandshake, t0.elapsed(), detail);
    }
    if has_runtime_error(&got.lines) {
        if got.outcome == WaitOutcome::Closed {
            // reap, so the runner sees the engine as gone
            engine.wait_exit(EXIT_STATUS_WAIT);
        }
        StageResult::fail(Stage::UciHandshake, FailType::Traceback, t0.elapsed(), detail)
    } else {
        unanswered(engine, Stage::UciHandshake, FailType::Timeout, t0, &got, detail)
    }
}

pub fn isready(engine: &mut EngineProcess, ctx: &mut RunContext<'_>) -> StageResult {
    let t0 = Instant::now();
    engine.send("isready");
    ready_ok(engine, ctx, Stage::Isready, t0)
}

pub fn newgame(engine: &mut EngineProcess, ctx: &mut RunContext<'_>) -> StageResult {
    let t0 = Instant::now();
    engine.send("ucinewgame");
    engine.send("isready");
    ready_ok(engine, ctx, Stage::Newgame, t0)
}

fn ready_ok(
    engine: &mut EngineProcess,
    ctx: &RunContext<'_>,
    stage: Stage,
    t0: Instant,
) -> StageResult {
    let got = engine.wait_for(|l| l.trim() == "readyok", ctx.config.timeouts.for_stage(stage));
    let detail = tail(&got.lines, 5, ";");
    match got.outcome {
        WaitOutcome::Matched => StageResult::pass(stage, t0.elapsed(), detail),
        _ => unanswered(engine, stage, FailType::Timeout, t0, &got, detail),
    }
}

pub fn first_move_movetime(engine: &mut EngineProcess, ctx: &mut RunContext<'_>) -> StageResult {
    let go = format!("go movetime {}", ctx.config.movetime_ms);
    request_move(engine, ctx, Stage::FirstMoveMovetime, "position startpos", &go).0
}

/// Same as [`first_move_movetime`] but with clock budgets, so the engine's
/// own time management decides how long to think.
pub fn first_move_timecontrol(
    engine: &mut EngineProcess,
    ctx: &mut RunContext<'_>,
) -> StageResult {
    let go = ctx.config.time_control.go_command();
    request_move(engine, ctx, Stage::FirstMoveTimecontrol, "position startpos", &go).0
}

/// Replays the engine's own replies: each request extends the position with
/// every move the engine returned so far.
pub fn multi_sequence(engine: &mut EngineProcess, ctx: &mut RunContext<'_>) -> StageResult {
    let t0 = Instant::now();
    let go = format!("go movetime {}", ctx.config.multi_sequence.movetime_ms);

    for i in 0..ctx.config.multi_sequence.moves {
        let position = if ctx.moves.is_empty() {
            "position startpos".to_string()
        } else {
            format!("position startpos moves {}", ctx.moves.join(" "))
        };
        let (result, mv) = request_move(engine, ctx, Stage::MultiSequence, &position, &go);
        match (mv, result.fail_type) {
            (Some(mv), _) => ctx.moves.push(mv.to_string()),
            (None, fail_type) => {
                return StageResult::fail(
                    Stage::MultiSequence,
                    fail_type.unwrap_or(FailType::NoBestmove),
                    t0.elapsed(),
                    format!("move {}: {}", i + 1, result.detail),
                );
            }
        }
    }

    StageResult::pass(
        Stage::MultiSequence,
        t0.elapsed(),
        format!("Moves={}", ctx.moves.join(",")),
    )
}

pub fn graceful_quit(engine: &mut EngineProcess, ctx: &mut RunContext<'_>) -> StageResult {
    let t0 = Instant::now();
    let timeout = ctx.config.timeouts.for_stage(Stage::GracefulQuit);
    engine.send("quit");

    let mut farewell = Vec::new();
    loop {
        if let Some(status) = engine.exit_status() {
            return StageResult::pass(Stage::GracefulQuit, t0.elapsed(), format!("exited ({status})"));
        }
        let remaining = timeout.saturating_sub(t0.elapsed());
        if remaining.is_zero() {
            let mut detail = "did not exit".to_string();
            if !farewell.is_empty() {
                detail.push_str(": ");
                detail.push_str(&tail(&farewell, 5, ";"));
            }
            return StageResult::fail(Stage::GracefulQuit, FailType::Timeout, t0.elapsed(), detail);
        }
        let slice = remaining.min(QUIT_POLL);
        let started = Instant::now();
        farewell.extend(engine.drain_for(slice));
        // drain returns early once the streams are closed
        if let Some(rest) = slice.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
}

/// Send `position` + `go` and validate the reply. The move is returned only
/// when the stage passed.
fn request_move(
    engine: &mut EngineProcess,
    ctx: &RunContext<'_>,
    stage: Stage,
    position: &str,
    go: &str,
) -> (StageResult, Option<UciMove>) {
    let t0 = Instant::now();
    engine.send(position);
    engine.send(go);
    let got = engine.wait_for(is_bestmove_line, ctx.config.move_deadline(stage));

    let Some(line) = got.matched().map(str::to_string) else {
        let detail = tail(&got.lines, 8, ";");
        let result = unanswered(engine, stage, FailType::NoBestmove, t0, &got, detail);
        return (result, None);
    };
    match parse_bestmove(&line) {
        Ok(mv) => (StageResult::pass(stage, t0.elapsed(), line), Some(mv)),
        Err(BestMoveError::Missing) => (
            StageResult::fail(stage, FailType::NoBestmove, t0.elapsed(), line),
            None,
        ),
        Err(BestMoveError::Malformed(_)) => (
            StageResult::fail(stage, FailType::IllegalMove, t0.elapsed(), line),
            None,
        ),
    }
}

/// A wait ended without a qualifying line: `ENGINE_EXITED` when the output
/// closed, `otherwise` when the deadline ran out.
fn unanswered(
    engine: &mut EngineProcess,
    stage: Stage,
    otherwise: FailType,
    t0: Instant,
    got: &Collected,
    detail: String,
) -> StageResult {
    if got.outcome != WaitOutcome::Closed {
        return StageResult::fail(stage, otherwise, t0.elapsed(), detail);
    }
    let status = describe_exit(engine.wait_exit(EXIT_STATUS_WAIT));
    let detail = if detail.is_empty() {
        format!("engine exited ({status})")
    } else {
        format!("engine exited ({status}): {detail}")
    };
    StageResult::fail(stage, FailType::EngineExited, t0.elapsed(), detail)
}

fn has_runtime_error(lines: &[String]) -> bool {
    lines
        .iter()
        .any(|l| RUNTIME_ERROR_MARKERS.iter().any(|m| l.contains(m)))
}

fn capture_identity(lines: &[String], ctx: &mut RunContext<'_>) {
    for line in lines {
        let line = line.trim();
        if let Some(rest) = strip_keyword(line, "id") {
            let id = ctx.engine_id.get_or_insert_with(EngineId::default);
            if let Some(name) = strip_keyword(rest, "name").filter(|v| !v.is_empty()) {
                id.name = Some(name.to_string());
            } else if let Some(author) = strip_keyword(rest, "author").filter(|v| !v.is_empty()) {
                id.author = Some(author.to_string());
            }
        } else if strip_keyword(line, "option")
            .and_then(|rest| strip_keyword(rest, "name"))
            .is_some()
        {
            ctx.option_count += 1;
        }
    }
    if ctx.engine_id == Some(EngineId::default()) {
        ctx.engine_id = None;
    }
}

/// `kw rest...` → `rest` (keyword compared case-insensitively).
fn strip_keyword<'a>(s: &'a str, kw: &str) -> Option<&'a str> {
    let (head, rest) = s.split_once(char::is_whitespace)?;
    head.eq_ignore_ascii_case(kw).then(|| rest.trim_start())
}

fn tail(lines: &[String], n: usize, sep: &str) -> String {
    lines[lines.len().saturating_sub(n)..].join(sep)
}
