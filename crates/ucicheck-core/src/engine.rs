//! Engine process lifecycle and line synchronization.
//!
//! A started engine writes stdout and stderr into one OS pipe, so lines
//! arrive in the order the process emitted them. A single background reader
//! splits that stream into lines, appends each to a shared transcript and
//! forwards it on an unbounded channel, whether or not a stage is waiting.
//! Stages consume the channel through [`EngineProcess::wait_for`] and
//! [`EngineProcess::drain_for`], both bounded by a caller deadline.

use crate::model::engine_name;
use std::io::{self, BufRead, BufReader, PipeReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Upper bound for joining the reader thread at teardown. A grandchild that
/// inherited the pipe can keep the reader alive after the engine is gone.
const READER_JOIN_BOUND: Duration = Duration::from_millis(500);

/// How a [`EngineProcess::wait_for`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A line satisfied the predicate; it is the last collected line.
    Matched,
    /// The deadline elapsed first.
    TimedOut,
    /// The output pipe closed (the engine exited) before a match.
    Closed,
}

#[derive(Debug, Clone)]
pub struct Collected {
    pub outcome: WaitOutcome,
    pub lines: Vec<String>,
}

impl Collected {
    pub fn matched(&self) -> Option<&str> {
        match self.outcome {
            WaitOutcome::Matched => self.lines.last().map(String::as_str),
            _ => None,
        }
    }
}

pub struct EngineProcess {
    path: PathBuf,
    name: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    rx: Option<Receiver<String>>,
    transcript: Arc<Mutex<Vec<String>>>,
    reader: Option<JoinHandle<()>>,
}

impl EngineProcess {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            name: engine_name(path),
            child: None,
            stdin: None,
            rx: None,
            transcript: Arc::new(Mutex::new(Vec::new())),
            reader: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn the binary with piped stdin; stdout and stderr share one pipe.
    pub fn start(&mut self) -> io::Result<()> {
        let (output, out_writer) = io::pipe()?;
        let err_writer = out_writer.try_clone()?;
        // The temporary Command owns our write ends; once it drops, EOF
        // follows engine exit.
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(out_writer)
            .stderr(err_writer)
            .spawn()?;

        tracing::debug!(engine = %self.name, pid = child.id(), "engine spawned");
        self.stdin = child.stdin.take();
        self.child = Some(child);

        let (tx, rx) = mpsc::channel();
        self.reader = Some(self.spawn_reader(output, tx)?);
        self.rx = Some(rx);
        Ok(())
    }

    fn spawn_reader(&self, stream: PipeReader, tx: Sender<String>) -> io::Result<JoinHandle<()>> {
        let transcript = Arc::clone(&self.transcript);
        let engine = self.name.clone();
        thread::Builder::new()
            .name("ucicheck-output".into())
            .spawn(move || {
                let mut reader = BufReader::new(stream);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = String::from_utf8_lossy(&buf)
                                .trim_end_matches(['\r', '\n'])
                                .to_string();
                            tracing::trace!(engine = %engine, line = %line, "<<");
                            if let Ok(mut t) = transcript.lock() {
                                t.push(line.clone());
                            }
                            // The receiver only goes away at teardown.
                            let _ = tx.send(line);
                        }
                        Err(e) => {
                            tracing::debug!(engine = %engine, error = %e, "read failed");
                            break;
                        }
                    }
                }
            })
    }

    /// Write `line` plus a newline and flush. No acknowledgement is awaited;
    /// a write to a dead engine is logged and otherwise ignored.
    pub fn send(&mut self, line: &str) {
        let Some(stdin) = self.stdin.as_mut() else {
            return;
        };
        tracing::debug!(engine = %self.name, line, ">>");
        if let Err(e) = write_line(stdin, line) {
            tracing::debug!(engine = %self.name, error = %e, "send failed");
        }
    }

    /// Collect lines until one satisfies `predicate` or `timeout` elapses.
    /// The collected lines are returned either way.
    pub fn wait_for<P>(&mut self, mut predicate: P, timeout: Duration) -> Collected
    where
        P: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        let Some(rx) = self.rx.as_ref() else {
            return Collected {
                outcome: WaitOutcome::Closed,
                lines,
            };
        };
        let deadline = Instant::now() + timeout;
        let outcome = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break WaitOutcome::TimedOut;
            }
            match rx.recv_timeout(remaining) {
                Ok(line) => {
                    let hit = predicate(&line);
                    lines.push(line);
                    if hit {
                        break WaitOutcome::Matched;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break WaitOutcome::TimedOut,
                Err(RecvTimeoutError::Disconnected) => break WaitOutcome::Closed,
            }
        };
        Collected { outcome, lines }
    }

    /// Collect whatever arrives within `window`. Returns early only if the
    /// output streams close.
    pub fn drain_for(&mut self, window: Duration) -> Vec<String> {
        self.wait_for(|_| false, window).lines
    }

    /// Exit status if the process has exited. Never blocks.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.as_mut().and_then(|c| c.try_wait().ok().flatten())
    }

    /// True while a started process has not exited.
    pub fn is_running(&mut self) -> bool {
        self.child.is_some() && self.exit_status().is_none()
    }

    pub fn has_exited(&mut self) -> bool {
        self.child.is_some() && self.exit_status().is_some()
    }

    /// Poll for exit until `timeout`.
    pub fn wait_exit(&mut self, timeout: Duration) -> Option<ExitStatus> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.exit_status() {
                return Some(status);
            }
            if start.elapsed() >= timeout {
                return None;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Send `quit`, give the engine `grace` to exit, then force-kill.
    /// Safe to call repeatedly and on a process that never started.
    pub fn terminate(&mut self, grace: Duration) {
        if self.is_running() {
            self.send("quit");
            if self.wait_exit(grace).is_none() {
                if let Some(child) = self.child.as_mut() {
                    tracing::debug!(engine = %self.name, "force killing engine");
                    let _ = child.kill();
                }
            }
        }
        if let Some(child) = self.child.as_mut() {
            // reap
            let _ = child.wait();
        }
        self.stdin = None;
        self.join_reader();
    }

    fn join_reader(&mut self) {
        let Some(handle) = self.reader.take() else {
            return;
        };
        let start = Instant::now();
        while !handle.is_finished() && start.elapsed() < READER_JOIN_BOUND {
            thread::sleep(POLL_INTERVAL);
        }
        if handle.is_finished() {
            let _ = handle.join();
        } else {
            tracing::warn!(engine = %self.name, "output reader still blocked after teardown; detaching");
        }
    }

    /// Snapshot of every line the engine has written so far.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .lock()
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        // Best-effort cleanup
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

fn write_line<W: Write>(w: &mut W, line: &str) -> io::Result<()> {
    w.write_all(line.as_bytes())?;
    w.write_all(b"\n")?;
    w.flush()
}

/// `exit status: 0`, `signal: 9 (SIGKILL)`, ... or `unknown`.
pub fn describe_exit(status: Option<ExitStatus>) -> String {
    match status {
        Some(s) => s.to_string(),
        None => "unknown".into(),
    }
}
