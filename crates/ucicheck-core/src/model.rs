use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// One protocol interaction of the conformance battery, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Launch,
    UciHandshake,
    Isready,
    Newgame,
    FirstMoveMovetime,
    FirstMoveTimecontrol,
    MultiSequence,
    GracefulQuit,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Launch,
        Stage::UciHandshake,
        Stage::Isready,
        Stage::Newgame,
        Stage::FirstMoveMovetime,
        Stage::FirstMoveTimecontrol,
        Stage::MultiSequence,
        Stage::GracefulQuit,
    ];

    /// Stages whose joint success makes an engine usable.
    pub const CRITICAL: [Stage; 4] = [
        Stage::Launch,
        Stage::UciHandshake,
        Stage::Isready,
        Stage::FirstMoveMovetime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Launch => "launch",
            Stage::UciHandshake => "uci_handshake",
            Stage::Isready => "isready",
            Stage::Newgame => "newgame",
            Stage::FirstMoveMovetime => "first_move_movetime",
            Stage::FirstMoveTimecontrol => "first_move_timecontrol",
            Stage::MultiSequence => "multi_sequence",
            Stage::GracefulQuit => "graceful_quit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailType {
    /// Process failed to start or died during the launch grace window.
    Crash,
    /// No qualifying line within the stage deadline.
    Timeout,
    /// Runtime-error marker seen during the handshake.
    Traceback,
    /// `go` produced no usable `bestmove` in time.
    NoBestmove,
    /// `bestmove` present but its move token is malformed.
    IllegalMove,
    /// Output stream closed while a stage was waiting.
    EngineExited,
}

impl FailType {
    pub fn as_str(self) -> &'static str {
        match self {
            FailType::Crash => "CRASH",
            FailType::Timeout => "TIMEOUT",
            FailType::Traceback => "TRACEBACK",
            FailType::NoBestmove => "NO_BESTMOVE",
            FailType::IllegalMove => "ILLEGAL_MOVE",
            FailType::EngineExited => "ENGINE_EXITED",
        }
    }
}

impl fmt::Display for FailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub name: Stage,
    pub ok: bool,
    #[serde(with = "secs_f64")]
    pub duration: Duration,
    pub detail: String,
    pub fail_type: Option<FailType>,
}

impl StageResult {
    pub fn pass(name: Stage, duration: Duration, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: true,
            duration,
            detail: detail.into(),
            fail_type: None,
        }
    }

    pub fn fail(
        name: Stage,
        fail_type: FailType,
        duration: Duration,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            name,
            ok: false,
            duration,
            detail: detail.into(),
            fail_type: Some(fail_type),
        }
    }
}

/// `id name` / `id author` as announced during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineId {
    pub name: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    pub engine: String,
    pub path: String,
    critical_pass: bool,
    #[serde(with = "secs_f64")]
    pub total_duration: Duration,
    pub launch_error: Option<String>,
    pub engine_id: Option<EngineId>,
    pub option_count: usize,
    stages: Vec<StageResult>,
}

impl EngineReport {
    pub fn new(path: &Path) -> Self {
        Self {
            engine: engine_name(path),
            path: path.display().to_string(),
            critical_pass: false,
            total_duration: Duration::ZERO,
            launch_error: None,
            engine_id: None,
            option_count: 0,
            stages: Vec::new(),
        }
    }

    /// Append a stage outcome. Keeps `critical_pass` derived from `stages`.
    pub fn push(&mut self, result: StageResult) {
        self.stages.push(result);
        self.critical_pass = critical_pass(&self.stages);
    }

    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    /// Recomputed from the stage list, so a deserialized flag can't disagree.
    pub fn critical_pass(&self) -> bool {
        critical_pass(&self.stages)
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.name == stage)
    }
}

/// Basename of an engine path, or the whole path when it has none.
pub(crate) fn engine_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// True iff every critical stage is present with `ok == true`.
pub fn critical_pass(stages: &[StageResult]) -> bool {
    Stage::CRITICAL
        .iter()
        .all(|needed| stages.iter().any(|s| s.name == *needed && s.ok))
}

mod secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
