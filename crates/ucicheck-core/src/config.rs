//! Harness configuration.
//!
//! Merge precedence: built-in defaults → YAML file (`--config`) → CLI flags.
//! Stage deadlines are stored in seconds, matching the report's duration unit.

use crate::error::{HarnessError, Result};
use crate::model::Stage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-stage deadlines, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    pub uci_handshake: f64,
    pub isready: f64,
    pub newgame: f64,
    pub first_move_movetime: f64,
    pub first_move_timecontrol: f64,
    /// Deadline for each single move of the multi-move sequence.
    pub multi_sequence_single: f64,
    pub graceful_quit: f64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            uci_handshake: 3.0,
            isready: 2.0,
            newgame: 2.0,
            first_move_movetime: 2.0,
            first_move_timecontrol: 3.0,
            multi_sequence_single: 2.0,
            graceful_quit: 2.0,
        }
    }
}

impl Timeouts {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            uci_handshake: self.uci_handshake * factor,
            isready: self.isready * factor,
            newgame: self.newgame * factor,
            first_move_movetime: self.first_move_movetime * factor,
            first_move_timecontrol: self.first_move_timecontrol * factor,
            multi_sequence_single: self.multi_sequence_single * factor,
            graceful_quit: self.graceful_quit * factor,
        }
    }

    /// Deadline for a stage. Launch has no entry; its grace window is separate.
    pub fn for_stage(&self, stage: Stage) -> Duration {
        let secs = match stage {
            Stage::Launch => 0.0,
            Stage::UciHandshake => self.uci_handshake,
            Stage::Isready => self.isready,
            Stage::Newgame => self.newgame,
            Stage::FirstMoveMovetime => self.first_move_movetime,
            Stage::FirstMoveTimecontrol => self.first_move_timecontrol,
            Stage::MultiSequence => self.multi_sequence_single,
            Stage::GracefulQuit => self.graceful_quit,
        };
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn validate(&self) -> Result<()> {
        let all = [
            ("uci_handshake", self.uci_handshake),
            ("isready", self.isready),
            ("newgame", self.newgame),
            ("first_move_movetime", self.first_move_movetime),
            ("first_move_timecontrol", self.first_move_timecontrol),
            ("multi_sequence_single", self.multi_sequence_single),
            ("graceful_quit", self.graceful_quit),
        ];
        for (name, secs) in all {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(HarnessError::InvalidConfig(format!(
                    "timeouts.{name} must be a positive number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

/// Clock budgets sent with `go wtime .. btime ..`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeControl {
    pub wtime_ms: u64,
    pub btime_ms: u64,
    pub winc_ms: u64,
    pub binc_ms: u64,
}

impl Default for TimeControl {
    fn default() -> Self {
        Self {
            wtime_ms: 2000,
            btime_ms: 2000,
            winc_ms: 0,
            binc_ms: 0,
        }
    }
}

impl TimeControl {
    pub fn go_command(&self) -> String {
        format!(
            "go wtime {} btime {} winc {} binc {}",
            self.wtime_ms, self.btime_ms, self.winc_ms, self.binc_ms
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MultiSequence {
    /// Number of engine replies to chain.
    pub moves: usize,
    pub movetime_ms: u64,
}

impl Default for MultiSequence {
    fn default() -> Self {
        Self {
            moves: 3,
            movetime_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    pub timeouts: Timeouts,
    /// How long a freshly spawned engine must stay alive. Not scaled.
    pub launch_grace_ms: u64,
    /// Wait between the teardown `quit` and the force kill.
    pub terminate_grace_ms: u64,
    pub movetime_ms: u64,
    pub time_control: TimeControl,
    pub multi_sequence: MultiSequence,
    /// Hard cap on every move-stage wait, applied after scaling.
    pub max_move_ms: Option<u64>,
    pub detail_max_len: usize,
    pub log_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            launch_grace_ms: 500,
            terminate_grace_ms: 200,
            movetime_ms: 1000,
            time_control: TimeControl::default(),
            multi_sequence: MultiSequence::default(),
            max_move_ms: None,
            detail_max_len: 120,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// CLI-level overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub timeout_scale: Option<f64>,
    pub max_move_ms: Option<u64>,
    pub log_dir: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn from_yaml_str(content: &str, origin: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| HarnessError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content, path)
    }

    /// Defaults (or `file`), then `overrides`, validated.
    pub fn resolve(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let base = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        base.apply(overrides)
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(scale) = overrides.timeout_scale {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(HarnessError::InvalidConfig(format!(
                    "timeout scale must be > 0, got {scale}"
                )));
            }
            self.timeouts = self.timeouts.scaled(scale);
        }
        if overrides.max_move_ms.is_some() {
            self.max_move_ms = overrides.max_move_ms;
        }
        if let Some(dir) = overrides.log_dir {
            self.log_dir = dir;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate()?;
        if self.max_move_ms == Some(0) {
            return Err(HarnessError::InvalidConfig(
                "max_move_ms must be > 0".into(),
            ));
        }
        if self.detail_max_len == 0 {
            return Err(HarnessError::InvalidConfig(
                "detail_max_len must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Deadline for a move stage: the stage timeout, clipped by `max_move_ms`.
    pub fn move_deadline(&self, stage: Stage) -> Duration {
        let deadline = self.timeouts.for_stage(stage);
        match self.max_move_ms {
            Some(cap) => deadline.min(Duration::from_millis(cap)),
            None => deadline,
        }
    }
}
