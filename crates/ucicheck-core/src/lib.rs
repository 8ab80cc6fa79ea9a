//! ucicheck: UCI protocol conformance harness.
//!
//! Launches chess engine binaries, drives them through a fixed battery of
//! protocol stages (handshake, ready checks, move generation under two
//! time-control styles, a self-replayed move sequence, shutdown) and records
//! a classified outcome per stage.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod model;
pub mod moves;
pub mod report;
pub mod runner;
pub mod stages;

pub use config::{ConfigOverrides, HarnessConfig, Timeouts};
pub use discovery::discover_engines;
pub use engine::{Collected, EngineProcess, WaitOutcome};
pub use error::{HarnessError, Result};
pub use model::{critical_pass, EngineId, EngineReport, FailType, Stage, StageResult};
pub use moves::{parse_bestmove, BestMoveError, UciMove};
pub use runner::{run_all, run_engine, Progress};
