//! Industrial benchmark dynamics.
//!
//! A seeded, stochastic simulation of an industrial plant used as a
//! reinforcement-learning benchmark. An agent moves three controls (velocity,
//! gain, shift) while the plant accumulates fatigue, consumes energy through
//! a delayed cost model and drifts through a hidden miscalibration regime.
//!
//! # Layout
//!
//! - **Dynamics** (`dynamics`): the step orchestrator. Owns the Markov state,
//!   bounds, random stream, cost history and collaborators.
//! - **State** (`state`): typed Markov state, bounds, observable projection.
//! - **Sub-models**: `action` (normalizer, effective action), `fatigue`,
//!   `cost_history`, `miscalibration` (Goldstone model), `drivers`
//!   (setpoint random walk), `reward`.
//! - **Ambient**: `config` (properties, env overrides), `rng`, `logging`.
//! - **Harness**: `env` (StepResult, VecEnv) and `trajectory` (JSONL).
//!
//! Given a fixed `SEED` every trajectory is reproducible, and a snapshot from
//! `markov_state` restores the exact continuation.

pub mod action;
pub mod config;
pub mod cost_history;
pub mod drivers;
pub mod dynamics;
pub mod env;
pub mod fatigue;
pub mod logging;
pub mod miscalibration;
pub mod reward;
pub mod rng;
pub mod state;
pub mod trajectory;

// --- Re-exports for ergonomic external use ---------------------------------

pub use action::{Action, ActionAbsolute, ActionDelta, ActionError, ActionKind, EffectiveAction};
pub use config::{ConfigError, DynamicsConfig, Properties};
pub use drivers::{ExternalDriver, SetPointGenerator};
pub use dynamics::{DynamicsError, IndustrialBenchmarkDynamics};
pub use env::{StepResult, VecEnv};
pub use miscalibration::{MiscalibrationAdapter, MiscalibrationModel};
pub use reward::{IndustrialBenchmarkReward, RewardFunction};
pub use state::{Bounds, MarkovState, ObservableState, StateError, StateKey};
pub use trajectory::{TrajectoryRecord, TrajectoryWriter};
