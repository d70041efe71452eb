// src/drivers/mod.rs
//
// External drivers: exogenous processes that own a slice of the Markov state
// (e.g. the setpoint random walk). Drivers run at the start of every step, in
// list order, each reseeded from the engine's stream before filtering.

pub mod setpoint;

pub use setpoint::{SetPointConfig, SetPointGenerator};

use crate::state::{MarkovState, StateError};

pub trait ExternalDriver: Send + std::fmt::Debug {
    /// State keys this driver reads and writes.
    fn state_keys(&self) -> Vec<String>;

    fn set_seed(&mut self, seed: u64);

    /// Advance the driver one step and write its keys into `state`.
    fn filter(&mut self, state: &mut MarkovState) -> Result<(), StateError>;

    /// Reload the driver's internal state from `state`.
    fn set_configuration(&mut self, state: &MarkovState) -> Result<(), StateError>;
}
