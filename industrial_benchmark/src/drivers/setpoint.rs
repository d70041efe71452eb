// src/drivers/setpoint.rs
//
// Setpoint random walk.
//
// The setpoint drifts piecewise-linearly: a sequence of random length with a
// constant change rate, then a new sequence. A tenth of the sequences are
// flat. The walk is reflected at the setpoint bounds, reversing the rate.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::ExternalDriver;
use crate::config::{ConfigError, Properties};
use crate::state::{MarkovState, StateError, StateKey};

pub const CHANGE_RATE_KEY: &str = "SetPointChangeRatePerStep";
pub const CURRENT_STEPS_KEY: &str = "SetPointCurrentSteps";
pub const LAST_SEQUENCE_STEPS_KEY: &str = "SetPointLastSequenceSteps";

/// Probability that a new sequence keeps the setpoint flat.
const FLAT_SEQUENCE_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct SetPointConfig {
    pub step_size: f64,
    pub max_change_rate: f64,
    pub max_sequence_length: u64,
    pub stationary: bool,
    pub min: f64,
    pub max: f64,
}

impl Default for SetPointConfig {
    fn default() -> Self {
        Self {
            step_size: 1.0,
            max_change_rate: 0.5,
            max_sequence_length: 100,
            stationary: false,
            min: 0.0,
            max: 100.0,
        }
    }
}

impl SetPointConfig {
    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            step_size: properties.f64_or("SETPOINT_STEP_SIZE", defaults.step_size)?,
            max_change_rate: properties
                .f64_or("SETPOINT_MAX_CHANGE_RATE", defaults.max_change_rate)?,
            max_sequence_length: properties
                .u64_opt("SETPOINT_MAX_SEQUENCE_LENGTH")?
                .unwrap_or(defaults.max_sequence_length),
            stationary: properties.bool_or("STATIONARY_SETPOINT", defaults.stationary)?,
            min: properties.f64_or("SetPoint_MIN", defaults.min)?,
            max: properties.f64_or("SetPoint_MAX", defaults.max)?,
        };

        if !(config.max_change_rate >= 0.0 && config.max_change_rate.is_finite()) {
            return Err(ConfigError::InvalidValue {
                key: "SETPOINT_MAX_CHANGE_RATE".to_string(),
                value: config.max_change_rate.to_string(),
                expected: "non-negative float",
            });
        }
        if config.max_sequence_length == 0 || config.max_sequence_length > i64::MAX as u64 {
            return Err(ConfigError::InvalidValue {
                key: "SETPOINT_MAX_SEQUENCE_LENGTH".to_string(),
                value: config.max_sequence_length.to_string(),
                expected: "positive integer",
            });
        }
        if !(config.max > config.min && config.min.is_finite() && config.max.is_finite()) {
            return Err(ConfigError::InvalidBounds {
                key: StateKey::SetPoint.as_str().to_string(),
                min: config.min,
                max: config.max,
            });
        }
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct SetPointGenerator {
    config: SetPointConfig,
    rng: ChaCha8Rng,
    set_point: f64,
    change_rate: f64,
    current_steps: u64,
    last_sequence_steps: u64,
}

impl SetPointGenerator {
    pub fn new(config: SetPointConfig) -> Self {
        let set_point = (config.min + config.max) / 2.0;
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(0),
            set_point,
            change_rate: 0.0,
            current_steps: 0,
            last_sequence_steps: 0,
        }
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        Ok(Self::new(SetPointConfig::from_properties(properties)?))
    }

    fn start_sequence(&mut self) {
        self.current_steps = 0;
        self.last_sequence_steps = self.rng.gen_range(1..=self.config.max_sequence_length);
        let max_rate = self.config.max_change_rate;
        self.change_rate = if self.rng.gen_bool(FLAT_SEQUENCE_PROBABILITY) {
            0.0
        } else {
            self.rng.gen_range(-max_rate..=max_rate)
        };
    }

    fn advance(&mut self) {
        if self.current_steps >= self.last_sequence_steps {
            self.start_sequence();
        }
        self.current_steps += 1;

        let (lo, hi) = (self.config.min, self.config.max);
        let mut next = self.set_point + self.change_rate * self.config.step_size;
        if next > hi {
            next = 2.0 * hi - next;
            self.change_rate = -self.change_rate;
        } else if next < lo {
            next = 2.0 * lo - next;
            self.change_rate = -self.change_rate;
        }
        self.set_point = next.clamp(lo, hi);
    }

    fn write(&self, state: &mut MarkovState) -> Result<(), StateError> {
        state[StateKey::SetPoint] = self.set_point;
        state.set(CHANGE_RATE_KEY, self.change_rate)?;
        state.set(CURRENT_STEPS_KEY, self.current_steps as f64)?;
        state.set(LAST_SEQUENCE_STEPS_KEY, self.last_sequence_steps as f64)
    }
}

fn steps_from(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

impl ExternalDriver for SetPointGenerator {
    fn state_keys(&self) -> Vec<String> {
        [
            StateKey::SetPoint.as_str(),
            CHANGE_RATE_KEY,
            CURRENT_STEPS_KEY,
            LAST_SEQUENCE_STEPS_KEY,
        ]
        .iter()
        .map(|k| k.to_string())
        .collect()
    }

    fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    fn filter(&mut self, state: &mut MarkovState) -> Result<(), StateError> {
        if !self.config.stationary {
            self.advance();
        }
        self.write(state)
    }

    fn set_configuration(&mut self, state: &MarkovState) -> Result<(), StateError> {
        self.set_point = state[StateKey::SetPoint];
        self.change_rate = state.get(CHANGE_RATE_KEY)?;
        self.current_steps = steps_from(state.get(CURRENT_STEPS_KEY)?);
        self.last_sequence_steps = steps_from(state.get(LAST_SEQUENCE_STEPS_KEY)?);
        Ok(())
    }
}
