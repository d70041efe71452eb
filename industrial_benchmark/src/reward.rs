// src/reward.rs
//
// Reward computed from the full Markov state after each step.

use crate::config::{ConfigError, Properties};
use crate::state::{MarkovState, StateKey};

pub trait RewardFunction: Send + std::fmt::Debug {
    /// Write RewardTotal and its components into `state`.
    fn calc_reward(&self, state: &mut MarkovState);
}

/// `RewardTotal = -(CRC * Consumption + CRF * Fatigue)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndustrialBenchmarkReward {
    pub consumption_weight: f64,
    pub fatigue_weight: f64,
}

impl Default for IndustrialBenchmarkReward {
    fn default() -> Self {
        Self {
            consumption_weight: 1.0,
            fatigue_weight: 3.0,
        }
    }
}

impl IndustrialBenchmarkReward {
    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            consumption_weight: properties.f64_or("CRC", defaults.consumption_weight)?,
            fatigue_weight: properties.f64_or("CRF", defaults.fatigue_weight)?,
        })
    }
}

impl RewardFunction for IndustrialBenchmarkReward {
    fn calc_reward(&self, state: &mut MarkovState) {
        let consumption = state[StateKey::Consumption];
        let fatigue = state[StateKey::Fatigue];
        state[StateKey::RewardConsumption] = -consumption;
        state[StateKey::RewardFatigue] = -fatigue;
        state[StateKey::RewardTotal] =
            -(self.consumption_weight * consumption + self.fatigue_weight * fatigue);
    }
}
