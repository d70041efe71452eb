// src/cost_history.rs
//
// Operational cost model and its causal FIR smoothing.
//
// The instantaneous cost is an exponential in setpoint, gain and velocity.
// Costs are kept in a fixed-capacity ring buffer (capacity = number of
// convolution weights) and smoothed as `Σ weight[i] * buffer[i]`, oldest
// first. The first cost pushed into a fresh buffer fills every slot.

use std::collections::VecDeque;

use crate::config::{ConfigError, Constant, DynamicsConfig};
use crate::state::{MarkovState, StateKey};

/// Instantaneous operational cost for the current state.
pub fn operational_cost(state: &MarkovState, config: &DynamicsConfig) -> Result<f64, ConfigError> {
    let c_set_point = config.constant(Constant::CostSetPoint)?;
    let c_gain = config.constant(Constant::CostGain)?;
    let c_velocity = config.constant(Constant::CostVelocity)?;
    let costs = c_set_point * state[StateKey::SetPoint]
        + c_gain * state[StateKey::Gain]
        + c_velocity * state[StateKey::Velocity];
    Ok((costs / 100.0).exp())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostHistory {
    weights: Vec<f64>,
    buffer: VecDeque<f64>,
    bootstrapped: bool,
}

impl CostHistory {
    /// A zero-filled buffer with one slot per weight.
    pub fn new(weights: Vec<f64>) -> Self {
        let buffer = VecDeque::from(vec![0.0; weights.len()]);
        Self {
            weights,
            buffer,
            bootstrapped: false,
        }
    }

    /// Record a cost, evicting the oldest one. The first push replicates the
    /// cost across the whole buffer.
    pub fn push(&mut self, cost: f64) {
        if self.buffer.is_empty() {
            return;
        }
        if !self.bootstrapped {
            self.buffer.iter_mut().for_each(|slot| *slot = cost);
            self.bootstrapped = true;
            return;
        }
        self.buffer.pop_front();
        self.buffer.push_back(cost);
    }

    /// Weighted sum over the buffer, oldest to newest.
    pub fn convolve(&self) -> f64 {
        self.weights
            .iter()
            .zip(self.buffer.iter())
            .fold(0.0, |acc, (w, c)| acc + w * c)
    }

    /// Replace the buffer contents, oldest first.
    pub fn restore(&mut self, costs: &[f64]) {
        for (slot, cost) in self.buffer.iter_mut().zip(costs) {
            *slot = *cost;
        }
        self.bootstrapped = true;
    }

    /// Write every lag into its `OPERATIONALCOST_<i>` key and the convolution
    /// into OperationalCostsConv.
    pub fn write_to(&self, state: &mut MarkovState) {
        state.set_operational_costs(self.buffer.iter().copied());
        state[StateKey::OperationalCostsConv] = self.convolve();
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.buffer.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }
}
