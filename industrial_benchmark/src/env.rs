// src/env.rs
//
// Gym-style wrappers around the dynamics.
// - StepResult: observation and reward of one step
// - VecEnv: N independent engines from one configuration, seeded SEED + i

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::config::{DynamicsConfig, Properties};
use crate::dynamics::{DynamicsError, IndustrialBenchmarkDynamics};
use crate::state::ObservableState;

/// Result of a single environment step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// The observation after taking the action.
    pub observation: ObservableState,
    pub reward: f64,
}

impl StepResult {
    pub fn from_engine(engine: &IndustrialBenchmarkDynamics, reward: f64) -> Self {
        Self {
            observation: engine.observable_state(),
            reward,
        }
    }
}

/// Vectorised environments for batched rollouts.
#[derive(Debug)]
pub struct VecEnv {
    envs: Vec<IndustrialBenchmarkDynamics>,
}

impl VecEnv {
    /// Build `n` engines. Engine `i` is seeded with `SEED + i`; without a
    /// configured SEED a single wall-clock base seed is drawn for the batch.
    pub fn new(n: usize, properties: &Properties) -> Result<Self, DynamicsError> {
        let base_seed = DynamicsConfig::from_properties(properties.clone())?.resolve_seed();
        let envs = (0..n)
            .map(|i| {
                let mut props = properties.clone();
                props.set("SEED", base_seed.wrapping_add(i as u64));
                IndustrialBenchmarkDynamics::new(props)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { envs })
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    pub fn env(&self, idx: usize) -> Option<&IndustrialBenchmarkDynamics> {
        self.envs.get(idx)
    }

    /// Reset every engine to its configured initial conditions.
    pub fn reset_all(&mut self) -> Result<Vec<ObservableState>, DynamicsError> {
        self.envs
            .iter_mut()
            .map(|env| {
                env.reset()?;
                Ok(env.observable_state())
            })
            .collect()
    }

    /// Step all environments with the given actions.
    ///
    /// Actions must have the same length as envs.
    pub fn step(&mut self, actions: &[Action]) -> Result<Vec<StepResult>, DynamicsError> {
        assert_eq!(
            actions.len(),
            self.envs.len(),
            "expected one action per environment"
        );
        self.envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| {
                let reward = env.step(action)?;
                Ok(StepResult::from_engine(env, reward))
            })
            .collect()
    }

    pub fn observations(&self) -> Vec<ObservableState> {
        self.envs.iter().map(|e| e.observable_state()).collect()
    }
}
