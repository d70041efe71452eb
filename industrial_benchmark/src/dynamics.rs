// src/dynamics.rs
//
// Industrial benchmark dynamics engine.
//
// One step:
// 1) reseed the stream from the persisted seed, run every external driver
// 2) fold the action into velocity / gain / shift
// 3) fatigue, current operational cost, cost convolution
// 4) miscalibration at the new effective shift
// 5) noisy consumption, reward
// 6) draw and persist the seed for the next step
//
// Because the stream is reseeded at the start of every step, the Markov state
// (which carries the seed) is a complete description of the engine: restoring
// a snapshot reproduces the exact continuation.

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::action::{Action, ActionNormalizer};
use crate::config::{ConfigError, DynamicsConfig, Properties};
use crate::cost_history::{operational_cost, CostHistory};
use crate::drivers::{ExternalDriver, SetPointGenerator};
use crate::fatigue;
use crate::miscalibration::{GoldstoneError, MiscalibrationAdapter};
use crate::reward::{IndustrialBenchmarkReward, RewardFunction};
use crate::rng::RandomStream;
use crate::state::{Bounds, MarkovState, ObservableState, StateError, StateKey};

/// Consumption noise grows by this fraction of the hidden consumption.
const CONSUMPTION_NOISE_SLOPE: f64 = 0.005;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DynamicsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Miscalibration(#[from] GoldstoneError),
}

#[derive(Debug)]
pub struct IndustrialBenchmarkDynamics {
    config: DynamicsConfig,
    normalizer: ActionNormalizer,
    drivers: Vec<Box<dyn ExternalDriver>>,
    miscalibration: MiscalibrationAdapter,
    reward_function: Box<dyn RewardFunction>,
    stream: RandomStream,
    seed: u64,
    state: MarkovState,
    bounds: Bounds,
    history: CostHistory,
}

impl IndustrialBenchmarkDynamics {
    /// Engine with the default setpoint driver, Goldstone miscalibration and
    /// benchmark reward.
    pub fn new(properties: Properties) -> Result<Self, DynamicsError> {
        let config = DynamicsConfig::from_properties(properties)?;
        let setpoint = SetPointGenerator::from_properties(&config.properties)?;
        Self::with_drivers(config, vec![Box::new(setpoint)])
    }

    /// Engine with an explicit driver list (may be empty).
    pub fn with_drivers(
        config: DynamicsConfig,
        drivers: Vec<Box<dyn ExternalDriver>>,
    ) -> Result<Self, DynamicsError> {
        let reward = IndustrialBenchmarkReward::from_properties(&config.properties)?;
        Self::with_components(
            config,
            drivers,
            MiscalibrationAdapter::goldstone()?,
            Box::new(reward),
        )
    }

    pub fn with_components(
        config: DynamicsConfig,
        drivers: Vec<Box<dyn ExternalDriver>>,
        miscalibration: MiscalibrationAdapter,
        reward_function: Box<dyn RewardFunction>,
    ) -> Result<Self, DynamicsError> {
        let lags = config.conv_weights.len();
        let template = MarkovState::new(lags, Vec::<String>::new());
        let mut engine = Self {
            normalizer: ActionNormalizer::new(config.step_size_velocity, config.step_size_gain),
            history: CostHistory::new(config.conv_weights.clone()),
            bounds: Bounds {
                min: template.clone(),
                max: template.clone(),
            },
            state: template,
            config,
            drivers,
            miscalibration,
            reward_function,
            stream: RandomStream::new(0),
            seed: 0,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Rebuild bounds, initial values, seed, drivers and cost history, then
    /// run the bootstrap zero step.
    fn initialize(&mut self) -> Result<(), DynamicsError> {
        let (bounds, state) = self.initial_conditions()?;
        self.bounds = bounds;
        self.state = state;
        self.history = CostHistory::new(self.config.conv_weights.clone());
        self.miscalibration.restore(&self.state);

        debug!(
            seed = self.seed,
            keys = self.state.keys().len(),
            history_len = self.history.len(),
            "initialized dynamics"
        );

        self.step(&Action::zero())?;
        Ok(())
    }

    fn initial_conditions(&mut self) -> Result<(Bounds, MarkovState), DynamicsError> {
        let mut driver_keys: Vec<String> = Vec::new();
        for key in self.drivers.iter().flat_map(|d| d.state_keys()) {
            if !driver_keys.contains(&key) {
                driver_keys.push(key);
            }
        }
        let template = MarkovState::new(self.config.conv_weights.len(), driver_keys);
        let (bounds, mut state) = Bounds::load(&self.config.properties, &template)?;

        self.seed = self.config.resolve_seed();
        self.stream.reseed(self.seed);
        state.set_random_seed(self.seed);

        for driver in self.drivers.iter_mut() {
            driver.set_configuration(&state)?;
            driver.set_seed(self.stream.next_long());
            driver.filter(&mut state)?;
        }
        state.zero_nan_values();

        Ok((bounds, state))
    }

    /// Apply one action and return RewardTotal.
    pub fn step(&mut self, action: &Action) -> Result<f64, DynamicsError> {
        self.stream.reseed(self.seed);
        for driver in self.drivers.iter_mut() {
            driver.set_seed(self.stream.next_long());
            driver.filter(&mut self.state)?;
        }

        self.normalizer.apply(action, &mut self.state, &self.bounds);

        if let Err(err) = self.update_fatigue_and_cost() {
            warn!(error = %err, "step continues with stale fatigue and cost");
        }
        self.history.write_to(&mut self.state);

        self.miscalibration.update(&mut self.state);
        self.update_consumption();
        self.reward_function.calc_reward(&mut self.state);

        self.seed = self.stream.next_long();
        self.state.set_random_seed(self.seed);

        let reward = self.state[StateKey::RewardTotal];
        trace!(
            reward,
            consumption = self.state[StateKey::Consumption],
            fatigue = self.state[StateKey::Fatigue],
            "step"
        );
        Ok(reward)
    }

    fn update_fatigue_and_cost(&mut self) -> Result<(), ConfigError> {
        fatigue::update_fatigue(&mut self.state, &mut self.stream, &self.config)?;
        let cost = operational_cost(&self.state, &self.config)?;
        self.state[StateKey::CurrentOperationalCost] = cost;
        self.history.push(cost);
        Ok(())
    }

    fn update_consumption(&mut self) {
        let hidden = self.state[StateKey::OperationalCostsConv]
            - self.config.crgs * (self.state[StateKey::MisCalibration] - 1.0);
        let noise = self.stream.gaussian(0.0, 1.0);
        self.state[StateKey::Consumption] =
            hidden - noise * (1.0 + CONSUMPTION_NOISE_SLOPE * hidden);
    }

    /// Re-initialize as if freshly constructed.
    pub fn reset(&mut self) -> Result<(), DynamicsError> {
        self.initialize()?;
        info!(seed = self.seed, "dynamics reset");
        Ok(())
    }

    pub fn observable_state(&self) -> ObservableState {
        ObservableState::from_markov(&self.state)
    }

    /// Independent copy of the full state.
    pub fn markov_state(&self) -> MarkovState {
        self.state.clone()
    }

    /// Restore a snapshot taken with `markov_state`.
    ///
    /// The snapshot must have the engine's key set. The seed, miscalibration
    /// regime, cost buffer and driver states are all re-derived from it, and
    /// the convolution and reward are recomputed.
    pub fn set_markov_state(&mut self, snapshot: &MarkovState) -> Result<(), DynamicsError> {
        self.state.import(snapshot)?;
        self.seed = self.state.random_seed();
        self.miscalibration.restore(&self.state);

        self.history.restore(self.state.operational_costs());
        self.state[StateKey::OperationalCostsConv] = self.history.convolve();
        self.reward_function.calc_reward(&mut self.state);

        for driver in self.drivers.iter_mut() {
            driver.set_configuration(&self.state)?;
        }
        info!(seed = self.seed, "restored markov state");
        Ok(())
    }

    pub fn reward(&self) -> f64 {
        self.state[StateKey::RewardTotal]
    }

    /// Length of the operational cost history, current cost included.
    pub fn operational_costs_history_len(&self) -> usize {
        self.history.len()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn config(&self) -> &DynamicsConfig {
        &self.config
    }

    /// Seed the next step will reseed the stream with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::setpoint::CHANGE_RATE_KEY;

    fn props(seed: u64) -> Properties {
        let mut p = Properties::benchmark_defaults();
        p.set("SEED", seed);
        p
    }

    #[test]
    fn construction_runs_bootstrap_step() {
        let engine = IndustrialBenchmarkDynamics::new(props(1)).unwrap();
        assert_eq!(engine.operational_costs_history_len(), 10);
        let state = engine.markov_state();
        let cost = state[StateKey::CurrentOperationalCost];
        assert!(cost > 0.0);
        assert!(state.operational_costs().iter().all(|c| *c == cost));
        assert_eq!(engine.reward(), state[StateKey::RewardTotal]);
        assert!(state.contains_key(CHANGE_RATE_KEY));
    }

    #[test]
    fn missing_required_key_fails_construction() {
        let mut p = props(1);
        p.remove("CRGS");
        assert_eq!(
            IndustrialBenchmarkDynamics::new(p).unwrap_err(),
            DynamicsError::Config(ConfigError::MissingKey("CRGS".to_string()))
        );
    }

    #[test]
    fn invalid_bounds_fail_construction() {
        let mut p = props(1);
        p.set("Velocity_MIN", 100);
        p.set("Velocity_MAX", 0);
        assert!(matches!(
            IndustrialBenchmarkDynamics::new(p),
            Err(DynamicsError::Config(ConfigError::InvalidBounds { .. }))
        ));
    }

    #[test]
    fn missing_lazy_constant_is_lenient() {
        let mut p = props(3);
        p.remove("DBase");
        let mut engine = IndustrialBenchmarkDynamics::new(p).unwrap();
        for _ in 0..5 {
            assert!(engine.step(&Action::delta(1.0, 1.0, 1.0)).is_ok());
        }
        let state = engine.markov_state();
        assert_eq!(state[StateKey::Fatigue], 0.0);
        assert_eq!(state[StateKey::CurrentOperationalCost], 0.0);
        assert!(state[StateKey::RewardTotal].is_finite());
    }

    #[test]
    fn seed_advances_every_step() {
        let mut engine = IndustrialBenchmarkDynamics::new(props(11)).unwrap();
        let before = engine.seed();
        engine.step(&Action::zero()).unwrap();
        assert_ne!(engine.seed(), before);
        let state = engine.markov_state();
        assert_eq!(state.random_seed(), engine.seed());
        assert_eq!(
            state.get("RandomSeed").unwrap().to_bits(),
            engine.seed()
        );
    }

    #[test]
    fn restore_rejects_foreign_shape() {
        let mut engine = IndustrialBenchmarkDynamics::new(props(1)).unwrap();
        let foreign = MarkovState::new(3, Vec::<String>::new());
        assert!(matches!(
            engine.set_markov_state(&foreign),
            Err(DynamicsError::State(StateError::ShapeMismatch(_)))
        ));
    }

    #[test]
    fn engine_without_drivers_keeps_initial_setpoint() {
        let config = DynamicsConfig::from_properties(props(4)).unwrap();
        let mut engine = IndustrialBenchmarkDynamics::with_drivers(config, Vec::new()).unwrap();
        for _ in 0..20 {
            engine.step(&Action::delta(0.5, -0.5, 1.0)).unwrap();
        }
        assert_eq!(engine.observable_state().set_point, 50.0);
    }
}
