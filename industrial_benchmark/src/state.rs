// src/state.rs
//
// Markovian state of the benchmark.
//
// The state is a typed record:
// - a fixed set of dynamics variables addressed by `StateKey`
// - one lag slot per convolution weight (`OPERATIONALCOST_<i>`)
// - an extension map for keys contributed by external drivers
// - the persisted random seed (`RandomSeed`)
//
// The key set is fixed once an engine is configured. String lookups are
// still supported for harnesses and configuration, and fail with
// `StateError::UnknownKey` for anything outside the key set.

use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ConfigError, Properties};

/// Prefix of the per-lag operational cost keys.
pub const OPERATIONAL_COST_PREFIX: &str = "OPERATIONALCOST_";

/// Name of the persisted seed key.
pub const RANDOM_SEED_KEY: &str = "RandomSeed";

/// Errors raised by state lookups and restores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("unknown state key {0:?}")]
    UnknownKey(String),

    #[error("snapshot does not match the configured key set: {0}")]
    ShapeMismatch(String),
}

/// Fixed dynamics variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKey {
    SetPoint,
    Velocity,
    Gain,
    Shift,
    EffectiveShift,
    Fatigue,
    FatigueBase,
    FatigueLatentVelocity,
    FatigueLatentGain,
    EffectiveActionVelocityAlpha,
    EffectiveActionGainBeta,
    MisCalibration,
    MisCalibrationDomain,
    MisCalibrationSystemResponse,
    MisCalibrationPhiIdx,
    Consumption,
    CurrentOperationalCost,
    OperationalCostsConv,
    RewardTotal,
    RewardConsumption,
    RewardFatigue,
}

impl StateKey {
    pub const COUNT: usize = 21;

    pub const ALL: [StateKey; StateKey::COUNT] = [
        StateKey::SetPoint,
        StateKey::Velocity,
        StateKey::Gain,
        StateKey::Shift,
        StateKey::EffectiveShift,
        StateKey::Fatigue,
        StateKey::FatigueBase,
        StateKey::FatigueLatentVelocity,
        StateKey::FatigueLatentGain,
        StateKey::EffectiveActionVelocityAlpha,
        StateKey::EffectiveActionGainBeta,
        StateKey::MisCalibration,
        StateKey::MisCalibrationDomain,
        StateKey::MisCalibrationSystemResponse,
        StateKey::MisCalibrationPhiIdx,
        StateKey::Consumption,
        StateKey::CurrentOperationalCost,
        StateKey::OperationalCostsConv,
        StateKey::RewardTotal,
        StateKey::RewardConsumption,
        StateKey::RewardFatigue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateKey::SetPoint => "SetPoint",
            StateKey::Velocity => "Velocity",
            StateKey::Gain => "Gain",
            StateKey::Shift => "Shift",
            StateKey::EffectiveShift => "EffectiveShift",
            StateKey::Fatigue => "Fatigue",
            StateKey::FatigueBase => "FatigueBase",
            StateKey::FatigueLatentVelocity => "FatigueLatentVelocity",
            StateKey::FatigueLatentGain => "FatigueLatentGain",
            StateKey::EffectiveActionVelocityAlpha => "EffectiveActionVelocityAlpha",
            StateKey::EffectiveActionGainBeta => "EffectiveActionGainBeta",
            StateKey::MisCalibration => "MisCalibration",
            StateKey::MisCalibrationDomain => "MisCalibrationDomain",
            StateKey::MisCalibrationSystemResponse => "MisCalibrationSystemResponse",
            StateKey::MisCalibrationPhiIdx => "MisCalibrationPhiIdx",
            StateKey::Consumption => "Consumption",
            StateKey::CurrentOperationalCost => "CurrentOperationalCost",
            StateKey::OperationalCostsConv => "OperationalCostsConv",
            StateKey::RewardTotal => "RewardTotal",
            StateKey::RewardConsumption => "RewardConsumption",
            StateKey::RewardFatigue => "RewardFatigue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        StateKey::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Name of the `i`-th operational cost lag.
pub fn operational_cost_key(lag: usize) -> String {
    format!("{OPERATIONAL_COST_PREFIX}{lag}")
}

/// Full internal state. Cloning yields an independent snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovState {
    values: [f64; StateKey::COUNT],
    operational_costs: Vec<f64>,
    extensions: BTreeMap<String, f64>,
    random_seed: u64,
}

impl MarkovState {
    /// A zeroed state with `lags` cost lag slots and the given driver keys.
    /// Driver keys that collide with built-in keys are skipped.
    pub fn new<I, S>(lags: usize, extension_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let extensions = extension_keys
            .into_iter()
            .map(Into::into)
            .filter(|k| !is_builtin_key(k, lags))
            .map(|k| (k, 0.0))
            .collect();
        Self {
            values: [0.0; StateKey::COUNT],
            operational_costs: vec![0.0; lags],
            extensions,
            random_seed: 0,
        }
    }

    pub fn get(&self, name: &str) -> Result<f64, StateError> {
        if let Some(key) = StateKey::from_name(name) {
            return Ok(self[key]);
        }
        if name == RANDOM_SEED_KEY {
            return Ok(f64::from_bits(self.random_seed));
        }
        if let Some(lag) = self.lag_index(name) {
            return Ok(self.operational_costs[lag]);
        }
        self.extensions
            .get(name)
            .copied()
            .ok_or_else(|| StateError::UnknownKey(name.to_string()))
    }

    pub fn set(&mut self, name: &str, value: f64) -> Result<(), StateError> {
        if let Some(key) = StateKey::from_name(name) {
            self[key] = value;
            return Ok(());
        }
        if name == RANDOM_SEED_KEY {
            self.random_seed = value.to_bits();
            return Ok(());
        }
        if let Some(lag) = self.lag_index(name) {
            self.operational_costs[lag] = value;
            return Ok(());
        }
        match self.extensions.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(StateError::UnknownKey(name.to_string())),
        }
    }

    /// All keys: fixed variables, the seed, cost lags, then driver keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = StateKey::ALL
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();
        keys.push(RANDOM_SEED_KEY.to_string());
        keys.extend((0..self.operational_costs.len()).map(operational_cost_key));
        keys.extend(self.extensions.keys().cloned());
        keys
    }

    pub fn contains_key(&self, name: &str) -> bool {
        StateKey::from_name(name).is_some()
            || name == RANDOM_SEED_KEY
            || self.lag_index(name).is_some()
            || self.extensions.contains_key(name)
    }

    /// Persisted seed for the next step.
    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn set_random_seed(&mut self, seed: u64) {
        self.random_seed = seed;
    }

    /// Operational cost lags, oldest first.
    pub fn operational_costs(&self) -> &[f64] {
        &self.operational_costs
    }

    pub fn set_operational_costs(&mut self, costs: impl IntoIterator<Item = f64>) {
        for (slot, cost) in self.operational_costs.iter_mut().zip(costs) {
            *slot = cost;
        }
    }

    pub fn extension_keys(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    /// Whether `other` has exactly the same key set.
    pub fn same_shape(&self, other: &MarkovState) -> bool {
        self.operational_costs.len() == other.operational_costs.len()
            && self.extensions.keys().eq(other.extensions.keys())
    }

    /// Copy every value of `other` into this state.
    pub fn import(&mut self, other: &MarkovState) -> Result<(), StateError> {
        if self.same_shape(other) {
            self.clone_from(other);
            return Ok(());
        }
        if self.operational_costs.len() != other.operational_costs.len() {
            return Err(StateError::ShapeMismatch(format!(
                "expected {} operational cost lags, snapshot has {}",
                self.operational_costs.len(),
                other.operational_costs.len()
            )));
        }
        if let Some(key) = other
            .extensions
            .keys()
            .find(|k| !self.extensions.contains_key(*k))
        {
            return Err(StateError::UnknownKey(key.clone()));
        }
        if let Some(key) = self
            .extensions
            .keys()
            .find(|k| !other.extensions.contains_key(*k))
        {
            return Err(StateError::ShapeMismatch(format!("snapshot lacks key {key:?}")));
        }
        Err(StateError::ShapeMismatch(
            "extension keys differ from snapshot".to_string(),
        ))
    }

    /// Replace every NaN value (the seed excepted) with zero.
    pub fn zero_nan_values(&mut self) {
        let values = self
            .values
            .iter_mut()
            .chain(self.operational_costs.iter_mut())
            .chain(self.extensions.values_mut());
        for v in values {
            if v.is_nan() {
                *v = 0.0;
            }
        }
    }

    fn lag_index(&self, name: &str) -> Option<usize> {
        name.strip_prefix(OPERATIONAL_COST_PREFIX)
            .and_then(|idx| idx.parse::<usize>().ok())
            .filter(|idx| *idx < self.operational_costs.len())
    }
}

fn is_builtin_key(name: &str, lags: usize) -> bool {
    StateKey::from_name(name).is_some()
        || name == RANDOM_SEED_KEY
        || name
            .strip_prefix(OPERATIONAL_COST_PREFIX)
            .and_then(|idx| idx.parse::<usize>().ok())
            .is_some_and(|idx| idx < lags)
}

impl Index<StateKey> for MarkovState {
    type Output = f64;

    fn index(&self, key: StateKey) -> &f64 {
        &self.values[key.index()]
    }
}

impl IndexMut<StateKey> for MarkovState {
    fn index_mut(&mut self, key: StateKey) -> &mut f64 {
        &mut self.values[key.index()]
    }
}

/// Lower and upper variable bounds, shaped like the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: MarkovState,
    pub max: MarkovState,
}

impl Bounds {
    /// Read `<KEY>_INIT`, `<KEY>_MIN`, `<KEY>_MAX` for every key of
    /// `template` (defaults 0, -inf, +inf). Returns the bounds and the
    /// initial state.
    pub fn load(
        properties: &Properties,
        template: &MarkovState,
    ) -> Result<(Bounds, MarkovState), ConfigError> {
        let mut min = template.clone();
        let mut max = template.clone();
        let mut init = template.clone();

        for key in template.keys() {
            if key == RANDOM_SEED_KEY {
                continue;
            }
            let v_init = properties.f64_or(&format!("{key}_INIT"), 0.0)?;
            let v_max = properties.f64_or(&format!("{key}_MAX"), f64::INFINITY)?;
            let v_min = properties.f64_or(&format!("{key}_MIN"), f64::NEG_INFINITY)?;
            if !(v_max > v_min) {
                return Err(ConfigError::InvalidBounds {
                    key,
                    min: v_min,
                    max: v_max,
                });
            }
            if !(v_init >= v_min && v_init <= v_max) {
                return Err(ConfigError::InitOutOfBounds {
                    key,
                    init: v_init,
                    min: v_min,
                    max: v_max,
                });
            }
            min.set(&key, v_min)?;
            max.set(&key, v_max)?;
            init.set(&key, v_init)?;
        }

        Ok((Bounds { min, max }, init))
    }

    pub fn range(&self, key: StateKey) -> (f64, f64) {
        (self.min[key], self.max[key])
    }
}

/// Externally visible subset of the state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservableState {
    pub set_point: f64,
    pub velocity: f64,
    pub gain: f64,
    pub shift: f64,
    pub fatigue: f64,
    pub consumption: f64,
    pub reward_total: f64,
    pub reward_consumption: f64,
    pub reward_fatigue: f64,
}

impl ObservableState {
    /// Projected keys, in vector order.
    pub const KEYS: [StateKey; 9] = [
        StateKey::SetPoint,
        StateKey::Velocity,
        StateKey::Gain,
        StateKey::Shift,
        StateKey::Fatigue,
        StateKey::Consumption,
        StateKey::RewardTotal,
        StateKey::RewardConsumption,
        StateKey::RewardFatigue,
    ];

    pub fn from_markov(state: &MarkovState) -> Self {
        Self {
            set_point: state[StateKey::SetPoint],
            velocity: state[StateKey::Velocity],
            gain: state[StateKey::Gain],
            shift: state[StateKey::Shift],
            fatigue: state[StateKey::Fatigue],
            consumption: state[StateKey::Consumption],
            reward_total: state[StateKey::RewardTotal],
            reward_consumption: state[StateKey::RewardConsumption],
            reward_fatigue: state[StateKey::RewardFatigue],
        }
    }

    pub fn get(&self, name: &str) -> Result<f64, StateError> {
        match StateKey::from_name(name) {
            Some(StateKey::SetPoint) => Ok(self.set_point),
            Some(StateKey::Velocity) => Ok(self.velocity),
            Some(StateKey::Gain) => Ok(self.gain),
            Some(StateKey::Shift) => Ok(self.shift),
            Some(StateKey::Fatigue) => Ok(self.fatigue),
            Some(StateKey::Consumption) => Ok(self.consumption),
            Some(StateKey::RewardTotal) => Ok(self.reward_total),
            Some(StateKey::RewardConsumption) => Ok(self.reward_consumption),
            Some(StateKey::RewardFatigue) => Ok(self.reward_fatigue),
            _ => Err(StateError::UnknownKey(name.to_string())),
        }
    }

    pub fn keys() -> impl Iterator<Item = &'static str> {
        Self::KEYS.iter().map(|k| k.as_str())
    }

    /// Flat feature vector in `KEYS` order.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.set_point,
            self.velocity,
            self.gain,
            self.shift,
            self.fatigue,
            self.consumption,
            self.reward_total,
            self.reward_consumption,
            self.reward_fatigue,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> MarkovState {
        MarkovState::new(3, ["SetPoint", "DriverRate"])
    }

    #[test]
    fn key_set_is_fixed() {
        let state = sample_state();
        let keys = state.keys();
        assert_eq!(keys.len(), StateKey::COUNT + 1 + 3 + 1);
        assert!(keys.contains(&"OPERATIONALCOST_2".to_string()));
        assert!(keys.contains(&"DriverRate".to_string()));
        // built-in names are not duplicated by driver keys
        assert_eq!(keys.iter().filter(|k| *k == "SetPoint").count(), 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut state = sample_state();
        assert_eq!(
            state.get("NoSuchKey"),
            Err(StateError::UnknownKey("NoSuchKey".to_string()))
        );
        assert!(state.set("OPERATIONALCOST_3", 1.0).is_err());
        assert!(state.get("OPERATIONALCOST_x").is_err());
    }

    #[test]
    fn named_and_typed_access_agree() {
        let mut state = sample_state();
        state.set("Velocity", 12.5).unwrap();
        assert_eq!(state[StateKey::Velocity], 12.5);
        state[StateKey::Gain] = 3.0;
        assert_eq!(state.get("Gain").unwrap(), 3.0);
        state.set("OPERATIONALCOST_1", 9.0).unwrap();
        assert_eq!(state.operational_costs(), &[0.0, 9.0, 0.0]);
        state.set("DriverRate", -0.5).unwrap();
        assert_eq!(state.get("DriverRate").unwrap(), -0.5);
    }

    #[test]
    fn seed_round_trips_through_float_encoding() {
        let mut state = sample_state();
        let seed = 0x7ff8_0000_0000_0001_u64; // NaN bit pattern
        state.set_random_seed(seed);
        let encoded = state.get(RANDOM_SEED_KEY).unwrap();
        let mut other = sample_state();
        other.set(RANDOM_SEED_KEY, encoded).unwrap();
        assert_eq!(other.random_seed(), seed);
    }

    #[test]
    fn clone_is_independent() {
        let mut state = sample_state();
        let snapshot = state.clone();
        state[StateKey::Fatigue] = 1.0;
        assert_eq!(snapshot[StateKey::Fatigue], 0.0);
    }

    #[test]
    fn import_checks_shape() {
        let mut state = sample_state();
        let other = MarkovState::new(2, ["DriverRate"]);
        assert!(matches!(
            state.import(&other),
            Err(StateError::ShapeMismatch(_))
        ));
        let foreign = MarkovState::new(3, ["Other"]);
        assert_eq!(
            state.import(&foreign),
            Err(StateError::UnknownKey("Other".to_string()))
        );
        assert!(!state.same_shape(&other));
        assert!(!state.same_shape(&foreign));
        let mut same = sample_state();
        same[StateKey::Shift] = 42.0;
        assert!(state.same_shape(&same));
        state.import(&same).unwrap();
        assert_eq!(state[StateKey::Shift], 42.0);
    }

    #[test]
    fn nan_values_are_zeroed() {
        let mut state = sample_state();
        state[StateKey::SetPoint] = f64::NAN;
        state.set("DriverRate", f64::NAN).unwrap();
        state.zero_nan_values();
        assert_eq!(state[StateKey::SetPoint], 0.0);
        assert_eq!(state.get("DriverRate").unwrap(), 0.0);
    }

    #[test]
    fn bounds_load_defaults_and_validation() {
        let template = sample_state();
        let mut props = Properties::new();
        props.set("Velocity_INIT", "50");
        props.set("Velocity_MIN", "0");
        props.set("Velocity_MAX", "100");
        let (bounds, init) = Bounds::load(&props, &template).unwrap();
        assert_eq!(init[StateKey::Velocity], 50.0);
        assert_eq!(bounds.range(StateKey::Velocity), (0.0, 100.0));
        assert_eq!(
            bounds.range(StateKey::Gain),
            (f64::NEG_INFINITY, f64::INFINITY)
        );

        props.set("Velocity_MAX", "0");
        assert!(matches!(
            Bounds::load(&props, &template),
            Err(ConfigError::InvalidBounds { .. })
        ));

        props.set("Velocity_MAX", "100");
        props.set("Velocity_INIT", "150");
        assert!(matches!(
            Bounds::load(&props, &template),
            Err(ConfigError::InitOutOfBounds { .. })
        ));
    }

    #[test]
    fn bounds_load_writes_lag_and_driver_keys() {
        let template = sample_state();
        let mut props = Properties::new();
        props.set("OPERATIONALCOST_0_INIT", "7");
        props.set("DriverRate_MIN", "-1");
        props.set("DriverRate_MAX", "1");
        props.set("DriverRate_INIT", "0.25");
        let (bounds, init) = Bounds::load(&props, &template).unwrap();
        assert_eq!(init.get("OPERATIONALCOST_0").unwrap(), 7.0);
        assert_eq!(init.get("OPERATIONALCOST_1").unwrap(), 0.0);
        assert_eq!(init.get("DriverRate").unwrap(), 0.25);
        assert_eq!(bounds.min.get("DriverRate").unwrap(), -1.0);
        assert_eq!(bounds.max.get("DriverRate").unwrap(), 1.0);
    }

    #[test]
    fn state_errors_convert_into_config_errors() {
        let err: ConfigError = StateError::UnknownKey("Nope".to_string()).into();
        assert_eq!(err, ConfigError::State(StateError::UnknownKey("Nope".to_string())));
    }

    #[test]
    fn observable_projection_copies_values() {
        let mut state = sample_state();
        state[StateKey::Consumption] = 4.0;
        state[StateKey::RewardTotal] = -7.0;
        let obs = ObservableState::from_markov(&state);
        assert_eq!(obs.consumption, 4.0);
        assert_eq!(obs.get("RewardTotal").unwrap(), -7.0);
        assert!(obs.get("FatigueBase").is_err());
        assert_eq!(obs.to_vec().len(), ObservableState::keys().count());
    }
}
