// src/fatigue.rs
//
// Spiking, regime-switching fatigue process.
//
// Each actuator (velocity, gain) carries a latent fatigue variable. Under
// moderate load it follows an exponentially smoothed noise signal; once it
// crosses AMPLIFICATION_START it enters a runaway regime and grows
// geometrically up to AMPLIFICATION_MAX. Idle actuators (load within
// ACTION_TOLERANCE) reset their latent variable.
//
// Draw order (fixed, part of the reproducibility contract):
//   exp(gain), exp(velocity), uniform(gain), bernoulli(gain),
//   uniform(velocity), bernoulli(velocity), [gaussian if runaway]

use crate::action::EffectiveAction;
use crate::config::{ConfigError, Constant, DynamicsConfig};
use crate::rng::RandomStream;
use crate::state::{MarkovState, StateKey};

/// Mean of the exponential base noise.
pub const EXP_LAMBDA: f64 = 0.1;
pub const ACTION_TOLERANCE: f64 = 0.05;
pub const AMPLIFICATION: f64 = 1.1;
pub const AMPLIFICATION_MAX: f64 = 5.0;
pub const AMPLIFICATION_START: f64 = 1.2;

/// Bernoulli probabilities are kept inside the open unit interval.
const SPIKE_PROBABILITY_MIN: f64 = 0.001;
const SPIKE_PROBABILITY_MAX: f64 = 0.999;

/// Constants of the deterministic fatigue base level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FatigueConstants {
    pub d_gain: f64,
    pub d_velocity: f64,
    pub d_set_point: f64,
    pub d_base: f64,
}

impl FatigueConstants {
    pub fn load(config: &DynamicsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            d_gain: config.constant(Constant::DGain)?,
            d_velocity: config.constant(Constant::DVelocity)?,
            d_set_point: config.constant(Constant::DSetPoint)?,
            d_base: config.constant(Constant::DBase)?,
        })
    }

    /// `max(0, DBase / (DVelocity*v + DSetPoint) - DGain*g²)`
    pub fn base_level(&self, velocity: f64, gain: f64) -> f64 {
        let level = self.d_base / (self.d_velocity * velocity + self.d_set_point)
            - self.d_gain * gain * gain;
        if level < 0.0 {
            0.0
        } else {
            level
        }
    }
}

/// Logistic-squashed exponential noise in (-1, 1).
fn base_noise(stream: &mut RandomStream) -> f64 {
    2.0 * (1.0 / (1.0 + (-stream.exponential(EXP_LAMBDA)).exp()) - 0.5)
}

/// Spike contribution for an actuator with normalized load `load`.
fn spike(stream: &mut RandomStream, noise: f64, load: f64) -> f64 {
    let u = stream.uniform();
    let p = load.clamp(SPIKE_PROBABILITY_MIN, SPIKE_PROBABILITY_MAX);
    let hit = if stream.bernoulli(p) { 1.0 } else { 0.0 };
    (1.0 - noise) * u * hit * load
}

/// Advance one latent fatigue variable.
pub fn evolve_latent(latent: f64, load: f64, noise: f64) -> f64 {
    if load <= ACTION_TOLERANCE {
        return load;
    }
    if latent >= AMPLIFICATION_START {
        (latent * AMPLIFICATION).min(AMPLIFICATION_MAX)
    } else {
        latent * 0.9 + noise / 3.0
    }
}

/// Heavy-tailed observation used once a latent variable has run away.
fn runaway_noise(stream: &mut RandomStream) -> f64 {
    1.0 / (1.0 + (-4.0 * stream.gaussian(0.6, 0.1)).exp())
}

/// Advance the fatigue process one step.
///
/// Writes Fatigue, FatigueBase, both latent variables and both effective
/// action scalars. When a base-level constant is missing the random draws
/// have already been consumed and nothing is written.
pub fn update_fatigue(
    state: &mut MarkovState,
    stream: &mut RandomStream,
    config: &DynamicsConfig,
) -> Result<(), ConfigError> {
    let velocity = state[StateKey::Velocity];
    let gain = state[StateKey::Gain];
    let set_point = state[StateKey::SetPoint];

    let effective = EffectiveAction::new(velocity, gain, set_point);
    let alpha = effective.velocity_alpha();
    let beta = effective.gain_beta();

    let mut noise_gain = base_noise(stream);
    let mut noise_velocity = base_noise(stream);
    noise_gain += spike(stream, noise_gain, beta);
    noise_velocity += spike(stream, noise_velocity, alpha);

    let latent_gain = evolve_latent(state[StateKey::FatigueLatentGain], beta, noise_gain);
    let latent_velocity =
        evolve_latent(state[StateKey::FatigueLatentVelocity], alpha, noise_velocity);

    let signal = if latent_velocity.max(latent_gain) == AMPLIFICATION_MAX {
        runaway_noise(stream)
    } else {
        noise_gain.max(noise_velocity)
    };

    let base = FatigueConstants::load(config)?.base_level(velocity, gain);

    state[StateKey::Fatigue] = (2.0 * signal + 1.0) * base / 3.0;
    state[StateKey::FatigueBase] = base;
    state[StateKey::FatigueLatentVelocity] = latent_velocity;
    state[StateKey::FatigueLatentGain] = latent_gain;
    state[StateKey::EffectiveActionVelocityAlpha] = alpha;
    state[StateKey::EffectiveActionGainBeta] = beta;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Properties;

    fn config() -> DynamicsConfig {
        DynamicsConfig::from_properties(Properties::benchmark_defaults()).unwrap()
    }

    #[test]
    fn idle_actuator_resets_latent() {
        assert_eq!(evolve_latent(3.0, 0.01, 0.5), 0.01);
        assert_eq!(evolve_latent(0.7, ACTION_TOLERANCE, 0.5), ACTION_TOLERANCE);
    }

    #[test]
    fn runaway_regime_amplifies_until_cap() {
        let mut latent = AMPLIFICATION_START;
        for _ in 0..100 {
            let next = evolve_latent(latent, 0.5, 0.0);
            assert!(next >= latent);
            latent = next;
        }
        assert_eq!(latent, AMPLIFICATION_MAX);
    }

    #[test]
    fn moderate_load_smooths_noise() {
        let next = evolve_latent(0.3, 0.5, 0.6);
        assert!((next - (0.27 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn base_level_is_non_negative() {
        let c = FatigueConstants {
            d_gain: 0.01,
            d_velocity: 5.0,
            d_set_point: 20.0,
            d_base: 30.0,
        };
        assert_eq!(c.base_level(0.0, 0.0), 1.5);
        assert_eq!(c.base_level(0.0, 100.0), 0.0);
    }

    #[test]
    fn fatigue_is_bounded_by_base_level() {
        let cfg = config();
        let mut stream = RandomStream::new(5);
        let mut state = MarkovState::new(1, Vec::<String>::new());
        state[StateKey::Velocity] = 10.0;
        state[StateKey::Gain] = 5.0;
        state[StateKey::SetPoint] = 50.0;
        for _ in 0..500 {
            update_fatigue(&mut state, &mut stream, &cfg).unwrap();
            let base = state[StateKey::FatigueBase];
            let fatigue = state[StateKey::Fatigue];
            assert!(base >= 0.0);
            // signal lies in (-1, 1] so fatigue stays within [-base/3, base]
            assert!(fatigue <= base + 1e-12);
            assert!(fatigue >= -base / 3.0 - 1e-12);
            assert!(state[StateKey::FatigueLatentGain] <= AMPLIFICATION_MAX);
            assert!(state[StateKey::FatigueLatentVelocity] <= AMPLIFICATION_MAX);
        }
    }

    #[test]
    fn missing_constant_leaves_state_untouched() {
        let mut props = Properties::benchmark_defaults();
        props.remove("DBase");
        let cfg = DynamicsConfig::from_properties(props).unwrap();
        let mut stream = RandomStream::new(5);
        let mut state = MarkovState::new(1, Vec::<String>::new());
        state[StateKey::Velocity] = 50.0;
        state[StateKey::Gain] = 50.0;
        let before = state.clone();
        assert_eq!(
            update_fatigue(&mut state, &mut stream, &cfg),
            Err(ConfigError::MissingKey("DBase".to_string()))
        );
        assert_eq!(state, before);
    }
}
