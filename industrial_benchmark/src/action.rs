// src/action.rs
//
// Control actions and their integration into the state.
//
// - Action: delta command or absolute (target) command
// - ActionNormalizer: rate-limited, bounded integration of an action into
//   velocity / gain / shift, plus the derived effective shift
// - EffectiveAction: how hard velocity and gain are pushed relative to the
//   current setpoint, normalized to [0, 1]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::{Bounds, MarkovState, StateKey};

/// Half-width of the effective shift range.
pub const GS_BOUND: f64 = 1.5;

/// Coupling of the effective shift to the setpoint.
pub const GS_SET_POINT_DEPENDENCY: f64 = 0.02;

/// sin(15°): largest step the miscalibration optimum requires.
pub const MAX_REQUIRED_STEP: f64 = 0.258_819_045_102_520_76;

/// Scale from shift in [0, 100] to the effective shift range.
pub const GS_SCALE: f64 = 2.0 * GS_BOUND + 100.0 * GS_SET_POINT_DEPENDENCY;

/// Per-step shift change for a unit action.
pub const SHIFT_STEP: f64 = (MAX_REQUIRED_STEP / 0.9) * 100.0 / GS_SCALE;

pub const SHIFT_MIN: f64 = 0.0;
pub const SHIFT_MAX: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{kind:?} action expects {expected} values, got {got}")]
    Arity {
        kind: ActionKind,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Delta,
    Absolute,
}

/// Signed changes, scaled by the configured step sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionDelta {
    pub delta_velocity: f64,
    pub delta_gain: f64,
    pub delta_shift: f64,
}

impl ActionDelta {
    pub const FIELD_NAMES: [&'static str; 3] = ["DeltaVelocity", "DeltaGain", "DeltaShift"];

    pub fn new(delta_velocity: f64, delta_gain: f64, delta_shift: f64) -> Self {
        Self {
            delta_velocity,
            delta_gain,
            delta_shift,
        }
    }
}

/// Target values, approached at most one step size per step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionAbsolute {
    pub velocity: f64,
    pub gain: f64,
    pub shift: f64,
}

impl ActionAbsolute {
    pub const FIELD_NAMES: [&'static str; 3] = ["Velocity", "Gain", "Shift"];

    pub fn new(velocity: f64, gain: f64, shift: f64) -> Self {
        Self {
            velocity,
            gain,
            shift,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Delta(ActionDelta),
    Absolute(ActionAbsolute),
}

impl Action {
    /// The zero delta action (no change).
    pub fn zero() -> Self {
        Action::Delta(ActionDelta::default())
    }

    pub fn delta(delta_velocity: f64, delta_gain: f64, delta_shift: f64) -> Self {
        Action::Delta(ActionDelta::new(delta_velocity, delta_gain, delta_shift))
    }

    pub fn absolute(velocity: f64, gain: f64, shift: f64) -> Self {
        Action::Absolute(ActionAbsolute::new(velocity, gain, shift))
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Delta(_) => ActionKind::Delta,
            Action::Absolute(_) => ActionKind::Absolute,
        }
    }

    pub fn field_names(kind: ActionKind) -> [&'static str; 3] {
        match kind {
            ActionKind::Delta => ActionDelta::FIELD_NAMES,
            ActionKind::Absolute => ActionAbsolute::FIELD_NAMES,
        }
    }

    /// Build an action from a flat `[velocity, gain, shift]` vector.
    pub fn from_values(kind: ActionKind, values: &[f64]) -> Result<Self, ActionError> {
        let [v, g, s] = values else {
            return Err(ActionError::Arity {
                kind,
                expected: 3,
                got: values.len(),
            });
        };
        Ok(match kind {
            ActionKind::Delta => Action::delta(*v, *g, *s),
            ActionKind::Absolute => Action::absolute(*v, *g, *s),
        })
    }

    pub fn to_values(&self) -> [f64; 3] {
        match self {
            Action::Delta(d) => [d.delta_velocity, d.delta_gain, d.delta_shift],
            Action::Absolute(a) => [a.velocity, a.gain, a.shift],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Delta(f64),
    Target(f64),
}

fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// One rate-limited, bounded integration step.
fn integrate(current: f64, command: Command, step: f64, lo: f64, hi: f64) -> f64 {
    let next = match command {
        Command::Delta(delta) => current + delta * step,
        Command::Target(target) => current + clip(target - current, -step, step),
    };
    clip(next, lo, hi)
}

/// Effective shift seen by the miscalibration model for a shift and setpoint.
pub fn effective_shift(shift: f64, set_point: f64) -> f64 {
    clip(
        GS_SCALE * shift / 100.0 - GS_SET_POINT_DEPENDENCY * set_point - GS_BOUND,
        -GS_BOUND,
        GS_BOUND,
    )
}

/// Folds actions into the velocity / gain / shift variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionNormalizer {
    pub step_size_velocity: f64,
    pub step_size_gain: f64,
}

impl ActionNormalizer {
    pub fn new(step_size_velocity: f64, step_size_gain: f64) -> Self {
        Self {
            step_size_velocity,
            step_size_gain,
        }
    }

    /// Apply `action`, writing Velocity, Gain, Shift and EffectiveShift.
    pub fn apply(&self, action: &Action, state: &mut MarkovState, bounds: &Bounds) {
        let (cv, cg, cs) = match action {
            Action::Delta(d) => (
                Command::Delta(d.delta_velocity),
                Command::Delta(d.delta_gain),
                Command::Delta(d.delta_shift),
            ),
            Action::Absolute(a) => (
                Command::Target(a.velocity),
                Command::Target(a.gain),
                Command::Target(a.shift),
            ),
        };

        let (v_min, v_max) = bounds.range(StateKey::Velocity);
        let (g_min, g_max) = bounds.range(StateKey::Gain);

        let velocity = integrate(
            state[StateKey::Velocity],
            cv,
            self.step_size_velocity,
            v_min,
            v_max,
        );
        let gain = integrate(state[StateKey::Gain], cg, self.step_size_gain, g_min, g_max);
        let shift = integrate(state[StateKey::Shift], cs, SHIFT_STEP, SHIFT_MIN, SHIFT_MAX);

        state[StateKey::Velocity] = velocity;
        state[StateKey::Gain] = gain;
        state[StateKey::Shift] = shift;
        state[StateKey::EffectiveShift] = effective_shift(shift, state[StateKey::SetPoint]);
    }
}

/// Normalized actuator load relative to the setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveAction {
    velocity_alpha: f64,
    gain_beta: f64,
}

impl EffectiveAction {
    pub fn new(velocity: f64, gain: f64, set_point: f64) -> Self {
        Self {
            velocity_alpha: Self::alpha(velocity, gain, set_point),
            gain_beta: Self::beta(gain, set_point),
        }
    }

    pub fn velocity_alpha(&self) -> f64 {
        self.velocity_alpha
    }

    pub fn gain_beta(&self) -> f64 {
        self.gain_beta
    }

    fn effective_gain(gain: f64, set_point: f64) -> f64 {
        gain + set_point + 1.0
    }

    fn alpha_unscaled(velocity: f64, effective_gain: f64) -> f64 {
        (velocity + 101.0) / effective_gain
    }

    fn alpha(velocity: f64, gain: f64, set_point: f64) -> f64 {
        let lo = Self::alpha_unscaled(0.0, Self::effective_gain(100.0, set_point));
        let hi = Self::alpha_unscaled(100.0, Self::effective_gain(0.0, set_point));
        let raw = Self::alpha_unscaled(velocity, Self::effective_gain(gain, set_point));
        clip((raw - lo) / (hi - lo), 0.0, 1.0)
    }

    fn beta(gain: f64, set_point: f64) -> f64 {
        let lo = Self::effective_gain(0.0, set_point);
        let hi = Self::effective_gain(100.0, set_point);
        let raw = Self::effective_gain(gain, set_point);
        clip((raw - lo) / (hi - lo), 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Properties;

    fn bounded_state() -> (MarkovState, Bounds) {
        let mut props = Properties::new();
        for key in ["Velocity", "Gain", "Shift"] {
            props.set(format!("{key}_INIT"), 50);
            props.set(format!("{key}_MIN"), 0);
            props.set(format!("{key}_MAX"), 100);
        }
        props.set("SetPoint_INIT", 50);
        let template = MarkovState::new(1, Vec::<String>::new());
        let (bounds, state) = Bounds::load(&props, &template).unwrap();
        (state, bounds)
    }

    #[test]
    fn shift_constants() {
        assert_eq!(GS_SCALE, 5.0);
        assert!((MAX_REQUIRED_STEP - (15.0f64).to_radians().sin()).abs() < 1e-15);
        assert!((SHIFT_STEP - MAX_REQUIRED_STEP / 0.9 * 20.0).abs() < 1e-12);
    }

    #[test]
    fn delta_action_scales_by_step_size() {
        let (mut state, bounds) = bounded_state();
        let normalizer = ActionNormalizer::new(1.0, 10.0);
        normalizer.apply(&Action::delta(1.0, -0.5, 1.0), &mut state, &bounds);
        assert_eq!(state[StateKey::Velocity], 51.0);
        assert_eq!(state[StateKey::Gain], 45.0);
        assert!((state[StateKey::Shift] - (50.0 + SHIFT_STEP)).abs() < 1e-12);
    }

    #[test]
    fn maximal_delta_saturates_at_bounds() {
        let (mut state, bounds) = bounded_state();
        let normalizer = ActionNormalizer::new(1.0, 10.0);
        for _ in 0..200 {
            normalizer.apply(&Action::delta(1.0, 1.0, 1.0), &mut state, &bounds);
            assert!(state[StateKey::Velocity] <= 100.0);
            assert!(state[StateKey::Gain] <= 100.0);
            assert!(state[StateKey::Shift] <= SHIFT_MAX);
        }
        assert_eq!(state[StateKey::Velocity], 100.0);
        assert_eq!(state[StateKey::Gain], 100.0);
        assert_eq!(state[StateKey::Shift], SHIFT_MAX);

        for _ in 0..200 {
            normalizer.apply(&Action::delta(-1.0, -1.0, -1.0), &mut state, &bounds);
        }
        assert_eq!(state[StateKey::Velocity], 0.0);
        assert_eq!(state[StateKey::Gain], 0.0);
        assert_eq!(state[StateKey::Shift], SHIFT_MIN);
    }

    #[test]
    fn absolute_action_is_rate_limited() {
        let (mut state, bounds) = bounded_state();
        let normalizer = ActionNormalizer::new(1.0, 10.0);
        normalizer.apply(&Action::absolute(100.0, 0.0, 100.0), &mut state, &bounds);
        assert_eq!(state[StateKey::Velocity], 51.0);
        assert_eq!(state[StateKey::Gain], 40.0);
        assert!((state[StateKey::Shift] - (50.0 + SHIFT_STEP)).abs() < 1e-12);

        // small requested jumps are reached exactly
        normalizer.apply(&Action::absolute(51.5, 42.0, 50.0), &mut state, &bounds);
        assert_eq!(state[StateKey::Velocity], 51.5);
        assert_eq!(state[StateKey::Gain], 42.0);
        assert_eq!(state[StateKey::Shift], 50.0);
    }

    #[test]
    fn effective_shift_couples_to_setpoint() {
        assert_eq!(effective_shift(50.0, 50.0), 2.5 - 1.0 - 1.5);
        assert_eq!(effective_shift(100.0, 0.0), GS_BOUND);
        assert_eq!(effective_shift(0.0, 100.0), -GS_BOUND);
    }

    #[test]
    fn effective_action_is_normalized() {
        for &(v, g, p) in &[
            (0.0, 0.0, 0.0),
            (100.0, 0.0, 0.0),
            (0.0, 100.0, 100.0),
            (50.0, 50.0, 50.0),
            (100.0, 100.0, 100.0),
        ] {
            let eff = EffectiveAction::new(v, g, p);
            assert!((0.0..=1.0).contains(&eff.velocity_alpha()));
            assert!((0.0..=1.0).contains(&eff.gain_beta()));
        }
        assert_eq!(EffectiveAction::new(100.0, 0.0, 30.0).velocity_alpha(), 1.0);
        assert_eq!(EffectiveAction::new(0.0, 100.0, 30.0).velocity_alpha(), 0.0);
        assert_eq!(EffectiveAction::new(0.0, 0.0, 30.0).gain_beta(), 0.0);
        assert_eq!(EffectiveAction::new(0.0, 100.0, 30.0).gain_beta(), 1.0);
    }

    #[test]
    fn actions_from_flat_values() {
        let action = Action::from_values(ActionKind::Absolute, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(action, Action::absolute(1.0, 2.0, 3.0));
        assert_eq!(action.to_values(), [1.0, 2.0, 3.0]);
        assert_eq!(
            Action::from_values(ActionKind::Delta, &[1.0]),
            Err(ActionError::Arity {
                kind: ActionKind::Delta,
                expected: 3,
                got: 1
            })
        );
        assert_eq!(Action::field_names(ActionKind::Delta)[0], "DeltaVelocity");
    }
}
