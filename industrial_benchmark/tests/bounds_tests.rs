// tests/bounds_tests.rs
//
// Control variables stay inside their bounds and move at most one step size
// per step, whatever the action.


use ib_testkit::{action_sequence, engine};
use industrial_benchmark::action::{GS_BOUND, SHIFT_STEP};
use industrial_benchmark::{Action, StateKey};

const EPS: f64 = 1e-9;

#[test]
fn controls_stay_within_bounds() {
    let mut e = engine(31);
    for action in action_sequence(17, 500) {
        e.step(&action).unwrap();
        let s = e.markov_state();
        for key in [StateKey::Velocity, StateKey::Gain, StateKey::Shift] {
            assert!((0.0..=100.0).contains(&s[key]), "{key:?} = {}", s[key]);
        }
        assert!(s[StateKey::EffectiveShift].abs() <= GS_BOUND);
        assert!((0.0..=100.0).contains(&s[StateKey::SetPoint]));
    }
}

#[test]
fn absolute_actions_are_rate_limited() {
    let mut e = engine(8);
    let step_velocity = e.config().step_size_velocity;
    let step_gain = e.config().step_size_gain;

    for target in [100.0, 0.0, 73.0, -50.0, 150.0] {
        for _ in 0..30 {
            let before = e.markov_state();
            e.step(&Action::absolute(target, target, target)).unwrap();
            let after = e.markov_state();
            let dv = (after[StateKey::Velocity] - before[StateKey::Velocity]).abs();
            let dg = (after[StateKey::Gain] - before[StateKey::Gain]).abs();
            let ds = (after[StateKey::Shift] - before[StateKey::Shift]).abs();
            assert!(dv <= step_velocity + EPS);
            assert!(dg <= step_gain + EPS);
            assert!(ds <= SHIFT_STEP + EPS);
        }
    }
}

#[test]
fn absolute_target_is_reached_and_held() {
    let mut e = engine(8);
    for _ in 0..60 {
        e.step(&Action::absolute(20.0, 80.0, 50.0)).unwrap();
    }
    let obs = e.observable_state();
    assert_eq!(obs.velocity, 20.0);
    assert_eq!(obs.gain, 80.0);
    assert_eq!(obs.shift, 50.0);
}

#[test]
fn delta_actions_scale_with_step_size() {
    let mut e = engine(2);
    let before = e.observable_state();
    e.step(&Action::delta(1.0, -1.0, 0.0)).unwrap();
    let after = e.observable_state();
    assert_eq!(after.velocity, before.velocity + 1.0);
    assert_eq!(after.gain, before.gain - 10.0);
    assert_eq!(after.shift, before.shift);
}
