// src/miscalibration/mod.rs
//
// Miscalibration sub-model and the adapter the dynamics talk to.
//
// The model owns a hidden regime (domain, system response, phase index) whose
// evolution is opaque to the dynamics. The adapter drives it with the
// effective shift and mirrors its outputs into the Markov state; restoring a
// snapshot pushes the mirrored regime back into the model.

pub mod goldstone;
pub mod penalty;

pub use goldstone::{Domain, GoldstoneEnvironment, GoldstoneError, SystemResponse};
pub use penalty::PenaltyLandscape;

use crate::action::MAX_REQUIRED_STEP;
use crate::state::{MarkovState, StateKey};

/// Number of phase steps of the standard miscalibration model.
pub const GOLDSTONE_STEPS: usize = 24;

/// Contract of a miscalibration model.
pub trait MiscalibrationModel: Send {
    /// Move the control to `position`, advancing the hidden regime.
    fn set_control_position(&mut self, position: f64);
    /// Reward-relevant miscalibration at the current position and regime.
    fn reward(&self) -> f64;
    fn domain(&self) -> f64;
    fn set_domain(&mut self, domain: f64);
    fn system_response(&self) -> f64;
    fn set_system_response(&mut self, response: f64);
    fn phi_idx(&self) -> f64;
    fn set_phi_idx(&mut self, phi_idx: f64);
}

/// Thin bridge between the dynamics state and a miscalibration model.
pub struct MiscalibrationAdapter {
    model: Box<dyn MiscalibrationModel>,
}

impl MiscalibrationAdapter {
    pub fn new(model: Box<dyn MiscalibrationModel>) -> Self {
        Self { model }
    }

    /// The standard Goldstone model.
    pub fn goldstone() -> Result<Self, GoldstoneError> {
        let model = GoldstoneEnvironment::new(
            GOLDSTONE_STEPS,
            MAX_REQUIRED_STEP,
            MAX_REQUIRED_STEP / 2.0,
        )?;
        Ok(Self::new(Box::new(model)))
    }

    /// Drive the model with the current EffectiveShift and record its outputs.
    pub fn update(&mut self, state: &mut MarkovState) {
        self.model
            .set_control_position(state[StateKey::EffectiveShift]);
        state[StateKey::MisCalibration] = self.model.reward();
        state[StateKey::MisCalibrationDomain] = self.model.domain();
        state[StateKey::MisCalibrationSystemResponse] = self.model.system_response();
        state[StateKey::MisCalibrationPhiIdx] = self.model.phi_idx();
    }

    /// Re-synchronize the model's hidden regime with `state`.
    pub fn restore(&mut self, state: &MarkovState) {
        self.model
            .set_control_position(state[StateKey::EffectiveShift]);
        self.model.set_domain(state[StateKey::MisCalibrationDomain]);
        self.model
            .set_system_response(state[StateKey::MisCalibrationSystemResponse]);
        self.model.set_phi_idx(state[StateKey::MisCalibrationPhiIdx]);
    }

    pub fn model(&self) -> &dyn MiscalibrationModel {
        self.model.as_ref()
    }
}

impl std::fmt::Debug for MiscalibrationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiscalibrationAdapter")
            .field("domain", &self.model.domain())
            .field("system_response", &self.model.system_response())
            .field("phi_idx", &self.model.phi_idx())
            .finish()
    }
}
