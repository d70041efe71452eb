// src/miscalibration/goldstone.rs
//
// Goldstone miscalibration environment.
//
// The hidden regime is a phase index `phi` in [-K, K] (K = number_steps / 2),
// a domain (which side of the safe zone the control last left through) and a
// system response. Pushing the control outside the safe zone rotates the
// phase; while the response is advantageous the rotation follows the control,
// after the phase hits ±K the response turns disadvantageous and the optimum
// keeps running away. Returning into the safe zone walks the phase back to
// zero and resets the regime.

use thiserror::Error;

use super::penalty::PenaltyLandscape;
use super::MiscalibrationModel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GoldstoneError {
    #[error("number of steps must be a positive even number, got {0}")]
    InvalidStepCount(usize),
    #[error("safe zone must be non-negative and finite, got {0}")]
    InvalidSafeZone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Negative,
    Initial,
    Positive,
}

impl Domain {
    pub fn value(self) -> i32 {
        match self {
            Domain::Negative => -1,
            Domain::Initial => 0,
            Domain::Positive => 1,
        }
    }

    pub fn from_value(value: f64) -> Self {
        if value < 0.0 {
            Domain::Negative
        } else if value > 0.0 {
            Domain::Positive
        } else {
            Domain::Initial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemResponse {
    Advantageous,
    Disadvantageous,
}

impl SystemResponse {
    pub fn value(self) -> i32 {
        match self {
            SystemResponse::Advantageous => 1,
            SystemResponse::Disadvantageous => -1,
        }
    }

    pub fn from_value(value: f64) -> Self {
        if value < 0.0 {
            SystemResponse::Disadvantageous
        } else {
            SystemResponse::Advantageous
        }
    }
}

fn sign(x: f64) -> i32 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct GoldstoneEnvironment {
    strongest_penalty_abs_idx: i32,
    safe_zone: f64,
    /// Landscapes for phi = -K..=K.
    landscapes: Vec<PenaltyLandscape>,
    control_position: f64,
    domain: Domain,
    system_response: SystemResponse,
    phi_idx: i32,
}

impl GoldstoneEnvironment {
    pub fn new(
        number_steps: usize,
        max_required_step: f64,
        safe_zone: f64,
    ) -> Result<Self, GoldstoneError> {
        if number_steps == 0 || number_steps % 2 != 0 {
            return Err(GoldstoneError::InvalidStepCount(number_steps));
        }
        if !(safe_zone.is_finite() && safe_zone >= 0.0) {
            return Err(GoldstoneError::InvalidSafeZone(safe_zone.to_string()));
        }
        let k = (number_steps / 2) as i32;
        let landscapes = (-k..=k)
            .map(|idx| PenaltyLandscape::new(Self::angle(idx, k), max_required_step))
            .collect();

        Ok(Self {
            strongest_penalty_abs_idx: k,
            safe_zone,
            landscapes,
            control_position: 0.0,
            domain: Domain::Initial,
            system_response: SystemResponse::Advantageous,
            phi_idx: 0,
        })
    }

    fn angle(phi_idx: i32, k: i32) -> f64 {
        phi_idx as f64 * std::f64::consts::PI / (2.0 * k as f64)
    }

    pub fn regime(&self) -> (Domain, SystemResponse, i32) {
        (self.domain, self.system_response, self.phi_idx)
    }

    fn in_safe_zone(&self, position: f64) -> bool {
        position.abs() <= self.safe_zone
    }

    fn next_domain(&self, position: f64) -> Domain {
        if self.in_safe_zone(position) {
            self.domain
        } else {
            Domain::from_value(position)
        }
    }

    fn angular_step(&self, position: f64) -> i32 {
        if self.in_safe_zone(position) {
            return -self.phi_idx.signum();
        }
        if self.phi_idx == -self.domain.value() * self.strongest_penalty_abs_idx {
            return 0;
        }
        self.system_response.value() * sign(position)
    }

    /// Mirror indices beyond ±K back into range.
    fn apply_symmetry(&self, phi_idx: i32) -> i32 {
        let k = self.strongest_penalty_abs_idx;
        if phi_idx.abs() < k {
            return phi_idx;
        }
        let wrapped = (phi_idx + 4 * k).rem_euclid(4 * k);
        2 * k - wrapped
    }

    fn transition(&mut self, position: f64) {
        let previous = self.domain;
        self.domain = self.next_domain(position);
        if self.domain != previous {
            self.system_response = SystemResponse::Advantageous;
        }

        let phi = self.phi_idx + self.angular_step(position);
        if phi.abs() >= self.strongest_penalty_abs_idx {
            self.system_response = SystemResponse::Disadvantageous;
        }
        self.phi_idx = self.apply_symmetry(phi);

        if self.phi_idx == 0 && self.in_safe_zone(position) {
            self.domain = Domain::Initial;
            self.system_response = SystemResponse::Advantageous;
        }
    }

    fn landscape(&self) -> &PenaltyLandscape {
        let offset = (self.phi_idx + self.strongest_penalty_abs_idx) as usize;
        &self.landscapes[offset]
    }
}

impl MiscalibrationModel for GoldstoneEnvironment {
    fn set_control_position(&mut self, position: f64) {
        self.control_position = position;
        self.transition(position);
    }

    fn reward(&self) -> f64 {
        self.landscape().reward(self.control_position)
    }

    fn domain(&self) -> f64 {
        self.domain.value() as f64
    }

    fn set_domain(&mut self, domain: f64) {
        self.domain = Domain::from_value(domain);
    }

    fn system_response(&self) -> f64 {
        self.system_response.value() as f64
    }

    fn set_system_response(&mut self, response: f64) {
        self.system_response = SystemResponse::from_value(response);
    }

    fn phi_idx(&self) -> f64 {
        self.phi_idx as f64
    }

    fn set_phi_idx(&mut self, phi_idx: f64) {
        let k = self.strongest_penalty_abs_idx;
        let rounded = if phi_idx.is_finite() {
            phi_idx.round().clamp(-(k as f64), k as f64) as i32
        } else {
            0
        };
        self.phi_idx = rounded;
    }
}
