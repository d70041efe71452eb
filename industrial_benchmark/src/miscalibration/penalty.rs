// src/miscalibration/penalty.rs
//
// Tilted double-well penalty landscape for one phase angle.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyLandscape {
    /// |sin(phi)|, the tilt strength.
    tilt: f64,
    /// Radius of the wells.
    radius: f64,
    /// Which well carries the optimum.
    orientation: f64,
}

impl PenaltyLandscape {
    pub fn new(phi: f64, max_required_step: f64) -> Self {
        let tilt = phi.sin().abs();
        let orientation = if phi < 0.0 { -1.0 } else { 1.0 };
        Self {
            tilt,
            radius: tilt.max(max_required_step),
            orientation,
        }
    }

    pub fn penalty(&self, x: f64) -> f64 {
        let r2 = self.radius * self.radius;
        let well = x * x - r2;
        let offset = x - self.orientation * self.radius;
        well * well + 0.5 * self.tilt * offset * offset
    }

    pub fn reward(&self, x: f64) -> f64 {
        1.0 - self.penalty(x)
    }

    /// Location of the global optimum.
    pub fn optimum(&self) -> f64 {
        self.orientation * self.radius
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}
