use std::f64::consts::TAU;

use kurbo::Point;

use crate::error::{TrochiaError, TrochiaResult};

/// No-slip rolling contact between a fixed circle of radius `R` and a rolling
/// circle of radius `r`, with a pen point at distance `d` from the rolling
/// center.
///
/// Orbit convention, fixed crate-wide: the rolling circle orbits the fixed
/// circle counterclockwise and therefore spins clockwise about its own
/// center, because it rolls on the *outside*.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RollingContact {
    pub fixed_radius: f64,   // R
    pub rolling_radius: f64, // r
    pub pen_offset: f64,     // d; d == r is the cusped epicycloid case
}

/// Pose of the rolling circle at one instant, fully determined by theta.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RollState {
    pub center: Point,
    pub self_rotation: f64,
    pub theta: f64,
    pub alpha: f64,
}

impl RollingContact {
    pub fn new(fixed_radius: f64, rolling_radius: f64, pen_offset: f64) -> TrochiaResult<Self> {
        if !fixed_radius.is_finite() || fixed_radius <= 0.0 {
            return Err(TrochiaError::configuration(
                "fixed circle radius R must be finite and > 0",
            ));
        }
        if !rolling_radius.is_finite() || rolling_radius <= 0.0 {
            return Err(TrochiaError::configuration(
                "rolling circle radius r must be finite and > 0",
            ));
        }
        if !pen_offset.is_finite() || pen_offset < 0.0 {
            return Err(TrochiaError::configuration(
                "pen offset d must be finite and >= 0",
            ));
        }
        Ok(Self {
            fixed_radius,
            rolling_radius,
            pen_offset,
        })
    }

    /// Rolling-circle center at fraction 0.
    pub fn start_center(&self) -> Point {
        Point::new(self.fixed_radius + self.rolling_radius, 0.0)
    }

    /// Pose after `theta_fraction` of a full revolution of the orbit angle.
    ///
    /// Pure: the result depends only on the input, never on call history, so
    /// scrubbing or replaying a beat is deterministic. The input is not
    /// wrapped or clamped; multiple turns and negative values are valid, and
    /// the signed angles keep the direction of travel.
    ///
    /// `alpha` is the contact-arc angle on the rolling circle. It includes
    /// the extra rotation contributed by the orbital motion of the rolling
    /// center, hence the (R+r)/r factor rather than a bare R/r.
    pub fn advance(&self, theta_fraction: f64) -> RollState {
        let theta = theta_fraction * TAU;
        let orbit = self.fixed_radius + self.rolling_radius;
        let center = Point::new(orbit * theta.cos(), orbit * theta.sin());
        let self_rotation = -theta;
        let alpha = theta * orbit / self.rolling_radius;
        RollState {
            center,
            self_rotation,
            theta,
            alpha,
        }
    }

    /// The epitrochoid point traced by the pen at orbit angle `theta`:
    ///
    /// x = (R+r)·cos θ − d·cos((R+r)/r · θ)
    /// y = (R+r)·sin θ − d·sin((R+r)/r · θ)
    pub fn pen_point(&self, theta: f64) -> Point {
        let orbit = self.fixed_radius + self.rolling_radius;
        let k = orbit / self.rolling_radius;
        Point::new(
            orbit * theta.cos() - self.pen_offset * (k * theta).cos(),
            orbit * theta.sin() - self.pen_offset * (k * theta).sin(),
        )
    }
}
