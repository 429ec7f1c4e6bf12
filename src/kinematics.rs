//! Kinematic observables of candidate sequences.
//!
//! Angles come in two flavors: geometric (from site positions) and
//! kinematic (from the Compton formula with measured energies). Their
//! difference is the main discriminator between good and bad orderings.
//! Energy-based cosines return 2.0 when the formula is undefined, which lies
//! outside every physical range and lands in the overflow region of the
//! response axes after clamping.

use crate::geometry::{GeometryService, Position};

/// Electron rest energy, keV.
pub const ELECTRON_REST_ENERGY: f64 = 511.004;

/// Value returned by energy-based cosines when a denominator vanishes.
pub const UNDEFINED_COSINE: f64 = 2.0;

/// Value returned by degree variants outside the physical range.
pub const UNDEFINED_ANGLE_HIGH_DEG: f64 = 180.5;
pub const UNDEFINED_ANGLE_LOW_DEG: f64 = -0.5;

/// Angle between two vectors in radians; 0 if either has zero length.
#[must_use]
pub fn angle_between(a: &Position, b: &Position) -> f64 {
    let norm = a.norm() * b.norm();
    if norm == 0.0 {
        return 0.0;
    }
    (a.dot(b) / norm).clamp(-1.0, 1.0).acos()
}

/// Cosine of the scatter angle at `central` from positions alone.
#[must_use]
pub fn cos_phi_geometric(start: &Position, central: &Position, stop: &Position) -> f64 {
    angle_between(&(central - start), &(stop - central)).cos()
}

/// Cosine of the Compton scatter angle for a deposit `e_dep` out of a photon
/// energy `e_tot`.
#[must_use]
pub fn cos_phi_energy(e_dep: f64, e_tot: f64) -> f64 {
    if e_tot - e_dep == 0.0 || e_tot == 0.0 {
        return UNDEFINED_COSINE;
    }
    1.0 - ELECTRON_REST_ENERGY / (e_tot - e_dep) + ELECTRON_REST_ENERGY / e_tot
}

/// Kinematic minus geometric cosine of the scatter angle at `central`.
#[must_use]
pub fn delta_cos_phi(start: &Position, central: &Position, stop: &Position, e_dep: f64, e_tot: f64) -> f64 {
    if e_tot - e_dep == 0.0 || e_tot == 0.0 {
        return UNDEFINED_COSINE;
    }
    cos_phi_energy(e_dep, e_tot) - cos_phi_geometric(start, central, stop)
}

/// Kinematic scatter angle in degrees.
#[must_use]
pub fn phi_energy_deg(e_dep: f64, e_tot: f64) -> f64 {
    if e_tot - e_dep == 0.0 || e_tot == 0.0 {
        return UNDEFINED_ANGLE_HIGH_DEG;
    }
    let cos = cos_phi_energy(e_dep, e_tot);
    if cos > 1.0 {
        UNDEFINED_ANGLE_HIGH_DEG
    } else if cos < -1.0 {
        UNDEFINED_ANGLE_LOW_DEG
    } else {
        cos.acos().to_degrees()
    }
}

/// Geometric scatter angle in degrees.
#[must_use]
pub fn phi_geometric_deg(start: &Position, central: &Position, stop: &Position) -> f64 {
    angle_between(&(central - start), &(stop - central)).to_degrees()
}

/// Absolute difference of the kinematic and geometric scatter angles in
/// degrees, capped at 180.5.
#[must_use]
pub fn delta_phi_deg(start: &Position, central: &Position, stop: &Position, e_dep: f64, e_tot: f64) -> f64 {
    if e_tot - e_dep == 0.0 || e_tot == 0.0 {
        return UNDEFINED_ANGLE_HIGH_DEG;
    }
    let geometric = phi_geometric_deg(start, central, stop);
    let cos = cos_phi_energy(e_dep, e_tot);
    if !(-1.0..=1.0).contains(&cos) {
        return if geometric > 180.0 {
            UNDEFINED_ANGLE_HIGH_DEG
        } else {
            UNDEFINED_ANGLE_LOW_DEG
        };
    }
    let value = (geometric - cos.acos().to_degrees()).abs();
    if value > 180.0 {
        UNDEFINED_ANGLE_HIGH_DEG
    } else {
        value
    }
}

/// Smallest of the three pairwise distances.
#[must_use]
pub fn min_lever_arm(start: &Position, central: &Position, stop: &Position) -> f64 {
    (start - central)
        .norm()
        .min((stop - central).norm())
        .min((stop - start).norm())
}

/// Cosine of the angle between a recoil electron track and the scattered
/// photon, from the track energy `e_track` and the photon energy `e_tot`
/// before the scatter.
#[must_use]
pub fn cos_alpha_energy(e_track: f64, e_tot: f64) -> f64 {
    let e_gamma = e_tot - e_track;
    (e_track * (e_gamma - ELECTRON_REST_ENERGY))
        / (e_gamma * (e_track * (e_track + 2.0 * ELECTRON_REST_ENERGY)).sqrt())
}

/// Cosine of the angle between the track direction and the direction from
/// the track to the next site.
#[must_use]
pub fn cos_alpha_geometric(track: &Position, direction: &Position, next: &Position) -> f64 {
    angle_between(&(next - track), direction).cos()
}

/// Kinematic minus geometric track angle cosine.
#[must_use]
pub fn delta_cos_alpha(track: &Position, direction: &Position, next: &Position, e_track: f64, e_tot: f64) -> f64 {
    cos_alpha_energy(e_track, e_tot) - cos_alpha_geometric(track, direction, next)
}

/// Kinematic track angle in degrees; 180.5 outside the physical range.
#[must_use]
pub fn alpha_energy_deg(e_track: f64, e_tot: f64) -> f64 {
    let cos = cos_alpha_energy(e_track, e_tot);
    if (-1.0..=1.0).contains(&cos) {
        cos.acos().to_degrees()
    } else {
        UNDEFINED_ANGLE_HIGH_DEG
    }
}

/// Probability that a photon of `energy` travels from `from` to `to`
/// without interacting on the way.
#[must_use]
pub fn reach_probability(geometry: &dyn GeometryService, from: &Position, to: &Position, energy: f64) -> f64 {
    (1.0 - geometry.pair_absorption_probability(from, to, energy))
        * (1.0 - geometry.compton_absorption_probability(from, to, energy))
        * (1.0 - geometry.photo_absorption_probability(from, to, energy))
}

/// Pulls cosine-like values just inside `±limit` so that they never land on
/// or beyond an outer axis edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosineClamp {
    limit: f64,
}

impl CosineClamp {
    /// Fraction of the limit that clamped values are moved to.
    pub const INSET: f64 = 0.99;

    #[must_use]
    pub const fn new(limit: f64) -> Self {
        Self { limit }
    }

    #[must_use]
    pub const fn limit(&self) -> f64 {
        self.limit
    }

    /// Clamp `value` into `(-limit, limit)`.
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        if value <= -self.limit {
            -Self::INSET * self.limit
        } else if value >= self.limit {
            Self::INSET * self.limit
        } else {
            value
        }
    }
}
