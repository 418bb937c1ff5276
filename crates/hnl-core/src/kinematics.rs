//! Angular separations and four-momentum arithmetic.

use std::f64::consts::PI;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Azimuthal difference `phi1 - phi2` wrapped to `(-π, π]`.
///
/// Non-finite differences are returned unchanged.
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let d = phi1 - phi2;
    if !d.is_finite() || (d > -PI && d <= PI) {
        return d;
    }
    let wrapped = (d + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// Angular distance `sqrt(Δη² + ΔΦ²)`.
pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    let deta = eta1 - eta2;
    let dphi = delta_phi(phi1, phi2);
    (deta * deta + dphi * dphi).sqrt()
}

/// Anything with a direction and a four-momentum.
pub trait Kinematics {
    /// Transverse momentum (GeV)
    fn pt(&self) -> f64;
    /// Pseudorapidity
    fn eta(&self) -> f64;
    /// Azimuthal angle
    fn phi(&self) -> f64;
    /// Invariant mass (GeV)
    fn mass(&self) -> f64;

    /// Four-momentum built from `(pt, eta, phi, mass)`.
    fn p4(&self) -> LorentzVector {
        LorentzVector::from_pt_eta_phi_m(self.pt(), self.eta(), self.phi(), self.mass())
    }

    /// Signed `phi(self) - phi(other)` wrapped to `(-π, π]`.
    fn delta_phi_to<K: Kinematics + ?Sized>(&self, other: &K) -> f64 {
        delta_phi(self.phi(), other.phi())
    }

    /// ΔR between two objects.
    fn delta_r_to<K: Kinematics + ?Sized>(&self, other: &K) -> f64 {
        delta_r(self.eta(), self.phi(), other.eta(), other.phi())
    }
}

/// Compact `(pt, eta, phi, mass)` record as stored in the event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PtEtaPhiM {
    /// Transverse momentum
    pub pt: f64,
    /// Pseudorapidity
    pub eta: f64,
    /// Azimuthal angle
    pub phi: f64,
    /// Mass
    #[serde(default)]
    pub mass: f64,
}

impl Kinematics for PtEtaPhiM {
    fn pt(&self) -> f64 {
        self.pt
    }
    fn eta(&self) -> f64 {
        self.eta
    }
    fn phi(&self) -> f64 {
        self.phi
    }
    fn mass(&self) -> f64 {
        self.mass
    }
}

/// Cartesian four-vector `(px, py, pz, E)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LorentzVector {
    /// x momentum
    pub px: f64,
    /// y momentum
    pub py: f64,
    /// z momentum
    pub pz: f64,
    /// Energy
    pub e: f64,
}

impl LorentzVector {
    /// Build from collider coordinates.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        let pt = pt.abs();
        let px = pt * phi.cos();
        let py = pt * phi.sin();
        let pz = pt * eta.sinh();
        let p2 = px * px + py * py + pz * pz;
        let e = if mass >= 0.0 {
            (p2 + mass * mass).sqrt()
        } else {
            (p2 - mass * mass).max(0.0).sqrt()
        };
        Self { px, py, pz, e }
    }

    /// Transverse momentum
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Invariant mass; negative for space-like vectors (`-sqrt(-m²)`).
    pub fn m(&self) -> f64 {
        let m2 = self.e * self.e - (self.px * self.px + self.py * self.py + self.pz * self.pz);
        if m2 < 0.0 { -(-m2).sqrt() } else { m2.sqrt() }
    }
}

impl Add for LorentzVector {
    type Output = LorentzVector;

    fn add(self, rhs: LorentzVector) -> LorentzVector {
        LorentzVector {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e: self.e + rhs.e,
        }
    }
}

impl Sub for LorentzVector {
    type Output = LorentzVector;

    fn sub(self, rhs: LorentzVector) -> LorentzVector {
        LorentzVector {
            px: self.px - rhs.px,
            py: self.py - rhs.py,
            pz: self.pz - rhs.pz,
            e: self.e - rhs.e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_delta_phi_wraps() {
        assert_abs_diff_eq!(delta_phi(3.0, -3.0), 6.0 - 2.0 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(delta_phi(-3.0, 3.0), 2.0 * PI - 6.0, epsilon = 1e-12);
        // -π maps to +π
        assert_abs_diff_eq!(delta_phi(0.0, PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(delta_phi(0.3, 0.1), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_delta_phi_huge_difference_terminates() {
        let d = delta_phi(1e17, 0.0);
        assert!(d > -PI && d <= PI, "got {d}");
        let d = delta_phi(-3.0e20, 2.5);
        assert!(d > -PI && d <= PI, "got {d}");
        assert_abs_diff_eq!(delta_phi(5.0 + 4.0 * PI, 0.0), 5.0 - 2.0 * PI, epsilon = 1e-9);
    }

    #[test]
    fn test_delta_phi_non_finite_passthrough() {
        assert!(delta_phi(f64::NAN, 0.0).is_nan());
        assert!(delta_phi(0.0, f64::NAN).is_nan());
        assert_eq!(delta_phi(f64::INFINITY, 0.0), f64::INFINITY);
        assert!(delta_r(0.0, f64::NAN, 0.0, 0.0).is_nan());
    }

    #[test]
    fn test_delta_r() {
        assert_abs_diff_eq!(delta_r(1.0, 0.0, 1.0, 0.0001), 0.0001, epsilon = 1e-12);
        assert_abs_diff_eq!(delta_r(0.0, 0.0, 3.0, 4.0 - 2.0 * PI), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_back_to_back_mass() {
        let a = LorentzVector::from_pt_eta_phi_m(50.0, 0.0, 0.0, 0.0);
        let b = LorentzVector::from_pt_eta_phi_m(50.0, 0.0, PI, 0.0);
        let sum = a + b;
        assert_abs_diff_eq!(sum.m(), 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sum.pt(), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!((a - b).pt(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_massive_vector() {
        let v = LorentzVector::from_pt_eta_phi_m(10.0, 1.2, -0.4, 5.0);
        assert_abs_diff_eq!(v.m(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v.pt(), 10.0, epsilon = 1e-9);
    }
}
