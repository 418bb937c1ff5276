//! Per-event scale-factor weights.
//!
//! Per-object `(value, error)` pairs are folded into one event-level
//! [`WeightTriple`] as the running products of `value`, `value + error` and
//! `value - error`. Errors of objects in the same category are therefore
//! treated as fully correlated; this is not a quadrature combination.

use std::sync::Arc;

use hnl_calib::{CalibrationTable, ScaleFactor};
use hnl_core::{Electron, Era, Kinematics, Muon, WeightTriple};

/// Added to `|dxyErr|` before forming an impact-parameter significance.
pub const DXY_SIG_EPSILON: f64 = 1e-5;

/// Objects carrying a transverse impact parameter.
pub trait ImpactParameters: Kinematics {
    /// Transverse impact parameter
    fn dxy(&self) -> f64;
    /// Its uncertainty
    fn dxy_err(&self) -> f64;

    /// `|dxy| / (1e-5 + |dxyErr|)`
    fn dxy_significance(&self) -> f64 {
        self.dxy().abs() / (DXY_SIG_EPSILON + self.dxy_err().abs())
    }
}

impl ImpactParameters for Electron {
    fn dxy(&self) -> f64 {
        self.dxy
    }
    fn dxy_err(&self) -> f64 {
        self.dxy_err
    }
}

impl ImpactParameters for Muon {
    fn dxy(&self) -> f64 {
        self.dxy
    }
    fn dxy_err(&self) -> f64 {
        self.dxy_err
    }
}

/// Which object quantities form the `(x, y)` query of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// `(eta, pt)`
    EtaPt,
    /// `(pt, |eta|)`
    PtAbsEta,
    /// `(|dxy| / (1e-5 + |dxyErr|), pt)`
    DxySigPt,
    /// `(|dxy|, pt)`
    AbsDxyPt,
}

impl AxisOrder {
    /// Convention of the centrally provided lepton tables of an era:
    /// `(eta, pt)` for 2016, `(pt, |eta|)` afterwards.
    pub fn lepton_tables(era: Era) -> AxisOrder {
        match era {
            Era::Run2016 => AxisOrder::EtaPt,
            Era::Run2017 | Era::Run2018 => AxisOrder::PtAbsEta,
        }
    }

    /// Query coordinates for `obj`.
    pub fn coordinates<T: ImpactParameters + ?Sized>(self, obj: &T) -> (f64, f64) {
        match self {
            AxisOrder::EtaPt => (obj.eta(), obj.pt()),
            AxisOrder::PtAbsEta => (obj.pt(), obj.eta().abs()),
            AxisOrder::DxySigPt => (obj.dxy_significance(), obj.pt()),
            AxisOrder::AbsDxyPt => (obj.dxy().abs(), obj.pt()),
        }
    }
}

/// A calibration table together with the axis convention used to query it.
#[derive(Debug, Clone)]
pub struct ScaleFactorBinding {
    table: Arc<CalibrationTable>,
    axes: AxisOrder,
}

impl ScaleFactorBinding {
    /// Bind `table` with `axes`
    pub fn new(table: Arc<CalibrationTable>, axes: AxisOrder) -> Self {
        Self { table, axes }
    }

    /// Scale factor of a single object.
    pub fn scale_factor<T: ImpactParameters + ?Sized>(&self, obj: &T) -> ScaleFactor {
        let (x, y) = self.axes.coordinates(obj);
        self.table.lookup(x, y)
    }

    /// Event weight over all `objects`.
    pub fn event_weight<T: ImpactParameters>(&self, objects: &[&T]) -> WeightTriple {
        envelope_product(objects.iter().map(|o| self.scale_factor(*o)))
    }
}

/// Running products of `value`, `value + error`, `value - error`.
///
/// An empty sequence yields `(1, 1, 1)`.
pub fn envelope_product<I: IntoIterator<Item = ScaleFactor>>(factors: I) -> WeightTriple {
    factors
        .into_iter()
        .fold(WeightTriple::UNIT, |acc, sf| acc.product(sf.to_triple()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_envelope_of_two_objects() {
        let w = envelope_product([ScaleFactor::new(0.9, 0.05), ScaleFactor::new(0.95, 0.03)]);
        assert_abs_diff_eq!(w.nominal, 0.855, epsilon = 1e-12);
        assert_abs_diff_eq!(w.up, 0.95 * 0.98, epsilon = 1e-12);
        assert_abs_diff_eq!(w.down, 0.85 * 0.92, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_is_identity() {
        assert_eq!(envelope_product(std::iter::empty()), WeightTriple::UNIT);
    }

    #[test]
    fn test_down_can_exceed_nominal() {
        // two factors whose value - error is negative: the product flips sign
        let w = envelope_product([ScaleFactor::new(0.1, 0.3), ScaleFactor::new(0.1, 0.3)]);
        assert_abs_diff_eq!(w.nominal, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(w.down, 0.04, epsilon = 1e-12);
        assert!(w.down > w.nominal);
    }

    #[test]
    fn test_axis_coordinates() {
        let m = Muon { pt: 30.0, eta: -1.5, dxy: -0.02, dxy_err: 0.01, ..Default::default() };
        assert_eq!(AxisOrder::EtaPt.coordinates(&m), (-1.5, 30.0));
        assert_eq!(AxisOrder::PtAbsEta.coordinates(&m), (30.0, 1.5));
        assert_eq!(AxisOrder::AbsDxyPt.coordinates(&m), (0.02, 30.0));
        let (sig, pt) = AxisOrder::DxySigPt.coordinates(&m);
        assert_abs_diff_eq!(sig, 0.02 / 0.01001, epsilon = 1e-12);
        assert_eq!(pt, 30.0);
    }

    #[test]
    fn test_zero_error_significance_is_finite() {
        let e = Electron { dxy: 0.01, dxy_err: 0.0, ..Default::default() };
        assert_abs_diff_eq!(e.dxy_significance(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn test_era_axis_convention() {
        assert_eq!(AxisOrder::lepton_tables(Era::Run2016), AxisOrder::EtaPt);
        assert_eq!(AxisOrder::lepton_tables(Era::Run2017), AxisOrder::PtAbsEta);
        assert_eq!(AxisOrder::lepton_tables(Era::Run2018), AxisOrder::PtAbsEta);
    }

    #[test]
    fn test_binding_event_weight() {
        let table = CalibrationTable::new(
            "id",
            vec![-2.4, 0.0, 2.4],
            vec![10.0, 500.0],
            vec![0.9, 0.95],
            vec![0.05, 0.03],
        )
        .unwrap();
        let binding = ScaleFactorBinding::new(Arc::new(table), AxisOrder::EtaPt);
        let a = Muon { pt: 20.0, eta: -1.0, ..Default::default() };
        let b = Muon { pt: 40.0, eta: 1.0, ..Default::default() };
        let w = binding.event_weight(&[&a, &b]);
        assert_abs_diff_eq!(w.nominal, 0.855, epsilon = 1e-12);
        assert_abs_diff_eq!(w.up, 0.931, epsilon = 1e-12);
        assert_abs_diff_eq!(w.down, 0.782, epsilon = 1e-12);
    }
}
