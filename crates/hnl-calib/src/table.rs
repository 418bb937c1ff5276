//! Two-dimensional binned calibration table.
//!
//! Each bin stores a scale factor and its uncertainty. Lookups never
//! interpolate: a query resolves to the single enclosing bin, with
//! out-of-range coordinates folded into the nearest edge bin.

use hnl_core::{Error, Result, WeightTriple};
use serde::{Deserialize, Serialize};

/// Lower-edge factor applied before an edge-clamped lookup.
pub const LOWER_EDGE_FACTOR: f64 = 1.0001;
/// Upper-edge factor applied before an edge-clamped lookup.
pub const UPPER_EDGE_FACTOR: f64 = 0.9999;

/// A scale factor and its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    /// Bin content
    pub value: f64,
    /// Bin error
    pub error: f64,
}

impl ScaleFactor {
    /// Neutral correction `(1, 0)`.
    pub const NEUTRAL: ScaleFactor = ScaleFactor { value: 1.0, error: 0.0 };

    /// Create a new scale factor
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    /// `(value, value + error, value - error)`
    pub fn to_triple(self) -> WeightTriple {
        WeightTriple::from_value_error(self.value, self.error)
    }
}

/// Serialized form, validated on conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableRepr {
    #[serde(default)]
    name: String,
    x_edges: Vec<f64>,
    #[serde(default = "unit_axis")]
    y_edges: Vec<f64>,
    values: Vec<f64>,
    errors: Vec<f64>,
}

fn unit_axis() -> Vec<f64> {
    vec![0.0, 1.0]
}

/// Immutable 2D grid over `(x, y)` with one `(value, error)` per bin.
///
/// Contents are stored x-major: bin `(ix, iy)` lives at `ix * n_y + iy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableRepr", into = "TableRepr")]
pub struct CalibrationTable {
    name: String,
    x_edges: Vec<f64>,
    y_edges: Vec<f64>,
    values: Vec<f64>,
    errors: Vec<f64>,
}

impl CalibrationTable {
    /// Build a table, validating the binning and content sizes.
    pub fn new(
        name: impl Into<String>,
        x_edges: Vec<f64>,
        y_edges: Vec<f64>,
        values: Vec<f64>,
        errors: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        validate_edges(&name, "x", &x_edges)?;
        validate_edges(&name, "y", &y_edges)?;
        let n_bins = (x_edges.len() - 1) * (y_edges.len() - 1);
        if values.len() != n_bins || errors.len() != n_bins {
            return Err(Error::Calibration(format!(
                "table '{name}': expected {n_bins} bins, got {} values and {} errors",
                values.len(),
                errors.len()
            )));
        }
        Ok(Self { name, x_edges, y_edges, values, errors })
    }

    /// Build a table binned in `x` only (a single `y` bin spanning `[0, 1)`).
    pub fn one_dimensional(
        name: impl Into<String>,
        x_edges: Vec<f64>,
        values: Vec<f64>,
        errors: Vec<f64>,
    ) -> Result<Self> {
        Self::new(name, x_edges, unit_axis(), values, errors)
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bins along `x`
    pub fn n_x_bins(&self) -> usize {
        self.x_edges.len() - 1
    }

    /// Number of bins along `y`
    pub fn n_y_bins(&self) -> usize {
        self.y_edges.len() - 1
    }

    /// `(min, max)` of the `x` axis
    pub fn x_range(&self) -> (f64, f64) {
        (self.x_edges[0], self.x_edges[self.x_edges.len() - 1])
    }

    /// Content of bin `(ix, iy)`, or `None` if out of range.
    pub fn bin(&self, ix: usize, iy: usize) -> Option<ScaleFactor> {
        if ix >= self.n_x_bins() || iy >= self.n_y_bins() {
            return None;
        }
        let i = ix * self.n_y_bins() + iy;
        Some(ScaleFactor::new(self.values[i], self.errors[i]))
    }

    /// Scale factor of the bin enclosing `(x, y)`; coordinates outside the
    /// axes resolve to the nearest edge bin.
    pub fn lookup(&self, x: f64, y: f64) -> ScaleFactor {
        let ix = find_bin_clamped(&self.x_edges, x);
        let iy = find_bin_clamped(&self.y_edges, y);
        let i = ix * self.n_y_bins() + iy;
        ScaleFactor::new(self.values[i], self.errors[i])
    }

    /// Edge-clamped lookup on the `x` axis of a table with a single `y` bin
    /// (or the first `y` row of a 2D table).
    pub fn lookup_x_clamped(&self, x: f64) -> ScaleFactor {
        let (x_lo, x_hi) = self.x_range();
        self.lookup(clamp_inside(x, x_lo, x_hi), self.y_edges[0])
    }

    /// Per-bin linear blend `w_a * a + w_b * b` of content and error.
    ///
    /// Errors are combined linearly, not in quadrature. Both tables must
    /// share the same binning.
    pub fn blend(a: &CalibrationTable, b: &CalibrationTable, w_a: f64, w_b: f64) -> Result<Self> {
        if a.x_edges != b.x_edges || a.y_edges != b.y_edges {
            return Err(Error::Calibration(format!(
                "cannot blend '{}' and '{}': binning differs",
                a.name, b.name
            )));
        }
        let mix = |xa: &[f64], xb: &[f64]| -> Vec<f64> {
            xa.iter().zip(xb).map(|(va, vb)| w_a * va + w_b * vb).collect()
        };
        Ok(Self {
            name: format!("{}+{}", a.name, b.name),
            x_edges: a.x_edges.clone(),
            y_edges: a.y_edges.clone(),
            values: mix(&a.values, &b.values),
            errors: mix(&a.errors, &b.errors),
        })
    }
}

impl TryFrom<TableRepr> for CalibrationTable {
    type Error = Error;

    fn try_from(r: TableRepr) -> Result<Self> {
        CalibrationTable::new(r.name, r.x_edges, r.y_edges, r.values, r.errors)
    }
}

impl From<CalibrationTable> for TableRepr {
    fn from(t: CalibrationTable) -> Self {
        TableRepr {
            name: t.name,
            x_edges: t.x_edges,
            y_edges: t.y_edges,
            values: t.values,
            errors: t.errors,
        }
    }
}

fn validate_edges(name: &str, axis: &str, edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(Error::Calibration(format!(
            "table '{name}': {axis} axis needs at least 2 edges, got {}",
            edges.len()
        )));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(Error::Calibration(format!("table '{name}': non-finite {axis} edge")));
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(Error::Calibration(format!(
            "table '{name}': {axis} edges must be strictly increasing"
        )));
    }
    Ok(())
}

fn clamp_inside(v: f64, lo: f64, hi: f64) -> f64 {
    (lo * LOWER_EDGE_FACTOR).max((hi * UPPER_EDGE_FACTOR).min(v))
}

/// Bin index for `val` given sorted edges, folding under/overflow into the
/// first/last bin.
fn find_bin_clamped(edges: &[f64], val: f64) -> usize {
    let n_bins = edges.len() - 1;
    edges.partition_point(|&e| e <= val).saturating_sub(1).min(n_bins - 1)
}
