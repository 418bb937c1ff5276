//! Selection results and the output columns shared by all selectors.

use hnl_core::OutputSink;
use serde::{Deserialize, Serialize};

/// Objects split into selected and unselected.
///
/// Every input object lands in exactly one of the two lists. Selected
/// objects keep input order; objects dropped by leading-only mode are
/// appended after the ones rejected by cuts.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionResult<'a, T> {
    pub selected: Vec<&'a T>,
    pub unselected: Vec<&'a T>,
}

impl<'a, T> SelectionResult<'a, T> {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self { selected: Vec::with_capacity(n), unselected: Vec::with_capacity(n) }
    }

    /// Keep only the first selected object; the rest move to `unselected`.
    ///
    /// "First" is input order. Callers sort by descending pt beforehand.
    pub fn retain_leading(&mut self) {
        if self.selected.len() > 1 {
            let rest = self.selected.split_off(1);
            self.unselected.extend(rest);
        }
    }
}

/// Per-object quantity written as an array column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoredVariable {
    Pt,
    Eta,
    Phi,
    Mass,
    Dxy,
    DxyErr,
    Dz,
    RelIso,
    /// Electron only
    #[serde(rename = "isCustomID")]
    IsCustomId,
    /// Electron only
    #[serde(rename = "isCustomNoConvID")]
    IsCustomNoConvId,
    /// Electron only
    #[serde(rename = "isLooseNoConvID")]
    IsLooseNoConvId,
}

impl StoredVariable {
    /// Column suffix
    pub fn name(self) -> &'static str {
        match self {
            StoredVariable::Pt => "pt",
            StoredVariable::Eta => "eta",
            StoredVariable::Phi => "phi",
            StoredVariable::Mass => "mass",
            StoredVariable::Dxy => "dxy",
            StoredVariable::DxyErr => "dxyErr",
            StoredVariable::Dz => "dz",
            StoredVariable::RelIso => "relIso",
            StoredVariable::IsCustomId => "isCustomID",
            StoredVariable::IsCustomNoConvId => "isCustomNoConvID",
            StoredVariable::IsLooseNoConvId => "isLooseNoConvID",
        }
    }

    /// Whether the variable only exists on electrons (derived ID flags).
    pub fn electron_only(self) -> bool {
        matches!(
            self,
            StoredVariable::IsCustomId
                | StoredVariable::IsCustomNoConvId
                | StoredVariable::IsLooseNoConvId
        )
    }
}

/// Write `n<name>` and one `<name>_<var>` array per stored variable.
pub(crate) fn fill_columns<T>(
    sink: &mut dyn OutputSink,
    output_name: &str,
    variables: &[StoredVariable],
    selected: &[T],
    value: impl Fn(&T, StoredVariable) -> f64,
) {
    sink.fill_int(&format!("n{output_name}"), selected.len() as i64);
    for &var in variables {
        let column: Vec<f64> = selected.iter().map(|o| value(o, var)).collect();
        sink.fill_array(&format!("{output_name}_{}", var.name()), &column);
    }
}

/// Write `<name>_weight_<category>_{nominal,up,down}`.
pub(crate) fn fill_weight(
    sink: &mut dyn OutputSink,
    output_name: &str,
    category: &str,
    w: hnl_core::WeightTriple,
) {
    sink.fill_float(&format!("{output_name}_weight_{category}_nominal"), w.nominal);
    sink.fill_float(&format!("{output_name}_weight_{category}_up"), w.up);
    sink.fill_float(&format!("{output_name}_weight_{category}_down"), w.down);
}
