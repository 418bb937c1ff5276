//! Muon selection.

use std::sync::Arc;

use hnl_calib::{CalibrationCategory, CalibrationKey, CalibrationStore, CalibrationTable};
use hnl_core::{Era, Error, Muon, OutputSink, Result, WeightTriple};

use crate::config::{GlobalOptions, MuonSelectionConfig};
use crate::id::{MuonIdTier, MuonIsoTier, MuonPredicate};
use crate::selection::{SelectionResult, StoredVariable, fill_columns, fill_weight};
use crate::weights::{AxisOrder, ScaleFactorBinding};

/// Integrated luminosity of 2016 runs G–H (pb⁻¹).
pub const LUMI_2016_GH: f64 = 16226.5;
/// Integrated luminosity of all of 2016 (pb⁻¹).
pub const LUMI_2016_TOTAL: f64 = 35916.4;

/// Working points published separately for 2016 runs B–F and G–H.
const SPLIT_2016: [&str; 3] = ["tight_id", "loose_id", "tight_iso_tight_id"];

/// Resolve a muon table, blending the 2016 sub-periods by luminosity.
fn muon_table(
    store: &dyn CalibrationStore,
    category: CalibrationCategory,
    era: Era,
    wp: &str,
) -> Result<Arc<CalibrationTable>> {
    if era == Era::Run2016 && SPLIT_2016.contains(&wp) {
        let w_gh = LUMI_2016_GH / LUMI_2016_TOTAL;
        store.blended(
            &CalibrationKey::new(category, era, format!("{wp}@BCDEF")),
            &CalibrationKey::new(category, era, format!("{wp}@GH")),
            1.0 - w_gh,
            w_gh,
        )
    } else {
        store.table(&CalibrationKey::new(category, era, wp))
    }
}

/// Identification, isolation and reconstruction weights of the selected muons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MuonWeights {
    pub id: WeightTriple,
    pub iso: WeightTriple,
    pub reco: WeightTriple,
}

#[derive(Debug, Clone)]
struct MuonTables {
    id: ScaleFactorBinding,
    iso: ScaleFactorBinding,
    reco: ScaleFactorBinding,
}

/// Configured muon selector.
#[derive(Debug, Clone)]
pub struct MuonSelector {
    output_name: String,
    id_predicate: MuonPredicate,
    iso_predicate: MuonPredicate,
    min_pt: f64,
    max_eta: f64,
    max_dxy: Option<f64>,
    max_dz: Option<f64>,
    leading_only: bool,
    store_kinematics: Vec<StoredVariable>,
    tables: Option<MuonTables>,
}

impl MuonSelector {
    /// Validate the ID/isolation combination and resolve calibration tables.
    pub fn new(
        config: &MuonSelectionConfig,
        options: &GlobalOptions,
        store: &dyn CalibrationStore,
    ) -> Result<Self> {
        let name = &config.output_name;
        let id_predicate = config.id.predicate()?;
        let iso_predicate = config.iso.predicate()?;

        let unsupported = match (config.id, config.iso) {
            (MuonIdTier::None, MuonIsoTier::Tight) => true,
            (id, MuonIsoTier::Loose) => id != MuonIdTier::Loose,
            (MuonIdTier::Loose, MuonIsoTier::Tight) => config.store_weights,
            _ => false,
        };
        if unsupported {
            return Err(Error::Config(format!(
                "{name}: unsupported muon ID/isolation combination {:?}/{:?}",
                config.id, config.iso
            )));
        }

        let store_weights = config.store_weights && config.iso != MuonIsoTier::Inv;
        if config.store_weights && !store_weights {
            log::warn!("{name}: inverted isolation has no scale factors, disabling weight storage");
        }

        let tables = if store_weights && options.is_mc() {
            Some(Self::resolve_tables(config, options.year, store)?)
        } else {
            None
        };

        log::debug!(
            "{name}: muon ID {:?}, iso {:?}, pt > {}, |eta| < {}, weights {}",
            config.id,
            config.iso,
            config.min_pt,
            config.max_eta,
            tables.is_some()
        );

        Ok(Self {
            output_name: config.output_name.clone(),
            id_predicate,
            iso_predicate,
            min_pt: config.min_pt,
            max_eta: config.max_eta,
            max_dxy: (config.max_dxy > 0.0).then_some(config.max_dxy),
            max_dz: (config.max_dz > 0.0).then_some(config.max_dz),
            leading_only: config.select_leading_only,
            store_kinematics: config.store_kinematics.clone(),
            tables,
        })
    }

    fn resolve_tables(
        config: &MuonSelectionConfig,
        era: Era,
        store: &dyn CalibrationStore,
    ) -> Result<MuonTables> {
        let lepton_axes = AxisOrder::lepton_tables(era);

        let id = match config.id {
            MuonIdTier::Tight => ScaleFactorBinding::new(
                muon_table(store, CalibrationCategory::MuonId, era, "tight_id")?,
                lepton_axes,
            ),
            MuonIdTier::Loose => ScaleFactorBinding::new(
                muon_table(store, CalibrationCategory::MuonId, era, "loose_dxysig")?,
                AxisOrder::DxySigPt,
            ),
            MuonIdTier::None => ScaleFactorBinding::new(
                muon_table(store, CalibrationCategory::MuonId, era, "loose_id")?,
                lepton_axes,
            ),
            MuonIdTier::Medium => {
                return Err(Error::Config("no scale factors for medium muon ID".into()));
            }
        };

        // The isolation table is queried with the era's lepton-table axes
        // even when it is the dxy-significance table.
        let iso_wp =
            if config.id == MuonIdTier::Tight { "tight_iso_tight_id" } else { "loose_dxysig" };
        let iso = ScaleFactorBinding::new(
            muon_table(store, CalibrationCategory::MuonIso, era, iso_wp)?,
            lepton_axes,
        );

        let reco = ScaleFactorBinding::new(
            muon_table(store, CalibrationCategory::MuonReco, era, "reco_dxy")?,
            AxisOrder::AbsDxyPt,
        );

        Ok(MuonTables { id, iso, reco })
    }

    /// Output name
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Split `muons` into selected and unselected.
    pub fn select<'a>(&self, muons: &'a [Muon]) -> SelectionResult<'a, Muon> {
        let mut result = SelectionResult::with_capacity(muons.len());
        for muon in muons {
            let passes = muon.pt > self.min_pt
                && muon.eta.abs() < self.max_eta
                && (self.id_predicate)(muon)
                && (self.iso_predicate)(muon);
            let displaced = self.max_dxy.is_some_and(|max| muon.dxy.abs() > max)
                || self.max_dz.is_some_and(|max| muon.dz.abs() > max);
            if passes && !displaced {
                result.selected.push(muon);
            } else {
                result.unselected.push(muon);
            }
        }
        if self.leading_only {
            result.retain_leading();
        }
        result
    }

    /// Scale-factor weights of the selected muons; `None` for data or when
    /// weights are not stored.
    pub fn weights(&self, selected: &[&Muon]) -> Option<MuonWeights> {
        self.tables.as_ref().map(|t| MuonWeights {
            id: t.id.event_weight(selected),
            iso: t.iso.event_weight(selected),
            reco: t.reco.event_weight(selected),
        })
    }

    /// Write counts, kinematic columns and weights for one event.
    pub fn fill(&self, selection: &SelectionResult<'_, Muon>, sink: &mut dyn OutputSink) {
        let selected = &selection.selected;
        fill_columns(sink, &self.output_name, &self.store_kinematics, selected, |m, var| match var {
            StoredVariable::Pt => m.pt,
            StoredVariable::Eta => m.eta,
            StoredVariable::Phi => m.phi,
            StoredVariable::Mass => m.mass,
            StoredVariable::Dxy => m.dxy,
            StoredVariable::DxyErr => m.dxy_err,
            StoredVariable::Dz => m.dz,
            StoredVariable::RelIso => m.pf_rel_iso04_all,
            // rejected at processor construction
            StoredVariable::IsCustomId
            | StoredVariable::IsCustomNoConvId
            | StoredVariable::IsLooseNoConvId => 0.0,
        });
        if let Some(w) = self.weights(selected) {
            fill_weight(sink, &self.output_name, "id", w.id);
            fill_weight(sink, &self.output_name, "iso", w.iso);
            fill_weight(sink, &self.output_name, "reco", w.reco);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hnl_calib::MemoryCalibrationStore;

    fn tight(pt: f64) -> Muon {
        Muon {
            pt,
            eta: 0.5,
            tight_id: true,
            loose_id: true,
            pf_rel_iso04_all: 0.05,
            ..Default::default()
        }
    }

    fn data_options() -> GlobalOptions {
        GlobalOptions { year: Era::Run2017, is_data: true, is_signal: false }
    }

    fn selector(config: MuonSelectionConfig) -> Result<MuonSelector> {
        MuonSelector::new(&config, &data_options(), &MemoryCalibrationStore::new())
    }

    fn flat(value: f64, error: f64) -> CalibrationTable {
        CalibrationTable::new("flat", vec![-1e3, 1e3], vec![-1e3, 1e3], vec![value], vec![error])
            .unwrap()
    }

    #[test]
    fn test_default_selection() {
        let sel = selector(MuonSelectionConfig::default()).unwrap();
        let muons = vec![
            tight(30.0),
            tight(20.0),
            Muon { pf_rel_iso04_all: 0.2, ..tight(30.0) },
            Muon { tight_id: false, ..tight(30.0) },
        ];
        let out = sel.select(&muons);
        assert_eq!(out.selected.len(), 1);
        assert_eq!(out.unselected.len(), 3);
    }

    #[test]
    fn test_displacement_cuts_disabled_by_non_positive_threshold() {
        let muons = vec![Muon { dxy: 1.0, dz: 5.0, ..tight(30.0) }];
        let open =
            selector(MuonSelectionConfig { max_dxy: 0.0, max_dz: -1.0, ..Default::default() })
                .unwrap();
        assert_eq!(open.select(&muons).selected.len(), 1);

        let dxy = selector(MuonSelectionConfig { max_dxy: 0.5, ..Default::default() }).unwrap();
        assert!(dxy.select(&muons).selected.is_empty());

        let dz = selector(MuonSelectionConfig { max_dz: 1.0, ..Default::default() }).unwrap();
        assert!(dz.select(&muons).selected.is_empty());
    }

    #[test]
    fn test_inverted_isolation_sideband() {
        let sel = selector(MuonSelectionConfig {
            id: MuonIdTier::Loose,
            iso: MuonIsoTier::Inv,
            ..Default::default()
        })
        .unwrap();
        let muons = vec![
            Muon { pf_rel_iso04_all: 0.5, ..tight(30.0) },
            Muon { pf_rel_iso04_all: 0.1, ..tight(30.0) },
            Muon { pf_rel_iso04_all: 0.9, ..tight(30.0) },
        ];
        let out = sel.select(&muons);
        assert_eq!(out.selected.len(), 1);
        assert_eq!(out.selected[0].pf_rel_iso04_all, 0.5);
    }

    #[test]
    fn test_unsupported_combinations() {
        let bad = [
            (MuonIdTier::Medium, MuonIsoTier::Tight, false),
            (MuonIdTier::Tight, MuonIsoTier::Medium, false),
            (MuonIdTier::Tight, MuonIsoTier::Loose, false),
            (MuonIdTier::None, MuonIsoTier::Tight, false),
            (MuonIdTier::Loose, MuonIsoTier::Tight, true),
        ];
        for (id, iso, store_weights) in bad {
            let err = selector(MuonSelectionConfig { id, iso, store_weights, ..Default::default() })
                .unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{id:?}/{iso:?}");
        }
        assert!(
            selector(MuonSelectionConfig {
                id: MuonIdTier::Loose,
                iso: MuonIsoTier::Tight,
                ..Default::default()
            })
            .is_ok()
        );
    }

    #[test]
    fn test_leading_only() {
        let sel = selector(MuonSelectionConfig { select_leading_only: true, ..Default::default() })
            .unwrap();
        let muons = vec![tight(40.0), tight(50.0)];
        let out = sel.select(&muons);
        assert_eq!(out.selected.len(), 1);
        assert_eq!(out.selected[0].pt, 40.0);
        assert_eq!(out.unselected[0].pt, 50.0);
    }

    #[test]
    fn test_blended_2016_tables_and_weights() {
        let era = Era::Run2016;
        let key = |c, wp: &str| CalibrationKey::new(c, era, wp);
        let store = MemoryCalibrationStore::new()
            .with_table(key(CalibrationCategory::MuonId, "tight_id@BCDEF"), flat(0.98, 0.01))
            .with_table(key(CalibrationCategory::MuonId, "tight_id@GH"), flat(0.96, 0.02))
            .with_table(
                key(CalibrationCategory::MuonIso, "tight_iso_tight_id@BCDEF"),
                flat(1.0, 0.0),
            )
            .with_table(key(CalibrationCategory::MuonIso, "tight_iso_tight_id@GH"), flat(1.0, 0.0))
            .with_table(key(CalibrationCategory::MuonReco, "reco_dxy"), flat(0.9, 0.1));
        let sel = MuonSelector::new(
            &MuonSelectionConfig { store_weights: true, ..Default::default() },
            &GlobalOptions::simulation(era),
            &store,
        )
        .unwrap();

        let muons = vec![tight(30.0)];
        let out = sel.select(&muons);
        let w = sel.weights(&out.selected).unwrap();
        let w_gh = LUMI_2016_GH / LUMI_2016_TOTAL;
        let sf = (1.0 - w_gh) * 0.98 + w_gh * 0.96;
        let err = (1.0 - w_gh) * 0.01 + w_gh * 0.02;
        assert_abs_diff_eq!(w.id.nominal, sf, epsilon = 1e-12);
        assert_abs_diff_eq!(w.id.up, sf + err, epsilon = 1e-12);
        assert_abs_diff_eq!(w.iso.nominal, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w.reco.down, 0.8, epsilon = 1e-12);

        let none = sel.weights(&[]).unwrap();
        assert_eq!(none.id, WeightTriple::UNIT);
    }

    #[test]
    fn test_data_never_loads_tables() {
        let sel =
            selector(MuonSelectionConfig { store_weights: true, ..Default::default() }).unwrap();
        assert!(sel.weights(&[]).is_none());
    }
}
