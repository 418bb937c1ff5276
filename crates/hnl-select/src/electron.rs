//! Electron selection.

use std::sync::Arc;

use hnl_calib::{CalibrationCategory, CalibrationKey, CalibrationStore, CalibrationTable};
use hnl_core::{Electron, Error, Kinematics, Muon, OutputSink, Result, WeightTriple};

use crate::bitmap::CutLevels;
use crate::config::{ElectronSelectionConfig, GlobalOptions};
use crate::id::{
    ElectronIdTable, ElectronPredicate, custom_id, custom_no_conv_id, loose_no_conv_id,
};
use crate::selection::{SelectionResult, StoredVariable, fill_columns, fill_weight};
use crate::weights::{AxisOrder, ScaleFactorBinding, envelope_product};

/// `|eta|` below which an object is in the barrel.
pub const BARREL_ETA_MAX: f64 = 1.479;
/// Barrel impact-parameter limits `(|dxy|, |dz|)`.
pub const BARREL_IP_MAX: (f64, f64) = (0.05, 0.10);
/// Endcap impact-parameter limits `(|dxy|, |dz|)`.
pub const ENDCAP_IP_MAX: (f64, f64) = (0.10, 0.20);
/// Electrons closer than this ΔR to any muon are dropped.
pub const MUON_OVERLAP_DR: f64 = 0.05;
/// Above this pt the high-Et reconstruction table applies.
pub const RECO_HIGH_ET_MIN_PT: f64 = 20.0;

/// Quantities derived per electron during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElectronDecoration {
    pub cuts: CutLevels,
    pub veto_id: bool,
    pub loose_id: bool,
    pub medium_id: bool,
    pub tight_id: bool,
    pub is_custom_id: bool,
    pub is_custom_no_conv_id: bool,
    pub is_loose_no_conv_id: bool,
}

impl ElectronDecoration {
    /// Decode the bitmap and evaluate the derived ID flags.
    pub fn of(electron: &Electron) -> Self {
        let cuts = CutLevels::decode(electron.vid_nested_wp_bitmap);
        Self {
            cuts,
            veto_id: electron.cut_based > 0,
            loose_id: electron.cut_based > 1,
            medium_id: electron.cut_based > 2,
            tight_id: electron.cut_based > 3,
            is_custom_id: custom_id(&cuts),
            is_custom_no_conv_id: custom_no_conv_id(&cuts),
            is_loose_no_conv_id: loose_no_conv_id(&cuts),
        }
    }
}

/// True if the object fails the barrel/endcap impact-parameter cuts.
pub fn fails_ip_cuts(eta: f64, dxy: f64, dz: f64) -> bool {
    let (max_dxy, max_dz) =
        if eta.abs() < BARREL_ETA_MAX { BARREL_IP_MAX } else { ENDCAP_IP_MAX };
    dxy.abs() > max_dxy || dz.abs() > max_dz
}

/// Smallest ΔR between `electron` and any muon, `None` without muons.
pub fn min_muon_delta_r(electron: &Electron, muons: &[Muon]) -> Option<f64> {
    muons.iter().map(|m| electron.delta_r_to(m)).min_by(f64::total_cmp)
}

/// Outcome of one event's electron selection.
#[derive(Debug, Clone)]
pub struct ElectronSelection<'a> {
    pub input: &'a [Electron],
    pub result: SelectionResult<'a, Electron>,
    /// One record per input electron, in input order
    pub decorations: Vec<ElectronDecoration>,
}

impl ElectronSelection<'_> {
    /// Decoration of an electron from this event's input collection.
    pub fn decoration(&self, electron: &Electron) -> Option<&ElectronDecoration> {
        self.input
            .iter()
            .position(|x| std::ptr::eq(x, electron))
            .map(|i| &self.decorations[i])
    }
}

/// Reconstruction and identification weights of the selected electrons.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ElectronWeights {
    pub reco: Option<WeightTriple>,
    pub id: Option<WeightTriple>,
}

#[derive(Debug, Clone)]
struct ElectronTables {
    reco_low: Arc<CalibrationTable>,
    reco_high: Arc<CalibrationTable>,
    id: Option<ScaleFactorBinding>,
}

/// Configured electron selector.
#[derive(Debug, Clone)]
pub struct ElectronSelector {
    output_name: String,
    id_predicate: ElectronPredicate,
    min_pt: f64,
    max_eta: f64,
    ip_cuts: bool,
    leading_only: bool,
    store_kinematics: Vec<StoredVariable>,
    tables: Option<ElectronTables>,
}

impl ElectronSelector {
    /// Validate the configuration and resolve calibration tables.
    pub fn new(
        config: &ElectronSelectionConfig,
        options: &GlobalOptions,
        store: &dyn CalibrationStore,
    ) -> Result<Self> {
        let policy = config.id;
        let store_weights = config.store_weights && policy.supports_weights();
        if config.store_weights && !store_weights {
            log::warn!(
                "{}: electron ID '{policy}' has no ID weights, disabling weight storage",
                config.output_name
            );
        }

        let tables = if options.is_mc() {
            let era = options.year;
            let reco = |wp: &str| {
                store.table(&CalibrationKey::new(CalibrationCategory::ElectronReco, era, wp))
            };
            let id = if store_weights {
                let binding = match policy.id_table() {
                    Some(ElectronIdTable::EtaPt(wp)) => (wp, AxisOrder::EtaPt),
                    Some(ElectronIdTable::DxySigPt(wp)) => (wp, AxisOrder::DxySigPt),
                    None => {
                        return Err(Error::Config(format!(
                            "{}: no identification scale factors for electron ID '{policy}'",
                            config.output_name
                        )));
                    }
                };
                let key = CalibrationKey::new(CalibrationCategory::ElectronId, era, binding.0);
                Some(ScaleFactorBinding::new(store.table(&key)?, binding.1))
            } else {
                None
            };
            Some(ElectronTables { reco_low: reco("low_et")?, reco_high: reco("high_et")?, id })
        } else {
            None
        };

        log::debug!(
            "{}: electron ID '{policy}', pt > {}, |eta| < {}, ip cuts {}, id weights {}",
            config.output_name,
            config.min_pt,
            config.max_eta,
            config.ip_cuts,
            tables.as_ref().is_some_and(|t| t.id.is_some())
        );

        Ok(Self {
            output_name: config.output_name.clone(),
            id_predicate: policy.predicate(),
            min_pt: config.min_pt,
            max_eta: config.max_eta,
            ip_cuts: config.ip_cuts,
            leading_only: config.select_leading_only,
            store_kinematics: config.store_kinematics.clone(),
            tables,
        })
    }

    /// Output name
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Split `electrons` into selected and unselected.
    ///
    /// `muons` is the event's full muon collection used for overlap removal.
    pub fn select<'a>(&self, electrons: &'a [Electron], muons: &[Muon]) -> ElectronSelection<'a> {
        let mut result = SelectionResult::with_capacity(electrons.len());
        let mut decorations = Vec::with_capacity(electrons.len());

        for electron in electrons {
            let deco = ElectronDecoration::of(electron);
            decorations.push(deco);

            let passes = electron.pt > self.min_pt
                && electron.eta.abs() < self.max_eta
                && (self.id_predicate)(electron, &deco.cuts);
            if !passes {
                result.unselected.push(electron);
                continue;
            }
            if self.ip_cuts && fails_ip_cuts(electron.eta, electron.dxy, electron.dz) {
                result.unselected.push(electron);
                continue;
            }
            if min_muon_delta_r(electron, muons).is_some_and(|dr| dr < MUON_OVERLAP_DR) {
                result.unselected.push(electron);
                continue;
            }
            result.selected.push(electron);
        }

        if self.leading_only {
            result.retain_leading();
        }
        ElectronSelection { input: electrons, result, decorations }
    }

    /// Scale-factor weights of the selected electrons; `None` entries for
    /// data or when a category is not stored.
    pub fn weights(&self, selected: &[&Electron]) -> ElectronWeights {
        let Some(tables) = &self.tables else {
            return ElectronWeights::default();
        };
        let reco = envelope_product(selected.iter().map(|e| {
            let table =
                if e.pt > RECO_HIGH_ET_MIN_PT { &tables.reco_high } else { &tables.reco_low };
            table.lookup(e.eta, e.pt)
        }));
        let id = tables.id.as_ref().map(|b| b.event_weight(selected));
        ElectronWeights { reco: Some(reco), id }
    }

    /// Write counts, kinematic columns and weights for one event.
    pub fn fill(&self, selection: &ElectronSelection<'_>, sink: &mut dyn OutputSink) {
        let selected = &selection.result.selected;
        let weights = self.weights(selected);
        if let Some(w) = weights.reco {
            fill_weight(sink, &self.output_name, "reco", w);
        }
        if let Some(w) = weights.id {
            fill_weight(sink, &self.output_name, "id", w);
        }

        fill_columns(sink, &self.output_name, &self.store_kinematics, selected, |e, var| {
            let deco =
                || selection.decoration(e).copied().unwrap_or_else(|| ElectronDecoration::of(e));
            match var {
                StoredVariable::Pt => e.pt,
                StoredVariable::Eta => e.eta,
                StoredVariable::Phi => e.phi,
                StoredVariable::Mass => e.mass,
                StoredVariable::Dxy => e.dxy,
                StoredVariable::DxyErr => e.dxy_err,
                StoredVariable::Dz => e.dz,
                StoredVariable::RelIso => e.pf_rel_iso03_all,
                StoredVariable::IsCustomId => f64::from(u8::from(deco().is_custom_id)),
                StoredVariable::IsCustomNoConvId => {
                    f64::from(u8::from(deco().is_custom_no_conv_id))
                }
                StoredVariable::IsLooseNoConvId => f64::from(u8::from(deco().is_loose_no_conv_id)),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ElectronIdPolicy;
    use hnl_calib::MemoryCalibrationStore;
    use hnl_core::Era;

    fn passing(pt: f64, eta: f64, phi: f64) -> Electron {
        Electron { pt, eta, phi, mva_iso_wp90: true, ..Default::default() }
    }

    fn data_selector(config: ElectronSelectionConfig) -> ElectronSelector {
        let options = GlobalOptions { year: Era::Run2016, is_data: true, is_signal: false };
        ElectronSelector::new(&config, &options, &MemoryCalibrationStore::new()).unwrap()
    }

    #[test]
    fn test_kinematic_and_id_cuts() {
        let sel = data_selector(ElectronSelectionConfig::default());
        let electrons = vec![
            passing(10.0, 0.5, 0.0),
            passing(4.0, 0.5, 0.0),
            passing(10.0, 2.5, 0.0),
            Electron { mva_iso_wp90: false, ..passing(10.0, 0.5, 0.0) },
        ];
        let out = sel.select(&electrons, &[]);
        assert_eq!(out.result.selected.len(), 1);
        assert_eq!(out.result.unselected.len(), 3);
        assert_eq!(out.decorations.len(), 4);
    }

    #[test]
    fn test_overlap_with_muon_removes_electron() {
        let sel = data_selector(ElectronSelectionConfig::default());
        let electrons = vec![passing(30.0, 1.0, 0.0001)];
        let muons = vec![Muon { pt: 30.0, eta: 1.0, phi: 0.0, ..Default::default() }];
        let out = sel.select(&electrons, &muons);
        assert!(out.result.selected.is_empty());
        assert_eq!(out.result.unselected.len(), 1);

        let far = vec![Muon { eta: 1.0, phi: 0.1, ..Default::default() }];
        assert_eq!(sel.select(&electrons, &far).result.selected.len(), 1);
    }

    #[test]
    fn test_overlap_uses_minimum_over_muons() {
        let electrons = vec![passing(30.0, 0.0, 0.0)];
        let muons = vec![
            Muon { eta: 2.0, phi: 1.0, ..Default::default() },
            Muon { eta: 0.01, phi: 0.0, ..Default::default() },
        ];
        let dr = min_muon_delta_r(&electrons[0], &muons).unwrap();
        assert!((dr - 0.01).abs() < 1e-12);
        assert_eq!(min_muon_delta_r(&electrons[0], &[]), None);
    }

    #[test]
    fn test_ip_cut_boundary_is_endcap() {
        // |dxy| = 0.07 fails in the barrel, passes in the endcap
        assert!(fails_ip_cuts(1.0, 0.07, 0.0));
        assert!(!fails_ip_cuts(BARREL_ETA_MAX, 0.07, 0.0));
        assert!(!fails_ip_cuts(-BARREL_ETA_MAX, 0.07, 0.15));
        assert!(fails_ip_cuts(2.0, 0.0, 0.25));
        assert!(fails_ip_cuts(0.0, 0.0, 0.11));
    }

    #[test]
    fn test_ip_cuts_only_when_enabled() {
        let electrons = vec![Electron { dxy: 0.5, ..passing(10.0, 0.5, 0.0) }];
        let off = data_selector(ElectronSelectionConfig::default());
        assert_eq!(off.select(&electrons, &[]).result.selected.len(), 1);
        let on = data_selector(ElectronSelectionConfig { ip_cuts: true, ..Default::default() });
        assert!(on.select(&electrons, &[]).result.selected.is_empty());
    }

    #[test]
    fn test_leading_only_keeps_first_selected() {
        let sel = data_selector(ElectronSelectionConfig {
            select_leading_only: true,
            ..Default::default()
        });
        let electrons =
            vec![passing(10.0, 0.0, 0.0), passing(30.0, 0.0, 1.0), passing(20.0, 0.0, 2.0)];
        let out = sel.select(&electrons, &[]);
        assert_eq!(out.result.selected.len(), 1);
        assert_eq!(out.result.selected[0].pt, 10.0);
        let rest: Vec<f64> = out.result.unselected.iter().map(|e| e.pt).collect();
        assert_eq!(rest, vec![30.0, 20.0]);
    }

    #[test]
    fn test_decoration_flags() {
        let all_tight = CutLevels::from_levels([4; 10]).encode();
        let e = Electron { vid_nested_wp_bitmap: all_tight, cut_based: 3, ..Default::default() };
        let d = ElectronDecoration::of(&e);
        assert!(d.veto_id && d.loose_id && d.medium_id && !d.tight_id);
        assert!(d.is_custom_id && d.is_custom_no_conv_id && d.is_loose_no_conv_id);
    }

    #[test]
    fn test_weights_require_tables_for_policy() {
        let options = GlobalOptions::simulation(Era::Run2017);
        let cfg = ElectronSelectionConfig {
            id: ElectronIdPolicy::IsoWpl,
            store_weights: true,
            ..Default::default()
        };
        let err =
            ElectronSelector::new(&cfg, &options, &MemoryCalibrationStore::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_reco_tables_fail_for_simulation() {
        let options = GlobalOptions::simulation(Era::Run2018);
        let err = ElectronSelector::new(
            &ElectronSelectionConfig::default(),
            &options,
            &MemoryCalibrationStore::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Calibration(_)));
    }
}
