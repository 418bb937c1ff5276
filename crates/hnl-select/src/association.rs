//! Jet–lepton association.
//!
//! With one reference lepton the jet most back-to-back in φ is taken; with
//! two, the jet closest in ΔR to the second lepton. Ties keep the input
//! order of the jet collection (stable sort on the documented key).

use hnl_core::{Jet, Kinematics, Lepton, OutputSink};

/// Lepton topology, fixed by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Only `lepton1` is configured
    SingleLepton,
    /// `lepton1` and `lepton2` are configured
    TwoLepton,
}

/// The associated jet and the jets that were not chosen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssociatedJet<'a> {
    pub jet: Option<&'a Jet>,
    /// Remaining jets, in ranking order
    pub other_jets: Vec<&'a Jet>,
}

/// Lepton–jet pair quantities; all zero without an associated jet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairQuantities {
    /// `m(l1 + j)` or `m(l1 + l2 + j)` with the lepton-subtracted jet
    pub mass: f64,
    /// `pt(l1 - j)` or `pt(l1 - l2 - j)` with the lepton-subtracted jet
    pub delta_pt: f64,
    /// `|Δφ(l1, j)|`
    pub delta_phi_l1j: f64,
    /// `|η(l1) - η(j)|`
    pub delta_eta_l1j: f64,
    /// `ΔR(l1, j)` (single) or `ΔR(l2, j)` (two leptons)
    pub delta_r: f64,
}

/// Generator-level bookkeeping for signal samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruthSummary {
    pub is_true_q: i32,
    pub is_true_qe: i32,
    pub is_true_qmu: i32,
    pub is_true_qtau: i32,
    pub true_lxy: f64,
    /// Truth-flag sum over the jets that were not associated
    pub n_true_missed: i32,
}

impl TruthSummary {
    /// Values written when no jet is associated.
    pub const ABSENT: TruthSummary = TruthSummary {
        is_true_q: -1,
        is_true_qe: -1,
        is_true_qmu: -1,
        is_true_qtau: -1,
        true_lxy: -10.0,
        n_true_missed: 0,
    };

    /// Summarize an association.
    pub fn of(associated: &AssociatedJet<'_>) -> Self {
        let Some(jet) = associated.jet else {
            return Self::ABSENT;
        };
        Self {
            is_true_q: jet.truth.is_llp_q,
            is_true_qe: jet.truth.is_llp_qe,
            is_true_qmu: jet.truth.is_llp_qmu,
            is_true_qtau: jet.truth.is_llp_qtau,
            true_lxy: jet.truth.displacement_xy,
            n_true_missed: associated.other_jets.iter().map(|j| j.truth.llp_flag_sum()).sum(),
        }
    }
}

/// Stable sort by `key`, descending if `descending`, and split off the head.
fn rank_jets<'a>(
    jets: &'a [Jet],
    key: impl Fn(&Jet) -> f64,
    descending: bool,
) -> AssociatedJet<'a> {
    let mut ranked: Vec<(&Jet, f64)> = jets.iter().map(|j| (j, key(j))).collect();
    if descending {
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    } else {
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    }
    let mut ranked = ranked.into_iter().map(|(j, _)| j);
    AssociatedJet { jet: ranked.next(), other_jets: ranked.collect() }
}

/// Jet most back-to-back with `lepton1` (largest `|Δφ|`).
pub fn associate_back_to_back<'a>(jets: &'a [Jet], lepton1: &Lepton) -> AssociatedJet<'a> {
    rank_jets(jets, |j| j.delta_phi_to(lepton1).abs(), true)
}

/// Jet closest to `lepton2` (smallest ΔR).
pub fn associate_closest<'a>(jets: &'a [Jet], lepton2: &Lepton) -> AssociatedJet<'a> {
    rank_jets(jets, |j| j.delta_r_to(lepton2), false)
}

/// One event's association.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Association<'a> {
    pub associated: AssociatedJet<'a>,
    pub quantities: PairQuantities,
}

impl<'a> Association<'a> {
    /// The associated jet, if any
    pub fn jet(&self) -> Option<&'a Jet> {
        self.associated.jet
    }
}

/// Configured associator.
#[derive(Debug, Clone)]
pub struct JetLeptonAssociator {
    output_name: String,
    topology: Topology,
    truth: bool,
}

impl JetLeptonAssociator {
    /// Create an associator; `truth` enables the signal bookkeeping outputs.
    pub fn new(output_name: impl Into<String>, topology: Topology, truth: bool) -> Self {
        Self { output_name: output_name.into(), topology, truth }
    }

    /// Output name
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Associate a jet. A missing reference lepton leaves the jet absent.
    pub fn associate<'a>(
        &self,
        jets: &'a [Jet],
        lepton1: Option<&Lepton>,
        lepton2: Option<&Lepton>,
    ) -> Association<'a> {
        match (self.topology, lepton1, lepton2) {
            (Topology::SingleLepton, Some(l1), _) => {
                let associated = associate_back_to_back(jets, l1);
                let quantities =
                    associated.jet.map(|j| single_quantities(l1, j)).unwrap_or_default();
                Association { associated, quantities }
            }
            (Topology::TwoLepton, Some(l1), Some(l2)) => {
                let associated = associate_closest(jets, l2);
                let quantities =
                    associated.jet.map(|j| two_lepton_quantities(l1, l2, j)).unwrap_or_default();
                Association { associated, quantities }
            }
            _ => Association::default(),
        }
    }

    /// Write jet, pair and (for signal) truth outputs.
    pub fn fill(&self, association: &Association<'_>, sink: &mut dyn OutputSink) {
        let name = &self.output_name;
        let jet_col = |var: &str| format!("hnlJet_{name}_{var}");

        match association.jet() {
            Some(jet) => {
                sink.fill_float(&jet_col("pt"), jet.pt);
                sink.fill_float(&jet_col("ptsub"), jet.p4_subtracted.pt);
                sink.fill_float(&jet_col("ptraw"), jet.pt_raw);
                sink.fill_float(&jet_col("ptrawsub"), jet.pt_raw_subtracted);
                sink.fill_float(&jet_col("ptorig"), jet.p4_original.pt);
                sink.fill_float(&jet_col("ptorigsub"), jet.p4_original_subtracted.pt);
                sink.fill_float(&jet_col("eta"), jet.eta);
                sink.fill_float(&jet_col("phi"), jet.phi);
                sink.fill_int(&jet_col("ncpf"), i64::from(jet.number_cpf));
                sink.fill_int(&jet_col("nmu"), i64::from(jet.number_muon));
                sink.fill_int(&jet_col("ne"), i64::from(jet.number_electron));
            }
            None => {
                for var in
                    ["pt", "ptsub", "ptraw", "ptrawsub", "ptorig", "ptorigsub", "eta", "phi"]
                {
                    sink.fill_float(&jet_col(var), 0.0);
                }
                for var in ["ncpf", "nmu", "ne"] {
                    sink.fill_int(&jet_col(var), -1);
                }
            }
        }

        let q = &association.quantities;
        match self.topology {
            Topology::SingleLepton => {
                sink.fill_float(&format!("{name}_m_l1j"), q.mass);
                sink.fill_float(&format!("{name}_dPt_l1j"), q.delta_pt);
                sink.fill_float(&format!("{name}_dPhi_l1j"), q.delta_phi_l1j);
                sink.fill_float(&format!("{name}_dR_l1j"), q.delta_r);
                sink.fill_float(&format!("{name}_dEta_l1j"), q.delta_eta_l1j);
            }
            Topology::TwoLepton => {
                sink.fill_float(&format!("{name}_m_llj"), q.mass);
                sink.fill_float(&format!("{name}_dPt_llj"), q.delta_pt);
                sink.fill_float(&format!("{name}_dPhi_l1j"), q.delta_phi_l1j);
                sink.fill_float(&format!("{name}_dEta_l1j"), q.delta_eta_l1j);
                sink.fill_float(&format!("{name}_dR_l2j"), q.delta_r);
            }
        }

        if self.truth {
            let t = TruthSummary::of(&association.associated);
            sink.fill_int(&jet_col("isTrueQ"), i64::from(t.is_true_q));
            sink.fill_int(&jet_col("isTrueQE"), i64::from(t.is_true_qe));
            sink.fill_int(&jet_col("isTrueQMU"), i64::from(t.is_true_qmu));
            sink.fill_int(&jet_col("isTrueQTAU"), i64::from(t.is_true_qtau));
            sink.fill_float(&jet_col("trueLxy"), t.true_lxy);
            sink.fill_int(&format!("{name}_nTrueMissed"), i64::from(t.n_true_missed));
        }
    }
}

fn single_quantities(l1: &Lepton, jet: &Jet) -> PairQuantities {
    let sub = jet.p4_subtracted.p4();
    PairQuantities {
        mass: (l1.p4() + sub).m(),
        delta_pt: (l1.p4() - sub).pt(),
        delta_phi_l1j: l1.delta_phi_to(jet).abs(),
        delta_eta_l1j: (l1.eta() - jet.eta).abs(),
        delta_r: l1.delta_r_to(jet),
    }
}

fn two_lepton_quantities(l1: &Lepton, l2: &Lepton, jet: &Jet) -> PairQuantities {
    let sub = jet.p4_subtracted.p4();
    PairQuantities {
        mass: (l1.p4() + l2.p4() + sub).m(),
        delta_pt: (l1.p4() - l2.p4() - sub).pt(),
        delta_phi_l1j: l1.delta_phi_to(jet).abs(),
        delta_eta_l1j: (l1.eta() - jet.eta).abs(),
        delta_r: l2.delta_r_to(jet),
    }
}
