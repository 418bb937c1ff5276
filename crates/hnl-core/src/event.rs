//! Per-event object records as delivered by an event source.
//!
//! Records are plain data and are never mutated by the selection engine;
//! derived quantities live in separate decoration records.

use serde::{Deserialize, Serialize};

use crate::kinematics::{Kinematics, PtEtaPhiM};

/// Reconstructed electron.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Electron {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    /// Transverse impact parameter (cm)
    pub dxy: f64,
    /// Uncertainty on `dxy`
    pub dxy_err: f64,
    /// Longitudinal impact parameter (cm)
    pub dz: f64,
    /// Relative PF isolation, cone 0.3
    pub pf_rel_iso03_all: f64,
    /// Packed cut-based ID decisions: ten 3-bit fields
    pub vid_nested_wp_bitmap: u32,
    /// Cut-based ID tier (0 fail, 1 veto, 2 loose, 3 medium, 4 tight)
    pub cut_based: i32,
    pub mva_iso_wp80: bool,
    pub mva_iso_wp90: bool,
    pub mva_iso_wpl: bool,
    pub mva_noiso_wp80: bool,
    pub mva_noiso_wp90: bool,
    pub mva_noiso_wpl: bool,
}

/// Reconstructed muon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Muon {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub dxy: f64,
    pub dxy_err: f64,
    pub dz: f64,
    /// Relative PF isolation, cone 0.4
    pub pf_rel_iso04_all: f64,
    pub tight_id: bool,
    pub loose_id: bool,
}

/// Generator-level labels attached to a jet in simulated signal samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JetTruth {
    pub is_llp_q: i32,
    pub is_llp_qe: i32,
    pub is_llp_qmu: i32,
    pub is_llp_qtau: i32,
    /// Transverse displacement of the originating vertex (cm)
    pub displacement_xy: f64,
}

impl JetTruth {
    /// Sum of the four long-lived-particle flags.
    pub fn llp_flag_sum(&self) -> i32 {
        self.is_llp_q + self.is_llp_qe + self.is_llp_qmu + self.is_llp_qtau
    }
}

/// Reconstructed jet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Jet {
    /// Position in the source collection; tracks refer to it through `jet_idx`.
    pub index: usize,
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    /// Uncorrected pt
    pub pt_raw: f64,
    /// Uncorrected pt after removing the associated lepton
    pub pt_raw_subtracted: f64,
    /// Four-momentum with the associated lepton removed
    pub p4_subtracted: PtEtaPhiM,
    /// Four-momentum before energy corrections
    pub p4_original: PtEtaPhiM,
    /// `p4_original` with the associated lepton removed
    pub p4_original_subtracted: PtEtaPhiM,
    pub number_cpf: i32,
    pub number_muon: i32,
    pub number_electron: i32,
    pub truth: JetTruth,
}

/// Charged-particle-flow candidate (track) clustered into a jet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    /// Index of the owning jet, negative if unassigned
    pub jet_idx: i64,
    /// Momentum fraction relative to the owning jet's raw pt
    pub ptrel: f64,
    /// Signed 2D impact parameter value
    pub track_sip2d_val: f64,
    /// Signed 2D impact parameter significance
    pub track_sip2d_sig: f64,
    /// Matched to the standard secondary vertex
    pub matched_sv: bool,
    /// Matched to the adapted secondary vertex
    pub matched_sv_adapted: bool,
    pub matched_muon: bool,
    pub matched_electron: bool,
}

impl Track {
    /// Whether the track belongs to `jet`.
    pub fn belongs_to(&self, jet: &Jet) -> bool {
        usize::try_from(self.jet_idx).is_ok_and(|idx| idx == jet.index)
    }
}

/// One event's object collections, order preserved from the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub electrons: Vec<Electron>,
    pub muons: Vec<Muon>,
    pub jets: Vec<Jet>,
    pub tracks: Vec<Track>,
}

/// A selected lepton used as a reference object downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum Lepton {
    Electron(Electron),
    Muon(Muon),
}

impl Lepton {
    /// Transverse impact parameter
    pub fn dxy(&self) -> f64 {
        match self {
            Lepton::Electron(e) => e.dxy,
            Lepton::Muon(m) => m.dxy,
        }
    }
}

macro_rules! impl_kinematics {
    ($($ty:ty),*) => {
        $(
            impl Kinematics for $ty {
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
        )*
    };
}

impl_kinematics!(Electron, Muon, Jet);

impl Kinematics for Lepton {
    fn pt(&self) -> f64 {
        match self {
            Lepton::Electron(e) => e.pt,
            Lepton::Muon(m) => m.pt,
        }
    }
    fn eta(&self) -> f64 {
        match self {
            Lepton::Electron(e) => e.eta,
            Lepton::Muon(m) => m.eta,
        }
    }
    fn phi(&self) -> f64 {
        match self {
            Lepton::Electron(e) => e.phi,
            Lepton::Muon(m) => m.phi,
        }
    }
    fn mass(&self) -> f64 {
        match self {
            Lepton::Electron(e) => e.mass,
            Lepton::Muon(m) => m.mass,
        }
    }
}
