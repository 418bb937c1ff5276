//! Analysis configuration.
//!
//! Deserialized from YAML or JSON. Every enumerated field is a closed enum,
//! so unknown policy names, years or variables fail at load time; cross
//! references between blocks are checked by `EventProcessor::new`.

use std::path::Path;

use hnl_core::{Era, Result};
use serde::{Deserialize, Serialize};

use crate::id::{ElectronIdPolicy, MuonIdTier, MuonIsoTier};
use crate::selection::StoredVariable;

/// Run-wide options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalOptions {
    /// Data-taking era
    pub year: Era,
    /// Real data (no scale factors) instead of simulation
    #[serde(default)]
    pub is_data: bool,
    /// Simulated signal sample (enables truth outputs)
    #[serde(default)]
    pub is_signal: bool,
}

impl GlobalOptions {
    /// Simulation options for `era`
    pub fn simulation(era: Era) -> Self {
        Self { year: era, is_data: false, is_signal: false }
    }

    /// Whether scale factors apply
    pub fn is_mc(&self) -> bool {
        !self.is_data
    }
}

fn default_kinematics() -> Vec<StoredVariable> {
    vec![StoredVariable::Pt, StoredVariable::Eta]
}

/// Electron selector block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElectronSelectionConfig {
    pub output_name: String,
    pub id: ElectronIdPolicy,
    pub min_pt: f64,
    pub max_eta: f64,
    /// Barrel/endcap impact-parameter cuts
    pub ip_cuts: bool,
    pub store_kinematics: Vec<StoredVariable>,
    pub store_weights: bool,
    pub select_leading_only: bool,
}

impl Default for ElectronSelectionConfig {
    fn default() -> Self {
        Self {
            output_name: "tightElectrons".into(),
            id: ElectronIdPolicy::IsoWp90,
            min_pt: 5.0,
            max_eta: 2.4,
            ip_cuts: false,
            store_kinematics: default_kinematics(),
            store_weights: false,
            select_leading_only: false,
        }
    }
}

/// Muon selector block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MuonSelectionConfig {
    pub output_name: String,
    pub id: MuonIdTier,
    pub iso: MuonIsoTier,
    pub min_pt: f64,
    pub max_eta: f64,
    /// `|dxy|` upper bound; a value `<= 0` disables the cut
    pub max_dxy: f64,
    /// `|dz|` upper bound; a value `<= 0` disables the cut
    pub max_dz: f64,
    pub store_kinematics: Vec<StoredVariable>,
    pub store_weights: bool,
    pub select_leading_only: bool,
}

impl Default for MuonSelectionConfig {
    fn default() -> Self {
        Self {
            output_name: "tightMuons".into(),
            id: MuonIdTier::Tight,
            iso: MuonIsoTier::Tight,
            min_pt: 25.0,
            max_eta: 2.4,
            max_dxy: -1.0,
            max_dz: -1.0,
            store_kinematics: default_kinematics(),
            store_weights: false,
            select_leading_only: false,
        }
    }
}

/// Jet–lepton association block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationConfig {
    #[serde(default = "default_association_name")]
    pub output_name: String,
    /// Selector output providing the first reference lepton (its leading object)
    pub lepton1: String,
    /// Selector output providing the second reference lepton; switches to
    /// the two-lepton topology
    #[serde(default)]
    pub lepton2: Option<String>,
}

fn default_association_name() -> String {
    "nominal".into()
}

/// Secondary-vertex flavour used to list vertex-matched tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SvType {
    Regular,
    #[default]
    Adapted,
}

impl SvType {
    /// Column infix
    pub fn name(self) -> &'static str {
        match self {
            SvType::Regular => "regular",
            SvType::Adapted => "adapted",
        }
    }
}

/// Track-weight block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackWeightConfig {
    #[serde(default = "default_track_weight_name")]
    pub output_name: String,
    /// Association block whose jet is used
    pub association: String,
    #[serde(default)]
    pub sv_type: SvType,
    /// Selector output providing the displaced lepton for the single-track weight
    #[serde(default)]
    pub lepton2: Option<String>,
    #[serde(default)]
    pub store_weights: bool,
}

fn default_track_weight_name() -> String {
    "hnlJet_track_weight".into()
}

/// Complete analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    pub global_options: GlobalOptions,
    #[serde(default)]
    pub electrons: Vec<ElectronSelectionConfig>,
    #[serde(default)]
    pub muons: Vec<MuonSelectionConfig>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
    #[serde(default)]
    pub track_weights: Vec<TrackWeightConfig>,
}

impl AnalysisConfig {
    /// Parse YAML (JSON is accepted too, YAML being a superset).
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Parse JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from disk; `.json` files use the JSON parser, anything else YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json { Self::from_json_str(&text) } else { Self::from_yaml_str(&text) }
    }
}
