//! Identification and isolation policies.
//!
//! Each policy is a closed enum variant resolved once at configuration time
//! to a plain predicate function; per-object evaluation never matches on
//! strings.

use std::fmt;
use std::str::FromStr;

use hnl_core::{Electron, Error, Muon, Result};
use serde::{Deserialize, Serialize};

use crate::bitmap::CutLevels;

/// Predicate over an electron and its decoded cut levels.
pub type ElectronPredicate = fn(&Electron, &CutLevels) -> bool;

/// Predicate over a muon.
pub type MuonPredicate = fn(&Muon) -> bool;

/// Relative isolation bound of the isolation-aware electron policies.
pub const ELECTRON_ISO_MAX: f64 = 0.15;
/// Upper isolation bound of the inverted (sideband) policies.
pub const INVERTED_ISO_MAX: f64 = 0.8;
/// Muon relative isolation, tight tier.
pub const MUON_TIGHT_ISO_MAX: f64 = 0.15;
/// Muon relative isolation, loose tier.
pub const MUON_LOOSE_ISO_MAX: f64 = 0.25;

/// A cut passes when it is at least at the loose tier.
#[inline]
fn passes(level: u8) -> bool {
    level > 1
}

/// Shower-shape and track-cluster matching cuts, no conversion veto.
pub fn custom_no_conv_id(c: &CutLevels) -> bool {
    passes(c.sc_eta_multi_range())
        && passes(c.deta_in_seed())
        && passes(c.dphi_in())
        && passes(c.full5x5_sigma_ieta_ieta())
        && passes(c.e_inverse_minus_p_inverse())
}

/// [`custom_no_conv_id`] plus the conversion veto.
pub fn custom_id(c: &CutLevels) -> bool {
    custom_no_conv_id(c) && passes(c.conversion_veto())
}

/// [`custom_id`] plus relative isolation below 0.15.
pub fn custom_iso_id(e: &Electron, c: &CutLevels) -> bool {
    custom_id(c) && e.pf_rel_iso03_all < ELECTRON_ISO_MAX
}

/// Loose cut-based ID without the conversion veto.
///
/// The missing-hits field only needs to be non-zero (veto tier).
pub fn loose_no_conv_id(c: &CutLevels) -> bool {
    passes(c.min_pt())
        && passes(c.sc_eta_multi_range())
        && passes(c.deta_in_seed())
        && passes(c.dphi_in())
        && passes(c.full5x5_sigma_ieta_ieta())
        && passes(c.hadronic_over_em_scaled())
        && passes(c.e_inverse_minus_p_inverse())
        && passes(c.rel_pf_iso_scaled())
        && c.missing_hits() > 0
}

/// Electron identification policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElectronIdPolicy {
    #[serde(rename = "Iso_WP80")]
    IsoWp80,
    #[serde(rename = "Iso_WP90")]
    IsoWp90,
    #[serde(rename = "Iso_WPL")]
    IsoWpl,
    #[serde(rename = "noIso_WP80")]
    NoIsoWp80,
    #[serde(rename = "noIso_WP90")]
    NoIsoWp90,
    #[serde(rename = "noIso_WPL")]
    NoIsoWpl,
    None,
    Custom,
    CustomIso,
    Iso,
    CustomNoConv,
    #[serde(alias = "LooseNoConvID")]
    LooseNoConv,
    Inv,
}

/// How an electron identification scale factor is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectronIdTable {
    /// `(eta, pt)` table under the given working point
    EtaPt(&'static str),
    /// `(dxy significance, pt)` table under the given working point
    DxySigPt(&'static str),
}

impl ElectronIdPolicy {
    /// Every policy, in configuration order.
    pub const ALL: [ElectronIdPolicy; 13] = [
        ElectronIdPolicy::IsoWp80,
        ElectronIdPolicy::IsoWp90,
        ElectronIdPolicy::IsoWpl,
        ElectronIdPolicy::NoIsoWp80,
        ElectronIdPolicy::NoIsoWp90,
        ElectronIdPolicy::NoIsoWpl,
        ElectronIdPolicy::None,
        ElectronIdPolicy::Custom,
        ElectronIdPolicy::CustomIso,
        ElectronIdPolicy::Iso,
        ElectronIdPolicy::CustomNoConv,
        ElectronIdPolicy::LooseNoConv,
        ElectronIdPolicy::Inv,
    ];

    /// Configuration name
    pub fn name(self) -> &'static str {
        match self {
            ElectronIdPolicy::IsoWp80 => "Iso_WP80",
            ElectronIdPolicy::IsoWp90 => "Iso_WP90",
            ElectronIdPolicy::IsoWpl => "Iso_WPL",
            ElectronIdPolicy::NoIsoWp80 => "noIso_WP80",
            ElectronIdPolicy::NoIsoWp90 => "noIso_WP90",
            ElectronIdPolicy::NoIsoWpl => "noIso_WPL",
            ElectronIdPolicy::None => "None",
            ElectronIdPolicy::Custom => "Custom",
            ElectronIdPolicy::CustomIso => "CustomIso",
            ElectronIdPolicy::Iso => "Iso",
            ElectronIdPolicy::CustomNoConv => "CustomNoConv",
            ElectronIdPolicy::LooseNoConv => "LooseNoConv",
            ElectronIdPolicy::Inv => "Inv",
        }
    }

    /// The predicate implementing this policy.
    pub fn predicate(self) -> ElectronPredicate {
        match self {
            ElectronIdPolicy::IsoWp80 => |e, _| e.mva_iso_wp80,
            ElectronIdPolicy::IsoWp90 => |e, _| e.mva_iso_wp90,
            ElectronIdPolicy::IsoWpl => |e, _| e.mva_iso_wpl,
            ElectronIdPolicy::NoIsoWp80 => |e, _| e.mva_noiso_wp80,
            ElectronIdPolicy::NoIsoWp90 => |e, _| e.mva_noiso_wp90,
            ElectronIdPolicy::NoIsoWpl => |e, _| e.mva_noiso_wpl,
            ElectronIdPolicy::None => |_, _| true,
            ElectronIdPolicy::Custom => |_, c| custom_id(c),
            ElectronIdPolicy::CustomIso => custom_iso_id,
            ElectronIdPolicy::Iso => |e, _| e.pf_rel_iso03_all < ELECTRON_ISO_MAX,
            ElectronIdPolicy::CustomNoConv => |_, c| custom_no_conv_id(c),
            ElectronIdPolicy::LooseNoConv => |_, c| loose_no_conv_id(c),
            ElectronIdPolicy::Inv => |e, _| !e.mva_iso_wpl && e.pf_rel_iso03_all < INVERTED_ISO_MAX,
        }
    }

    /// Whether identification weights may be stored under this policy.
    pub fn supports_weights(self) -> bool {
        !matches!(
            self,
            ElectronIdPolicy::None
                | ElectronIdPolicy::CustomIso
                | ElectronIdPolicy::Iso
                | ElectronIdPolicy::CustomNoConv
                | ElectronIdPolicy::LooseNoConv
                | ElectronIdPolicy::Inv
        )
    }

    /// Identification scale-factor table, if one exists for this policy.
    pub fn id_table(self) -> Option<ElectronIdTable> {
        match self {
            ElectronIdPolicy::IsoWp80 => Some(ElectronIdTable::EtaPt("mva_iso_wp80")),
            ElectronIdPolicy::IsoWp90 => Some(ElectronIdTable::EtaPt("mva_iso_wp90")),
            ElectronIdPolicy::NoIsoWp80 => Some(ElectronIdTable::EtaPt("mva_noiso_wp80")),
            ElectronIdPolicy::NoIsoWp90 => Some(ElectronIdTable::EtaPt("mva_noiso_wp90")),
            ElectronIdPolicy::Custom => Some(ElectronIdTable::DxySigPt("custom")),
            _ => None,
        }
    }
}

impl fmt::Display for ElectronIdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElectronIdPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ElectronIdPolicy::ALL.into_iter().find(|p| p.name() == s).ok_or_else(|| {
            let names: Vec<&str> = ElectronIdPolicy::ALL.iter().map(|p| p.name()).collect();
            Error::Config(format!("undefined electron ID '{s}', choose one of {names:?}"))
        })
    }
}

/// Muon identification tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuonIdTier {
    Tight,
    /// Recognized but unsupported.
    Medium,
    Loose,
    None,
}

/// Muon isolation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuonIsoTier {
    Tight,
    /// Recognized but unsupported.
    Medium,
    Loose,
    None,
    /// Non-isolated sideband, `0.25 < iso < 0.8`
    Inv,
}

impl MuonIdTier {
    /// Identification predicate; `Medium` is rejected.
    pub fn predicate(self) -> Result<MuonPredicate> {
        let pred: MuonPredicate = match self {
            MuonIdTier::Tight => |m| m.tight_id,
            MuonIdTier::Loose => |m| m.loose_id,
            MuonIdTier::None => |_| true,
            MuonIdTier::Medium => {
                return Err(Error::Config("unsupported muon ID: medium".into()));
            }
        };
        Ok(pred)
    }
}

impl MuonIsoTier {
    /// Isolation predicate; `Medium` is rejected.
    pub fn predicate(self) -> Result<MuonPredicate> {
        let pred: MuonPredicate = match self {
            MuonIsoTier::Tight => |m| m.pf_rel_iso04_all < MUON_TIGHT_ISO_MAX,
            MuonIsoTier::Loose => |m| m.pf_rel_iso04_all < MUON_LOOSE_ISO_MAX,
            MuonIsoTier::None => |_| true,
            MuonIsoTier::Inv => |m| {
                m.pf_rel_iso04_all > MUON_LOOSE_ISO_MAX && m.pf_rel_iso04_all < INVERTED_ISO_MAX
            },
            MuonIsoTier::Medium => {
                return Err(Error::Config("unsupported muon isolation: medium".into()));
            }
        };
        Ok(pred)
    }
}
