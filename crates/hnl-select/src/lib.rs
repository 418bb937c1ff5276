//! # hnl-select
//!
//! Object selection and scale-factor weighting for displaced heavy-neutral-
//! lepton searches.
//!
//! - [`bitmap`]: packed cut-level decoding
//! - [`id`]: identification policies and tiers
//! - [`electron`], [`muon`]: object selectors with their scale-factor weights
//! - [`weights`]: per-object lookups folded into event weight triples
//! - [`association`]: jet–lepton association
//! - [`track_weight`]: track-based scale factors of the associated jet
//! - [`processor`]: per-event driver built from an [`AnalysisConfig`]

#![warn(clippy::all)]

pub mod association;
pub mod bitmap;
pub mod config;
pub mod electron;
pub mod id;
pub mod muon;
pub mod processor;
pub mod selection;
pub mod track_weight;
pub mod weights;

pub use association::{AssociatedJet, Association, JetLeptonAssociator, Topology};
pub use bitmap::CutLevels;
pub use config::{
    AnalysisConfig, AssociationConfig, ElectronSelectionConfig, GlobalOptions,
    MuonSelectionConfig, SvType, TrackWeightConfig,
};
pub use electron::{ElectronDecoration, ElectronSelection, ElectronSelector, ElectronWeights};
pub use id::{ElectronIdPolicy, MuonIdTier, MuonIsoTier};
pub use muon::{MuonSelector, MuonWeights};
pub use processor::EventProcessor;
pub use selection::{SelectionResult, StoredVariable};
pub use track_weight::{TrackSummary, TrackWeightAggregator, TrackWeights};
pub use weights::{AxisOrder, ImpactParameters, ScaleFactorBinding, envelope_product};
