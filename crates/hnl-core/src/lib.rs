//! # hnl-core
//!
//! Shared building blocks for the hnlsel selection engine: the event data
//! model, kinematic helpers, weight triples, data-taking eras, the error
//! type, and the event-source/output-sink seams.

#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod kinematics;
pub mod sink;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use event::{Electron, Event, Jet, JetTruth, Lepton, Muon, Track};
pub use kinematics::{Kinematics, LorentzVector, PtEtaPhiM, delta_phi, delta_r};
pub use sink::{EventRecord, MemorySink, OutputValue};
pub use traits::{EventSource, OutputSink};
pub use types::{Era, WeightTriple};
