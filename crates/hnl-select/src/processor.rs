//! Per-event driver.
//!
//! [`EventProcessor`] owns every configured step and runs them in a fixed
//! order: electron selectors, muon selectors, jet–lepton associations, track
//! weights. All configuration checks and calibration-table lookups happen in
//! [`EventProcessor::new`]; processing an event cannot fail except through
//! the output sink.

use std::collections::{HashMap, HashSet};

use hnl_calib::CalibrationStore;
use hnl_core::{Error, Event, EventSource, Lepton, Muon, OutputSink, Result};

use crate::association::{Association, JetLeptonAssociator, Topology};
use crate::config::AnalysisConfig;
use crate::electron::{ElectronSelection, ElectronSelector};
use crate::muon::MuonSelector;
use crate::selection::SelectionResult;
use crate::track_weight::TrackWeightAggregator;

/// Selector output providing a reference lepton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeptonRef {
    Electron(usize),
    Muon(usize),
}

#[derive(Debug, Clone)]
struct AssociationStep {
    associator: JetLeptonAssociator,
    lepton1: LeptonRef,
    lepton2: Option<LeptonRef>,
}

#[derive(Debug, Clone)]
struct TrackWeightStep {
    aggregator: TrackWeightAggregator,
    association: usize,
    lepton2: Option<LeptonRef>,
}

/// Selections of one event, indexed like the selectors.
struct EventSelections<'a> {
    electrons: Vec<ElectronSelection<'a>>,
    muons: Vec<SelectionResult<'a, Muon>>,
}

impl EventSelections<'_> {
    /// Leading selected object of a selector output.
    fn leading(&self, r: LeptonRef) -> Option<Lepton> {
        match r {
            LeptonRef::Electron(i) => {
                self.electrons[i].result.selected.first().map(|e| Lepton::Electron((*e).clone()))
            }
            LeptonRef::Muon(i) => {
                self.muons[i].selected.first().map(|m| Lepton::Muon((*m).clone()))
            }
        }
    }
}

/// Configured analysis, ready to process events.
#[derive(Debug, Clone)]
pub struct EventProcessor {
    electrons: Vec<ElectronSelector>,
    muons: Vec<MuonSelector>,
    associations: Vec<AssociationStep>,
    track_weights: Vec<TrackWeightStep>,
}

impl EventProcessor {
    /// Build every step, validating names and cross-references.
    pub fn new(config: &AnalysisConfig, store: &dyn CalibrationStore) -> Result<Self> {
        let options = &config.global_options;
        let mut names = HashSet::new();
        let mut claim = |name: &str| {
            if names.insert(name.to_string()) {
                Ok(())
            } else {
                Err(Error::Config(format!("duplicate output name '{name}'")))
            }
        };

        let mut leptons = HashMap::new();
        let mut electrons = Vec::with_capacity(config.electrons.len());
        for (i, cfg) in config.electrons.iter().enumerate() {
            claim(&cfg.output_name)?;
            electrons.push(ElectronSelector::new(cfg, options, store)?);
            leptons.insert(cfg.output_name.as_str(), LeptonRef::Electron(i));
        }

        let mut muons = Vec::with_capacity(config.muons.len());
        for (i, cfg) in config.muons.iter().enumerate() {
            claim(&cfg.output_name)?;
            if let Some(var) = cfg.store_kinematics.iter().find(|v| v.electron_only()) {
                return Err(Error::Config(format!(
                    "{}: '{}' is only defined for electrons",
                    cfg.output_name,
                    var.name()
                )));
            }
            muons.push(MuonSelector::new(cfg, options, store)?);
            leptons.insert(cfg.output_name.as_str(), LeptonRef::Muon(i));
        }

        let resolve = |owner: &str, name: &str| {
            leptons.get(name).copied().ok_or_else(|| {
                Error::Config(format!("{owner}: no electron or muon selection named '{name}'"))
            })
        };

        let mut associations = Vec::with_capacity(config.associations.len());
        for cfg in &config.associations {
            claim(&cfg.output_name)?;
            let lepton1 = resolve(&cfg.output_name, &cfg.lepton1)?;
            let lepton2 = cfg.lepton2.as_deref().map(|n| resolve(&cfg.output_name, n)).transpose()?;
            let topology =
                if lepton2.is_some() { Topology::TwoLepton } else { Topology::SingleLepton };
            associations.push(AssociationStep {
                associator: JetLeptonAssociator::new(&cfg.output_name, topology, options.is_signal),
                lepton1,
                lepton2,
            });
        }

        let mut track_weights = Vec::with_capacity(config.track_weights.len());
        for cfg in &config.track_weights {
            claim(&cfg.output_name)?;
            let association = config
                .associations
                .iter()
                .position(|a| a.output_name == cfg.association)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "{}: no association named '{}'",
                        cfg.output_name, cfg.association
                    ))
                })?;
            let lepton2 = cfg.lepton2.as_deref().map(|n| resolve(&cfg.output_name, n)).transpose()?;
            track_weights.push(TrackWeightStep {
                aggregator: TrackWeightAggregator::new(cfg, options, store)?,
                association,
                lepton2,
            });
        }
        // lepton2_track_* columns have fixed names
        if track_weights.iter().filter(|t| t.aggregator.stores_weights()).count() > 1 {
            return Err(Error::Config("at most one track-weight block may store weights".into()));
        }

        log::debug!(
            "event processor: {} electron, {} muon selections, {} associations, {} track weights",
            electrons.len(),
            muons.len(),
            associations.len(),
            track_weights.len()
        );

        Ok(Self { electrons, muons, associations, track_weights })
    }

    /// Output names of all configured steps, in processing order.
    pub fn output_names(&self) -> Vec<&str> {
        self.electrons
            .iter()
            .map(ElectronSelector::output_name)
            .chain(self.muons.iter().map(MuonSelector::output_name))
            .chain(self.associations.iter().map(|a| a.associator.output_name()))
            .chain(self.track_weights.iter().map(|t| t.aggregator.output_name()))
            .collect()
    }

    /// Process one event and close it on the sink.
    pub fn process(&self, event: &Event, sink: &mut dyn OutputSink) -> Result<()> {
        let selections = EventSelections {
            electrons: self
                .electrons
                .iter()
                .map(|s| s.select(&event.electrons, &event.muons))
                .collect(),
            muons: self.muons.iter().map(|s| s.select(&event.muons)).collect(),
        };
        for (selector, selection) in self.electrons.iter().zip(&selections.electrons) {
            selector.fill(selection, sink);
        }
        for (selector, selection) in self.muons.iter().zip(&selections.muons) {
            selector.fill(selection, sink);
        }

        let mut associations: Vec<Association<'_>> = Vec::with_capacity(self.associations.len());
        for step in &self.associations {
            let lepton1 = selections.leading(step.lepton1);
            let lepton2 = step.lepton2.and_then(|r| selections.leading(r));
            let association =
                step.associator.associate(&event.jets, lepton1.as_ref(), lepton2.as_ref());
            step.associator.fill(&association, sink);
            associations.push(association);
        }

        for step in &self.track_weights {
            let jet = associations[step.association].jet();
            let lepton2 = step.lepton2.and_then(|r| selections.leading(r));
            step.aggregator.fill(jet, &event.tracks, lepton2.as_ref(), sink);
        }

        sink.end_event()
    }

    /// Drain `source` into `sink`, returning the number of events processed.
    pub fn run(&self, source: &mut dyn EventSource, sink: &mut dyn OutputSink) -> Result<usize> {
        let mut n_events = 0;
        while let Some(event) = source.next_event()? {
            self.process(&event, sink)?;
            n_events += 1;
        }
        log::debug!("processed {n_events} events");
        Ok(n_events)
    }
}
