//! Full configuration → events → outputs on simulation with weights.

use approx::assert_abs_diff_eq;
use hnl_calib::{CalibrationCategory, CalibrationKey, CalibrationTable, MemoryCalibrationStore};
use hnl_core::{
    Electron, Era, Event, EventRecord, Jet, MemorySink, Muon, OutputValue, PtEtaPhiM, Track,
};
use hnl_select::{AnalysisConfig, CutLevels, EventProcessor};

const CONFIG: &str = r#"
global_options: { year: 2018 }
electrons:
  - output_name: tightElectrons
    id: Custom
    min_pt: 10
    store_kinematics: [pt, eta, isCustomID]
    store_weights: true
muons:
  - output_name: tightMuons
    store_weights: true
associations:
  - lepton1: tightMuons
track_weights:
  - association: nominal
    lepton2: tightElectrons
    store_weights: true
"#;

fn flat(name: &str, value: f64, error: f64) -> CalibrationTable {
    CalibrationTable::new(name, vec![0.0, 1.0], vec![0.0, 1.0], vec![value], vec![error]).unwrap()
}

fn store() -> MemoryCalibrationStore {
    use CalibrationCategory as C;
    let era = Era::Run2018;
    [
        (C::ElectronReco, "low_et", 0.90, 0.02),
        (C::ElectronReco, "high_et", 0.97, 0.01),
        (C::ElectronId, "custom", 0.90, 0.05),
        (C::MuonId, "tight_id", 0.99, 0.01),
        (C::MuonIso, "tight_iso_tight_id", 0.98, 0.02),
        (C::MuonReco, "reco_dxy", 1.00, 0.005),
        (C::Track, "sip2d", 0.80, 0.02),
    ]
    .into_iter()
    .fold(MemoryCalibrationStore::new(), |store, (category, wp, v, e)| {
        store.with_table(CalibrationKey::new(category, era, wp), flat(wp, v, e))
    })
}

fn event() -> Event {
    Event {
        electrons: vec![Electron {
            pt: 25.0,
            eta: -1.0,
            phi: -2.0,
            dxy: 0.02,
            dxy_err: 0.01,
            vid_nested_wp_bitmap: CutLevels::from_levels([2; 10]).encode(),
            ..Default::default()
        }],
        muons: vec![Muon {
            pt: 30.0,
            eta: 0.5,
            phi: 0.0,
            tight_id: true,
            loose_id: true,
            pf_rel_iso04_all: 0.05,
            ..Default::default()
        }],
        jets: vec![
            Jet { index: 0, pt: 45.0, eta: 0.2, phi: 0.3, pt_raw: 40.0, ..Default::default() },
            Jet {
                index: 1,
                pt: 60.0,
                eta: 0.0,
                phi: 3.1,
                pt_raw: 50.0,
                p4_subtracted: PtEtaPhiM { pt: 55.0, eta: 0.0, phi: 3.1, mass: 5.0 },
                number_cpf: 4,
                ..Default::default()
            },
        ],
        tracks: vec![
            Track {
                jet_idx: 1,
                ptrel: 0.5,
                track_sip2d_val: 0.4,
                matched_sv_adapted: true,
                matched_muon: true,
                ..Default::default()
            },
            Track { jet_idx: 1, ptrel: 0.1, track_sip2d_val: -0.2, ..Default::default() },
            Track {
                jet_idx: 0,
                ptrel: 0.9,
                track_sip2d_val: 0.9,
                matched_sv_adapted: true,
                ..Default::default()
            },
        ],
    }
}

fn float(ev: &EventRecord, name: &str) -> f64 {
    ev[name].as_f64().unwrap_or_else(|| panic!("{name} is not a scalar"))
}

#[test]
fn test_process_simulated_event() {
    let config = AnalysisConfig::from_yaml_str(CONFIG).unwrap();
    let processor = EventProcessor::new(&config, &store()).unwrap();
    let mut sink = MemorySink::new();
    processor.process(&event(), &mut sink).unwrap();
    let events = sink.into_events();
    assert_eq!(events.len(), 1);
    let ev = &events[0];

    // electrons
    assert_eq!(ev["ntightElectrons"], OutputValue::Int(1));
    assert_eq!(ev["tightElectrons_isCustomID"], OutputValue::Array(vec![1.0]));
    assert_abs_diff_eq!(float(ev, "tightElectrons_weight_reco_nominal"), 0.97, epsilon = 1e-12);
    assert_abs_diff_eq!(float(ev, "tightElectrons_weight_id_up"), 0.95, epsilon = 1e-12);

    // muons
    assert_eq!(ev["tightMuons_pt"], OutputValue::Array(vec![30.0]));
    assert_abs_diff_eq!(float(ev, "tightMuons_weight_id_down"), 0.98, epsilon = 1e-12);
    assert_abs_diff_eq!(float(ev, "tightMuons_weight_iso_nominal"), 0.98, epsilon = 1e-12);
    assert_abs_diff_eq!(float(ev, "tightMuons_weight_reco_up"), 1.005, epsilon = 1e-12);

    // association picks the jet opposite the muon
    assert_eq!(float(ev, "hnlJet_nominal_pt"), 60.0);
    assert_eq!(ev["hnlJet_nominal_ncpf"], OutputValue::Int(4));
    assert_abs_diff_eq!(float(ev, "nominal_dPhi_l1j"), 3.1, epsilon = 1e-12);
    assert!(!ev.contains_key("hnlJet_nominal_isTrueQ"));

    // vertex-matched tracks of jet 1
    assert_eq!(ev["nhnlJet_track_weight_adapted"], OutputValue::Int(1));
    assert_eq!(ev["hnlJet_track_weight_adapted_muon"], OutputValue::Int(1));
    assert_abs_diff_eq!(float(ev, "hnlJet_track_weight_adapted_muon_pt"), 25.0, epsilon = 1e-12);
    assert_eq!(ev["hnlJet_track_weight_adapted_electron"], OutputValue::Int(0));

    // two tracks on jet 1, both at 0.8 +- 0.02
    let raw = 0.02 * (0.501f64.powi(2) + 0.101f64.powi(2)).sqrt() / 0.602;
    let err = raw.hypot(0.1);
    assert_abs_diff_eq!(float(ev, "hnlJet_track_weight_nominal"), 0.8, epsilon = 1e-12);
    assert_abs_diff_eq!(float(ev, "hnlJet_track_weight_up"), 0.8 + err, epsilon = 1e-12);
    assert_abs_diff_eq!(float(ev, "hnlJet_track_weight_down"), 0.8 - err, epsilon = 1e-12);

    // electron at phi -2.0: signed Δφ to the jet wraps to +1.18
    assert_abs_diff_eq!(float(ev, "lepton2_track_nominal"), 0.8, epsilon = 1e-12);
    assert_abs_diff_eq!(float(ev, "lepton2_track_up"), 0.8 + 0.02f64.hypot(0.1), epsilon = 1e-12);
}

#[test]
fn test_run_drains_source() {
    struct Events(std::vec::IntoIter<Event>);
    impl hnl_core::EventSource for Events {
        fn next_event(&mut self) -> hnl_core::Result<Option<Event>> {
            Ok(self.0.next())
        }
    }

    let config = AnalysisConfig::from_yaml_str(CONFIG).unwrap();
    let processor = EventProcessor::new(&config, &store()).unwrap();
    let mut source = Events(vec![event(), Event::default()].into_iter());
    let mut sink = MemorySink::new();
    assert_eq!(processor.run(&mut source, &mut sink).unwrap(), 2);

    let empty = &sink.events()[1];
    assert_eq!(empty["ntightMuons"], OutputValue::Int(0));
    assert_eq!(empty["tightMuons_weight_id_nominal"], OutputValue::Float(1.0));
    assert_eq!(empty["hnlJet_nominal_pt"], OutputValue::Float(0.0));
    assert_eq!(empty["hnlJet_track_weight_nominal"], OutputValue::Float(1.0));
    assert_eq!(empty["lepton2_track_down"], OutputValue::Float(1.0));
}

#[test]
fn test_missing_table_fails_construction() {
    let config = AnalysisConfig::from_yaml_str(CONFIG).unwrap();
    let err = EventProcessor::new(&config, &MemoryCalibrationStore::new()).unwrap_err();
    assert!(matches!(err, hnl_core::Error::Calibration(_)));
}
