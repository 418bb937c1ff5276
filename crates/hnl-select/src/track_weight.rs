//! Track-based scale factors for the associated jet.
//!
//! Up to three tracks of the jet, ranked by `|sip2d|`, are looked up in a
//! 1D table binned in `|sip2d|`. Their scale factors are averaged with
//! weights `|ptrel| + 1e-3`, the uncertainty is propagated in quadrature and
//! then floored at half the deviation of the mean from unity.

use std::sync::Arc;

use hnl_calib::{
    CalibrationCategory, CalibrationKey, CalibrationStore, CalibrationTable, ScaleFactor,
};
use hnl_core::{Jet, Kinematics, Lepton, OutputSink, Result, Track, WeightTriple};

use crate::config::{GlobalOptions, SvType, TrackWeightConfig};

/// Tracks entering the weighted average.
pub const MAX_WEIGHTED_TRACKS: usize = 3;
/// Scale factors below this are replaced by [`ScaleFactor::NEUTRAL`].
pub const MIN_RELIABLE_SF: f64 = 0.1;
/// Added to `|ptrel|` to form a track's weight.
pub const PTREL_BIAS: f64 = 1e-3;
/// Minimum signed `Δφ(lepton2, jet)` for the single-track lepton weight.
pub const LEPTON2_MIN_DPHI: f64 = 0.4;

/// Working point of the track table.
pub const TRACK_WORKING_POINT: &str = "sip2d";

/// Replace an unreliable scale factor by the neutral one.
pub fn reliable(sf: ScaleFactor) -> ScaleFactor {
    if sf.value < MIN_RELIABLE_SF { ScaleFactor::NEUTRAL } else { sf }
}

/// Inflate `sf.error` when it is below half of `|1 - sf.value|`.
pub fn apply_floor(sf: ScaleFactor) -> ScaleFactor {
    let half_dev = 0.5 * (1.0 - sf.value);
    if sf.error < half_dev.abs() {
        ScaleFactor::new(sf.value, sf.error.hypot(half_dev))
    } else {
        sf
    }
}

/// Clamped lookup of `|ip|`, with the reliability reset applied.
pub fn impact_parameter_sf(table: &CalibrationTable, ip: f64) -> ScaleFactor {
    reliable(table.lookup_x_clamped(ip.abs()))
}

/// Weighted average over the tracks of `jet`.
///
/// `(1, 0)` when the jet owns no track.
pub fn aggregate(table: &CalibrationTable, jet: &Jet, tracks: &[Track]) -> ScaleFactor {
    let mut candidates: Vec<&Track> = tracks.iter().filter(|t| t.belongs_to(jet)).collect();
    if candidates.is_empty() {
        return ScaleFactor::NEUTRAL;
    }
    candidates.sort_by(|a, b| b.track_sip2d_val.abs().total_cmp(&a.track_sip2d_val.abs()));
    candidates.truncate(MAX_WEIGHTED_TRACKS);

    let (mut sum_w, mut sum_w_sf, mut sum_w2_err2) = (0.0, 0.0, 0.0);
    for track in candidates {
        let sf = impact_parameter_sf(table, track.track_sip2d_val);
        let w = track.ptrel.abs() + PTREL_BIAS;
        sum_w += w;
        sum_w_sf += w * sf.value;
        sum_w2_err2 += w * w * sf.error * sf.error;
    }
    apply_floor(ScaleFactor::new(sum_w_sf / sum_w, sum_w2_err2.sqrt() / sum_w))
}

/// Single-track weight for the second lepton, applied only when it is
/// separated from the jet by `Δφ > 0.4`.
pub fn lepton_sf(table: &CalibrationTable, lepton2: Option<&Lepton>, jet: &Jet) -> ScaleFactor {
    match lepton2 {
        Some(lepton) if lepton.delta_phi_to(jet) > LEPTON2_MIN_DPHI => {
            apply_floor(impact_parameter_sf(table, lepton.dxy()))
        }
        _ => ScaleFactor::NEUTRAL,
    }
}

/// One listed track.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackInfo {
    /// `ptrel * jet.pt_raw`
    pub pt: f64,
    pub dxy: f64,
    pub dxysig: f64,
}

impl TrackInfo {
    fn of(track: &Track, jet: &Jet) -> Self {
        Self {
            pt: track.ptrel * jet.pt_raw,
            dxy: track.track_sip2d_val,
            dxysig: track.track_sip2d_sig,
        }
    }
}

/// Tracks matched to both the jet and its secondary vertex.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackSummary {
    pub tracks: Vec<TrackInfo>,
    /// First track matched to a muon
    pub muon: Option<TrackInfo>,
    /// First electron-matched track that did not fill the muon slot
    pub electron: Option<TrackInfo>,
}

impl TrackSummary {
    /// Collect the vertex-matched tracks of `jet`.
    pub fn collect(jet: &Jet, tracks: &[Track], sv_type: SvType) -> Self {
        let mut summary = Self::default();
        let on_vertex = |t: &Track| match sv_type {
            SvType::Regular => t.matched_sv,
            SvType::Adapted => t.matched_sv_adapted,
        };
        for track in tracks.iter().filter(|t| t.belongs_to(jet) && on_vertex(t)) {
            let info = TrackInfo::of(track, jet);
            if track.matched_muon && summary.muon.is_none() {
                summary.muon = Some(info);
            } else if track.matched_electron && summary.electron.is_none() {
                summary.electron = Some(info);
            }
            summary.tracks.push(info);
        }
        summary
    }
}

/// Jet and second-lepton track weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackWeights {
    pub jet: WeightTriple,
    pub lepton2: WeightTriple,
}

impl TrackWeights {
    /// Weights written when no jet is associated.
    pub const UNIT: TrackWeights =
        TrackWeights { jet: WeightTriple::UNIT, lepton2: WeightTriple::UNIT };
}

/// Configured track-weight producer.
#[derive(Debug, Clone)]
pub struct TrackWeightAggregator {
    output_name: String,
    sv_type: SvType,
    table: Option<Arc<CalibrationTable>>,
}

impl TrackWeightAggregator {
    /// Resolve the era's track table when weights are requested on simulation.
    pub fn new(
        config: &TrackWeightConfig,
        options: &GlobalOptions,
        store: &dyn CalibrationStore,
    ) -> Result<Self> {
        let table = if config.store_weights && options.is_mc() {
            let key =
                CalibrationKey::new(CalibrationCategory::Track, options.year, TRACK_WORKING_POINT);
            let table = store.table(&key)?;
            log::debug!(
                "{}: track weights from {key} ({} bins)",
                config.output_name,
                table.n_x_bins()
            );
            Some(table)
        } else {
            if config.store_weights {
                log::warn!(
                    "{}: track weights are not produced on data, disabling weight storage",
                    config.output_name
                );
            }
            None
        };
        Ok(Self { output_name: config.output_name.clone(), sv_type: config.sv_type, table })
    }

    /// Output name
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Whether weights are produced.
    pub fn stores_weights(&self) -> bool {
        self.table.is_some()
    }

    /// Weights for the associated jet, `None` if weights are disabled.
    pub fn weights(
        &self,
        jet: Option<&Jet>,
        tracks: &[Track],
        lepton2: Option<&Lepton>,
    ) -> Option<TrackWeights> {
        let table = self.table.as_deref()?;
        let Some(jet) = jet else {
            return Some(TrackWeights::UNIT);
        };
        Some(TrackWeights {
            jet: aggregate(table, jet, tracks).to_triple(),
            lepton2: lepton_sf(table, lepton2, jet).to_triple(),
        })
    }

    /// Write the track listing and, if enabled, the weights.
    pub fn fill(
        &self,
        jet: Option<&Jet>,
        tracks: &[Track],
        lepton2: Option<&Lepton>,
        sink: &mut dyn OutputSink,
    ) {
        let summary =
            jet.map(|j| TrackSummary::collect(j, tracks, self.sv_type)).unwrap_or_default();
        let prefix = format!("{}_{}", self.output_name, self.sv_type.name());

        for (flavour, found) in [("muon", summary.muon), ("electron", summary.electron)] {
            let info = found.unwrap_or_default();
            sink.fill_int(&format!("{prefix}_{flavour}"), i64::from(found.is_some()));
            sink.fill_float(&format!("{prefix}_{flavour}_pt"), info.pt);
            sink.fill_float(&format!("{prefix}_{flavour}_dxy"), info.dxy);
            sink.fill_float(&format!("{prefix}_{flavour}_dxysig"), info.dxysig);
        }

        sink.fill_int(&format!("n{prefix}"), summary.tracks.len() as i64);
        let column = |f: fn(&TrackInfo) -> f64| summary.tracks.iter().map(f).collect::<Vec<_>>();
        sink.fill_array(&format!("{prefix}_pt"), &column(|t| t.pt));
        sink.fill_array(&format!("{prefix}_dxy"), &column(|t| t.dxy));
        sink.fill_array(&format!("{prefix}_dxysig"), &column(|t| t.dxysig));

        if let Some(w) = self.weights(jet, tracks, lepton2) {
            let name = &self.output_name;
            sink.fill_float(&format!("{name}_nominal"), w.jet.nominal);
            sink.fill_float(&format!("{name}_up"), w.jet.up);
            sink.fill_float(&format!("{name}_down"), w.jet.down);
            sink.fill_float("lepton2_track_nominal", w.lepton2.nominal);
            sink.fill_float("lepton2_track_up", w.lepton2.up);
            sink.fill_float("lepton2_track_down", w.lepton2.down);
        }
    }
}
