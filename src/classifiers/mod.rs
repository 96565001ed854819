//! C9 — classifier bank.
//!
//! Each classifier is an independent `Classifier` implementation evaluated
//! over one packet; the bank runs every classifier whose family matches the
//! packet kind and collects whichever ones qualify. Shaped after the
//! teacher's `SignalDetector::detect_all` — a loop over independent
//! detector functions collecting `Some` results — but split one classifier
//! per struct since each classifier here carries materially different
//! qualification logic and its own threshold constants.

mod far_dated;
mod overwrite;
mod spike;
mod structure_classifiers;
mod sweep;
mod zero_dte;

use crate::config::ClassifierConfig;
use crate::models::{ClassifierHit, Envelope, FlowPacket, PacketKind};

pub trait Classifier: Send + Sync {
    fn id(&self) -> &'static str;
    /// Which packet kind this classifier evaluates.
    fn family(&self) -> PacketKind;
    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation>;
}

/// What a qualifying classifier reports before envelope/packet bookkeeping
/// is attached by the bank.
pub struct ClassifierEvaluation {
    pub confidence: f64,
    pub direction: crate::models::Direction,
    pub explanations: Vec<String>,
}

pub struct ClassifierBank {
    classifiers: Vec<Box<dyn Classifier>>,
}

impl ClassifierBank {
    pub fn new() -> Self {
        let classifiers: Vec<Box<dyn Classifier>> = vec![
            Box::new(sweep::LargeBullishCallSweep),
            Box::new(sweep::LargeBearishPutSweep),
            Box::new(spike::UnusualContractSpike),
            Box::new(overwrite::LargeCallSellOverwrite),
            Box::new(overwrite::LargePutSellWrite),
            Box::new(structure_classifiers::StraddleClassifier),
            Box::new(structure_classifiers::StrangleClassifier),
            Box::new(structure_classifiers::VerticalSpreadClassifier),
            Box::new(structure_classifiers::LadderAccumulationClassifier),
            Box::new(far_dated::FarDatedConviction),
            Box::new(zero_dte::ZeroDteGammaPunch),
        ];
        Self { classifiers }
    }

    /// Evaluates every classifier whose family matches `packet.packet_kind`,
    /// returning the hits from whichever ones qualify.
    pub fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Vec<ClassifierHit> {
        self.classifiers
            .iter()
            .filter(|c| c.family() == packet.packet_kind)
            .filter_map(|c| {
                c.evaluate(packet, cfg).map(|eval| ClassifierHit {
                    envelope: Envelope::new(
                        packet.envelope.source_ts,
                        packet.envelope.ingest_ts,
                        packet.envelope.seq,
                        packet.envelope.trace_id.clone(),
                    ),
                    classifier_id: c.id().to_string(),
                    packet_id: packet.id.clone(),
                    confidence: eval.confidence,
                    direction: eval.direction,
                    explanations: eval.explanations,
                })
            })
            .collect()
    }
}

impl Default for ClassifierBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear bonus of up to `max_bonus` as `value` goes from 1x `threshold` to
/// 2x `threshold`; zero below threshold, capped at `max_bonus` beyond 2x.
pub(crate) fn multiple_bonus(value: f64, threshold: f64, max_bonus: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    let multiple = value / threshold;
    ((multiple - 1.0).max(0.0)).min(1.0) * max_bonus
}

/// Linear bonus of up to `max_bonus` for every point `z` sits above `z_min`,
/// capped at one full point above the minimum.
pub(crate) fn z_bonus(z: f64, z_min: f64, max_bonus: f64) -> f64 {
    ((z - z_min).max(0.0)).min(1.0) * max_bonus
}

fn pct(x: f64) -> i64 {
    (x * 100.0).round() as i64
}

/// Applies the aggressor-ratio adjustment shared by every directional
/// classifier: rewards favorable aggressor pressure when NBBO coverage is
/// adequate, penalizes unfavorable pressure, and treats zero coverage as a
/// confidence-denting unknown for side-specific classifiers.
pub(crate) fn aggressor_adjustment(
    coverage: f64,
    strength: f64,
    min_coverage: f64,
    min_agg: f64,
    side_specific: bool,
) -> (f64, String) {
    if coverage <= 0.0 {
        let delta = if side_specific { -0.15 } else { 0.0 };
        (delta, "aggressor ratio unavailable (0% NBBO coverage)".to_string())
    } else if coverage >= min_coverage {
        if strength >= min_agg {
            (
                0.05,
                format!("{}% NBBO coverage, {}% aggressive in the favorable direction", pct(coverage), pct(strength)),
            )
        } else {
            (
                -0.10,
                format!("{}% NBBO coverage, only {}% aggressive in the favorable direction", pct(coverage), pct(strength)),
            )
        }
    } else {
        (0.0, format!("{}% NBBO coverage (below minimum, aggressor ratio not weighted)", pct(coverage)))
    }
}

pub(crate) fn baseline_note(z: f64, n: i64, z_min_n: usize) -> String {
    if n >= z_min_n as i64 {
        format!("baseline z-score {:.2} over {} samples", z, n)
    } else {
        format!("baseline unavailable ({} samples, need {})", n, z_min_n)
    }
}
