//! C10 — alert scorer.
//!
//! Turns a packet's classifier hits into one bundled alert, scored 0-100
//! from premium size, peak classifier confidence, and hit count. One alert
//! per packet; no cross-packet aggregation.

use crate::models::{AlertEvent, ClassifierHit, Envelope, FlowPacket, Severity};

pub fn score_alert(packet: &FlowPacket, hits: &[ClassifierHit]) -> AlertEvent {
    let total_premium = packet.features.get_num("total_premium").unwrap_or(0.0);
    let premium_score = (total_premium / 1000.0).round().min(70.0);

    let max_confidence = hits.iter().map(|h| h.confidence).fold(0.0_f64, f64::max);
    let confidence_score = (max_confidence * 20.0).round();

    let hit_score = ((hits.len() as f64) * 5.0).min(20.0);

    let score = (premium_score + confidence_score + hit_score).clamp(0.0, 100.0) as u32;
    let severity = if score >= 80 {
        Severity::High
    } else if score >= 45 {
        Severity::Medium
    } else {
        Severity::Low
    };

    let mut evidence_refs = vec![packet.id.clone()];
    evidence_refs.extend(packet.members.clone());

    AlertEvent {
        envelope: Envelope::new(
            packet.envelope.source_ts,
            packet.envelope.ingest_ts,
            packet.envelope.seq,
            packet.envelope.trace_id.clone(),
        ),
        packet_id: packet.id.clone(),
        score,
        severity,
        hits: hits.to_vec(),
        evidence_refs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassifierHit, Direction, FeatureBag, JoinQuality, PacketKind};

    fn packet(total_premium: f64) -> FlowPacket {
        let mut features = FeatureBag::new();
        features.set_num("total_premium", total_premium);
        FlowPacket {
            envelope: Envelope::new(0, 0, 1, "t1"),
            id: "flowpacket:c1:0:0".to_string(),
            packet_kind: PacketKind::Contract,
            members: vec!["t1".to_string()],
            features,
            join_quality: JoinQuality::default(),
        }
    }

    fn hit(confidence: f64) -> ClassifierHit {
        ClassifierHit {
            envelope: Envelope::new(0, 0, 1, "t1"),
            classifier_id: "unusual_contract_spike".to_string(),
            packet_id: "flowpacket:c1:0:0".to_string(),
            confidence,
            direction: Direction::Neutral,
            explanations: vec![],
        }
    }

    #[test]
    fn low_premium_no_hits_is_low_severity() {
        let p = packet(500.0);
        let alert = score_alert(&p, &[]);
        assert_eq!(alert.severity, Severity::Low);
    }

    #[test]
    fn boundary_at_45_is_medium() {
        let p = packet(45_000.0);
        let alert = score_alert(&p, &[]);
        assert_eq!(alert.score, 45);
        assert_eq!(alert.severity, Severity::Medium);
    }

    #[test]
    fn boundary_at_80_is_high() {
        let p = packet(60_000.0);
        let alert = score_alert(&p, &[hit(0.75)]);
        assert_eq!(alert.score, 80);
        assert_eq!(alert.severity, Severity::High);
    }

    #[test]
    fn score_is_clamped_at_100() {
        let p = packet(200_000.0);
        let alert = score_alert(&p, &[hit(0.95), hit(0.95), hit(0.95), hit(0.95), hit(0.95)]);
        assert_eq!(alert.score, 100);
    }
}
