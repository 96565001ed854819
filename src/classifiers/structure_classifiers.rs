use crate::classifiers::{baseline_note, multiple_bonus, z_bonus, Classifier, ClassifierEvaluation};
use crate::config::ClassifierConfig;
use crate::models::{clip01, Direction, FlowPacket, PacketKind};

/// Evaluate only on structure packets — the per-Open-Question decision to
/// keep structure-family classifiers off contract packets (which still
/// carry `structure_*` tags for observability but aren't scored by these).
pub struct StraddleClassifier;

impl Classifier for StraddleClassifier {
    fn id(&self) -> &'static str {
        "straddle"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Structure
    }

    fn evaluate(&self, packet: &FlowPacket, _cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("structure_type") != Some("straddle") {
            return None;
        }
        let legs = packet.features.get_int("structure_legs").unwrap_or(0);
        Some(ClassifierEvaluation {
            confidence: clip01(0.55),
            direction: Direction::Neutral,
            explanations: vec![format!("straddle across {} legs at a common strike", legs)],
        })
    }
}

pub struct StrangleClassifier;

impl Classifier for StrangleClassifier {
    fn id(&self) -> &'static str {
        "strangle"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Structure
    }

    fn evaluate(&self, packet: &FlowPacket, _cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("structure_type") != Some("strangle") {
            return None;
        }
        let span = packet.features.get_num("structure_strike_span").unwrap_or(0.0);
        Some(ClassifierEvaluation {
            confidence: clip01(0.5),
            direction: Direction::Neutral,
            explanations: vec![format!("strangle spanning ${:.2} of strikes", span)],
        })
    }
}

/// Two strikes, one right, one expiry — directionality comes from which
/// side of the structure is being bought aggressively.
pub struct VerticalSpreadClassifier;

impl Classifier for VerticalSpreadClassifier {
    fn id(&self) -> &'static str {
        "vertical_spread"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Structure
    }

    fn evaluate(&self, packet: &FlowPacket, _cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("structure_type") != Some("vertical") {
            return None;
        }
        let right = packet.features.get_str("structure_rights").unwrap_or("");
        let direction = match right {
            "C" => Direction::Bullish,
            "P" => Direction::Bearish,
            _ => Direction::Neutral,
        };
        Some(ClassifierEvaluation {
            confidence: clip01(0.55),
            direction,
            explanations: vec![format!("vertical spread in {} options", right)],
        })
    }
}

/// Three or more strikes, one right, one expiry, printed with enough size
/// or baseline deviation to read as deliberate accumulation rather than
/// incidental multi-strike flow.
pub struct LadderAccumulationClassifier;

impl Classifier for LadderAccumulationClassifier {
    fn id(&self) -> &'static str {
        "ladder_accumulation"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Structure
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("structure_type") != Some("ladder") {
            return None;
        }
        let strikes = packet.features.get_int("structure_strikes").unwrap_or(0);
        if (strikes as usize) < cfg.ladder_min_strikes {
            return None;
        }
        let right = packet.features.get_str("structure_rights").unwrap_or("");
        let direction = match right {
            "C" => Direction::Bullish,
            "P" => Direction::Bearish,
            _ => Direction::Neutral,
        };

        let premium = packet.features.get_num("total_premium").unwrap_or(0.0);
        let z = packet.features.get_num("premium_z").unwrap_or(0.0);
        let confidence = clip01(
            0.45 + multiple_bonus(premium, cfg.spike_min_premium, 0.15) + z_bonus(z, cfg.spike_min_z, 0.05) + 0.05 * strikes.min(5) as f64 / 5.0,
        )
        .min(0.95);

        let n = packet.features.get_int("premium_baseline_n").unwrap_or(0);
        Some(ClassifierEvaluation {
            confidence,
            direction,
            explanations: vec![
                format!("ladder accumulation across {} strikes in {} options", strikes, right),
                baseline_note(z, n, cfg.z_min_baseline_n),
            ],
        })
    }
}
