use crate::classifiers::{baseline_note, multiple_bonus, z_bonus, Classifier, ClassifierEvaluation};
use crate::config::ClassifierConfig;
use crate::models::{clip01, Direction, FlowPacket, PacketKind};

/// Size or premium well above a contract's own baseline, on an expiry far
/// enough out that it reads as a conviction position rather than a
/// short-dated trade.
pub struct FarDatedConviction;

impl Classifier for FarDatedConviction {
    fn id(&self) -> &'static str {
        "far_dated_conviction"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Contract
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        let dte = packet.features.get_int("dte")?;
        if dte < cfg.far_dated_min_dte {
            return None;
        }
        let size = packet.features.get_int("total_size")? as u64;
        let premium = packet.features.get_num("total_premium")?;
        let z = packet.features.get_num("premium_z").unwrap_or(0.0);
        let qualifies = (size >= cfg.spike_min_size && premium >= cfg.spike_min_premium) || z >= cfg.spike_min_z;
        if !qualifies {
            return None;
        }

        let right = packet.features.get_str("option_right").unwrap_or("");
        let direction = match right {
            "C" => Direction::Bullish,
            "P" => Direction::Bearish,
            _ => Direction::Neutral,
        };

        let confidence = clip01(0.45 + multiple_bonus(premium, cfg.spike_min_premium, 0.15) + z_bonus(z, cfg.spike_min_z, 0.05)).min(0.95);
        let n = packet.features.get_int("premium_baseline_n").unwrap_or(0);
        Some(ClassifierEvaluation {
            confidence,
            direction,
            explanations: vec![
                format!("far-dated conviction trade: {} days to expiry, ${:.0} premium", dte, premium),
                baseline_note(z, n, cfg.z_min_baseline_n),
            ],
        })
    }
}
