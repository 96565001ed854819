use crate::classifiers::{baseline_note, multiple_bonus, z_bonus, Classifier, ClassifierEvaluation};
use crate::config::ClassifierConfig;
use crate::models::{clip01, Direction, FlowPacket, PacketKind};

/// A single contract printing well beyond its own recent baseline, in size,
/// premium, or both, without regard to direction.
pub struct UnusualContractSpike;

impl Classifier for UnusualContractSpike {
    fn id(&self) -> &'static str {
        "unusual_contract_spike"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Contract
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        let size = packet.features.get_int("total_size")? as u64;
        let premium = packet.features.get_num("total_premium")?;
        let premium_z = packet.features.get_num("premium_z").unwrap_or(0.0);
        let size_z = packet.features.get_num("size_z").unwrap_or(0.0);

        let qualifies = (size >= cfg.spike_min_size && premium >= cfg.spike_min_premium)
            || premium_z >= cfg.spike_min_z
            || size_z >= cfg.size_min_z;
        if !qualifies {
            return None;
        }

        let confidence = clip01(
            0.45 + multiple_bonus(premium, cfg.spike_min_premium, 0.15)
                + z_bonus(premium_z, cfg.spike_min_z, 0.05)
                + z_bonus(size_z, cfg.size_min_z, 0.05),
        )
        .min(0.95);

        let premium_n = packet.features.get_int("premium_baseline_n").unwrap_or(0);
        Some(ClassifierEvaluation {
            confidence,
            direction: Direction::Neutral,
            explanations: vec![
                format!("unusual activity: {} contracts, ${:.0} premium", size, premium),
                baseline_note(premium_z, premium_n, cfg.z_min_baseline_n),
            ],
        })
    }
}
