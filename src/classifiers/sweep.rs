use crate::classifiers::{aggressor_adjustment, baseline_note, multiple_bonus, z_bonus, Classifier, ClassifierEvaluation};
use crate::config::ClassifierConfig;
use crate::models::{clip01, Direction, FlowPacket, PacketKind};

/// Many contemporaneous prints on one call contract, printed with enough
/// size and urgency (premium or a baseline spike) to read as a sweep, and
/// leaning aggressively toward the buy side.
pub struct LargeBullishCallSweep;

impl Classifier for LargeBullishCallSweep {
    fn id(&self) -> &'static str {
        "large_bullish_call_sweep"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Contract
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("option_right") != Some("C") {
            return None;
        }
        let count = packet.features.get_int("count")? as u64;
        let premium = packet.features.get_num("total_premium")?;
        let z = packet.features.get_num("premium_z").unwrap_or(0.0);
        let n = packet.features.get_int("premium_baseline_n").unwrap_or(0);

        let qualifies = count >= cfg.sweep_min_count
            && (premium >= cfg.sweep_min_premium || (n >= cfg.z_min_baseline_n as i64 && z >= cfg.sweep_min_z));
        if !qualifies {
            return None;
        }

        let coverage = packet.features.get_num("nbbo_coverage_ratio").unwrap_or(0.0);
        let buy_strength = packet.features.get_num("nbbo_aggressive_buy_ratio").unwrap_or(0.0);
        let (adj, aggressor_note) = aggressor_adjustment(coverage, buy_strength, cfg.min_coverage, cfg.min_agg_ratio, true);

        let confidence = clip01(
            0.5 + multiple_bonus(premium, cfg.sweep_min_premium, 0.15) + z_bonus(z, cfg.sweep_min_z, 0.05) + adj,
        )
        .min(0.95);

        Some(ClassifierEvaluation {
            confidence,
            direction: Direction::Bullish,
            explanations: vec![
                format!("likely large bullish call sweep: {} prints, ${:.0} premium", count, premium),
                baseline_note(z, n, cfg.z_min_baseline_n),
                aggressor_note,
            ],
        })
    }
}

/// Mirror of [`LargeBullishCallSweep`] for puts, leaning aggressively
/// toward the sell side.
pub struct LargeBearishPutSweep;

impl Classifier for LargeBearishPutSweep {
    fn id(&self) -> &'static str {
        "large_bearish_put_sweep"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Contract
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("option_right") != Some("P") {
            return None;
        }
        let count = packet.features.get_int("count")? as u64;
        let premium = packet.features.get_num("total_premium")?;
        let z = packet.features.get_num("premium_z").unwrap_or(0.0);
        let n = packet.features.get_int("premium_baseline_n").unwrap_or(0);

        let qualifies = count >= cfg.sweep_min_count
            && (premium >= cfg.sweep_min_premium || (n >= cfg.z_min_baseline_n as i64 && z >= cfg.sweep_min_z));
        if !qualifies {
            return None;
        }

        let coverage = packet.features.get_num("nbbo_coverage_ratio").unwrap_or(0.0);
        let buy_strength = packet.features.get_num("nbbo_aggressive_buy_ratio").unwrap_or(0.0);
        let (adj, aggressor_note) = aggressor_adjustment(coverage, buy_strength, cfg.min_coverage, cfg.min_agg_ratio, true);

        let confidence = clip01(
            0.5 + multiple_bonus(premium, cfg.sweep_min_premium, 0.15) + z_bonus(z, cfg.sweep_min_z, 0.05) + adj,
        )
        .min(0.95);

        Some(ClassifierEvaluation {
            confidence,
            direction: Direction::Bearish,
            explanations: vec![
                format!("likely large bearish put sweep: {} prints, ${:.0} premium", count, premium),
                baseline_note(z, n, cfg.z_min_baseline_n),
                aggressor_note,
            ],
        })
    }
}
