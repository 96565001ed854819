use crate::classifiers::{aggressor_adjustment, baseline_note, multiple_bonus, z_bonus, Classifier, ClassifierEvaluation};
use crate::config::ClassifierConfig;
use crate::models::{clip01, Direction, FlowPacket, PacketKind};

fn spike_qualifies(packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<(u64, f64, f64)> {
    let size = packet.features.get_int("total_size")? as u64;
    let premium = packet.features.get_num("total_premium")?;
    let premium_z = packet.features.get_num("premium_z").unwrap_or(0.0);
    let qualifies = (size >= cfg.spike_min_size && premium >= cfg.spike_min_premium) || premium_z >= cfg.spike_min_z;
    if qualifies {
        Some((size, premium, premium_z))
    } else {
        None
    }
}

/// Heavy sell-side pressure on a call contract at size — reads as covered
/// calls being written or overwritten against existing stock.
pub struct LargeCallSellOverwrite;

impl Classifier for LargeCallSellOverwrite {
    fn id(&self) -> &'static str {
        "large_call_sell_overwrite"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Contract
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("option_right") != Some("C") {
            return None;
        }
        let coverage = packet.features.get_num("nbbo_coverage_ratio").unwrap_or(0.0);
        let sell_strength = packet.features.get_num("nbbo_aggressive_sell_ratio").unwrap_or(0.0);
        if coverage < cfg.min_coverage || sell_strength < cfg.min_agg_ratio {
            return None;
        }
        let (size, premium, z) = spike_qualifies(packet, cfg)?;

        let (adj, aggressor_note) = aggressor_adjustment(coverage, sell_strength, cfg.min_coverage, cfg.min_agg_ratio, true);
        let confidence = clip01(0.5 + multiple_bonus(premium, cfg.spike_min_premium, 0.15) + z_bonus(z, cfg.spike_min_z, 0.05) + adj).min(0.95);

        let n = packet.features.get_int("premium_baseline_n").unwrap_or(0);
        Some(ClassifierEvaluation {
            confidence,
            direction: Direction::Bearish,
            explanations: vec![
                format!("likely call overwrite: {} contracts sold at size, ${:.0} premium", size, premium),
                baseline_note(z, n, cfg.z_min_baseline_n),
                aggressor_note,
            ],
        })
    }
}

/// Heavy sell-side pressure on a put contract at size — reads as cash-
/// secured puts being written.
pub struct LargePutSellWrite;

impl Classifier for LargePutSellWrite {
    fn id(&self) -> &'static str {
        "large_put_sell_write"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Contract
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        if packet.features.get_str("option_right") != Some("P") {
            return None;
        }
        let coverage = packet.features.get_num("nbbo_coverage_ratio").unwrap_or(0.0);
        let sell_strength = packet.features.get_num("nbbo_aggressive_sell_ratio").unwrap_or(0.0);
        if coverage < cfg.min_coverage || sell_strength < cfg.min_agg_ratio {
            return None;
        }
        let (size, premium, z) = spike_qualifies(packet, cfg)?;

        let (adj, aggressor_note) = aggressor_adjustment(coverage, sell_strength, cfg.min_coverage, cfg.min_agg_ratio, true);
        let confidence = clip01(0.5 + multiple_bonus(premium, cfg.spike_min_premium, 0.15) + z_bonus(z, cfg.spike_min_z, 0.05) + adj).min(0.95);

        let n = packet.features.get_int("premium_baseline_n").unwrap_or(0);
        Some(ClassifierEvaluation {
            confidence,
            direction: Direction::Bullish,
            explanations: vec![
                format!("likely put sell-write: {} contracts sold at size, ${:.0} premium", size, premium),
                baseline_note(z, n, cfg.z_min_baseline_n),
                aggressor_note,
            ],
        })
    }
}
