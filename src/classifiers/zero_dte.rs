use crate::classifiers::{baseline_note, multiple_bonus, Classifier, ClassifierEvaluation};
use crate::config::ClassifierConfig;
use crate::models::{clip01, Direction, FlowPacket, PacketKind};

/// Large same-day-expiry flow struck close to the money — the combination
/// that drives outsized gamma exposure for market makers on the other side.
pub struct ZeroDteGammaPunch;

impl Classifier for ZeroDteGammaPunch {
    fn id(&self) -> &'static str {
        "zero_dte_gamma_punch"
    }

    fn family(&self) -> PacketKind {
        PacketKind::Contract
    }

    fn evaluate(&self, packet: &FlowPacket, cfg: &ClassifierConfig) -> Option<ClassifierEvaluation> {
        let dte = packet.features.get_int("dte")?;
        if dte != 0 {
            return None;
        }
        let strike = packet.features.get_num("option_strike")?;
        let underlying_mid = packet.features.get_num("underlying_mid")?;
        if underlying_mid <= 0.0 {
            return None;
        }
        let atm_pct = ((strike - underlying_mid) / underlying_mid).abs();
        if atm_pct > cfg.zero_dte_max_atm_pct {
            return None;
        }

        let size = packet.features.get_int("total_size")? as u64;
        let premium = packet.features.get_num("total_premium")?;
        if size < cfg.zero_dte_min_size || premium < cfg.zero_dte_min_premium {
            return None;
        }

        let right = packet.features.get_str("option_right").unwrap_or("");
        let direction = match right {
            "C" => Direction::Bullish,
            "P" => Direction::Bearish,
            _ => Direction::Neutral,
        };

        let confidence = clip01(0.5 + multiple_bonus(premium, cfg.zero_dte_min_premium, 0.15) + (cfg.zero_dte_max_atm_pct - atm_pct).max(0.0) * 5.0).min(0.95);
        let n = packet.features.get_int("premium_baseline_n").unwrap_or(0);
        let z = packet.features.get_num("premium_z").unwrap_or(0.0);
        Some(ClassifierEvaluation {
            confidence,
            direction,
            explanations: vec![
                format!("0DTE gamma punch: strike ${:.2} within {:.2}% of spot, ${:.0} premium", strike, atm_pct * 100.0, premium),
                baseline_note(z, n, cfg.z_min_baseline_n),
            ],
        })
    }
}
