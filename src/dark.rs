//! C5 — equity print join and dark-pool inference.
//!
//! Joins each equity print against the latest equity quote to derive a
//! placement, then feeds a small sliding-window state machine that infers
//! absorbed blocks, stealth accumulation, and distribution, each gated on
//! quote freshness and a cooldown per underlying/type.

use std::collections::{HashMap, VecDeque};

use crate::models::{EquityPrint, EquityPrintJoin, InferredDark, Placement, DarkType};
use crate::quotes::EquityQuoteCache;

/// Builds the join record for one equity print. Pure — callers persist and
/// publish it, then feed it to [`DarkInferenceEngine::process`].
pub fn join_equity_print(print: &EquityPrint, quotes: &EquityQuoteCache, max_age_ms: i64) -> EquityPrintJoin {
    let lookup = quotes.lookup(&print.underlying_id, print.ts, max_age_ms);
    let placement = crate::placement::classify(
        print.price,
        &crate::quotes::OptionQuoteLookup {
            bid: lookup.bid,
            ask: lookup.ask,
            bid_size: None,
            ask_size: None,
            age_ms: lookup.age_ms,
            stale: lookup.stale,
            missing: lookup.missing,
        },
    );

    EquityPrintJoin {
        envelope: print.envelope.clone(),
        id: format!("equityjoin:{}:{}:{}", print.underlying_id, print.envelope.source_ts, print.envelope.seq),
        underlying_id: print.underlying_id.clone(),
        ts: print.ts,
        price: print.price,
        size: print.size,
        off_exchange: print.off_exchange_flag,
        placement,
        bid: lookup.bid,
        ask: lookup.ask,
        mid: lookup.mid(),
        spread: lookup.spread(),
        age_ms: lookup.age_ms,
        fresh: lookup.fresh(),
    }
}

#[derive(Debug, Clone)]
pub struct DarkConfig {
    pub min_block_size: u64,
    pub min_print_size: u64,
    pub window_ms: i64,
    pub min_count: usize,
    pub min_size: u64,
    pub cooldown_ms: i64,
    pub max_spread_pct: f64,
    pub max_evidence: usize,
}

impl Default for DarkConfig {
    fn default() -> Self {
        Self {
            min_block_size: 10_000,
            min_print_size: 2_000,
            window_ms: 120_000,
            min_count: 5,
            min_size: 15_000,
            cooldown_ms: 300_000,
            max_spread_pct: 0.02,
            max_evidence: 10,
        }
    }
}

struct AggressivePrint {
    id: String,
    ts: i64,
    size: u64,
    buy_side: bool,
}

#[derive(Default)]
struct UnderlyingState {
    window: VecDeque<AggressivePrint>,
    last_emit: HashMap<&'static str, i64>,
}

pub struct DarkInferenceEngine {
    cfg: DarkConfig,
    by_underlying: HashMap<String, UnderlyingState>,
}

impl DarkInferenceEngine {
    pub fn new(cfg: DarkConfig) -> Self {
        Self {
            cfg,
            by_underlying: HashMap::new(),
        }
    }

    pub fn process(&mut self, join: &EquityPrintJoin) -> Vec<InferredDark> {
        if !join.fresh {
            return Vec::new();
        }
        let (mid, spread) = match (join.mid, join.spread) {
            (Some(mid), Some(spread)) if mid > 0.0 => (mid, spread),
            _ => return Vec::new(),
        };
        let spread_pct = spread / mid;
        if spread_pct > self.cfg.max_spread_pct {
            return Vec::new();
        }

        let cfg = &self.cfg;
        let state = self.by_underlying.entry(join.underlying_id.clone()).or_default();
        let mut out = Vec::new();

        if join.off_exchange && join.placement == Placement::Mid && join.size >= cfg.min_block_size {
            let size_strength = ((join.size as f64) / (2.0 * cfg.min_block_size as f64)).min(1.0);
            let spread_strength = (1.0 - spread_pct / cfg.max_spread_pct).max(0.0);
            let confidence = crate::models::clip01(0.35 + 0.45 * size_strength + 0.20 * spread_strength);
            if cooldown_elapsed(state, "absorbed_block", join.ts, cfg.cooldown_ms) {
                state.last_emit.insert("absorbed_block", join.ts);
                out.push(InferredDark {
                    envelope: join.envelope.clone(),
                    underlying_id: join.underlying_id.clone(),
                    kind: DarkType::AbsorbedBlock,
                    confidence,
                    evidence_refs: vec![join.id.clone()],
                });
            }
        }

        if join.off_exchange && join.size >= cfg.min_print_size && join.placement.is_aggressive() {
            state.window.push_back(AggressivePrint {
                id: join.id.clone(),
                ts: join.ts,
                size: join.size,
                buy_side: join.placement.is_buy_side(),
            });
        }
        while let Some(front) = state.window.front() {
            if join.ts - front.ts > cfg.window_ms {
                state.window.pop_front();
            } else {
                break;
            }
        }

        let (buy_count, buy_size, sell_count, sell_size) = state.window.iter().fold(
            (0usize, 0u64, 0usize, 0u64),
            |(bc, bs, sc, ss), p| {
                if p.buy_side {
                    (bc + 1, bs + p.size, sc, ss)
                } else {
                    (bc, bs, sc + 1, ss + p.size)
                }
            },
        );

        if buy_count >= cfg.min_count && buy_size >= cfg.min_size {
            if cooldown_elapsed(state, "stealth_accumulation", join.ts, cfg.cooldown_ms) {
                state.last_emit.insert("stealth_accumulation", join.ts);
                let evidence = recent_ids(&state.window, true, cfg.max_evidence);
                out.push(InferredDark {
                    envelope: join.envelope.clone(),
                    underlying_id: join.underlying_id.clone(),
                    kind: DarkType::StealthAccumulation,
                    confidence: crate::models::clip01(0.4 + 0.1 * (buy_count as f64 / cfg.min_count as f64).min(2.0)),
                    evidence_refs: evidence,
                });
            }
        }

        if sell_count >= cfg.min_count && sell_size >= cfg.min_size {
            if cooldown_elapsed(state, "distribution", join.ts, cfg.cooldown_ms) {
                state.last_emit.insert("distribution", join.ts);
                let evidence = recent_ids(&state.window, false, cfg.max_evidence);
                out.push(InferredDark {
                    envelope: join.envelope.clone(),
                    underlying_id: join.underlying_id.clone(),
                    kind: DarkType::Distribution,
                    confidence: crate::models::clip01(0.4 + 0.1 * (sell_count as f64 / cfg.min_count as f64).min(2.0)),
                    evidence_refs: evidence,
                });
            }
        }

        out
    }
}

fn cooldown_elapsed(state: &UnderlyingState, kind: &'static str, now: i64, cooldown_ms: i64) -> bool {
    match state.last_emit.get(kind) {
        None => true,
        Some(last) => now - last >= cooldown_ms,
    }
}

fn recent_ids(window: &VecDeque<AggressivePrint>, buy_side: bool, max: usize) -> Vec<String> {
    window
        .iter()
        .rev()
        .filter(|p| p.buy_side == buy_side)
        .take(max)
        .map(|p| p.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Envelope;

    fn fresh_join(underlying: &str, ts: i64, price: f64, size: u64, off_exchange: bool, placement: Placement) -> EquityPrintJoin {
        EquityPrintJoin {
            envelope: Envelope::new(ts, ts, ts as u64, format!("t{}", ts)),
            id: format!("equityjoin:{}:{}:{}", underlying, ts, ts),
            underlying_id: underlying.to_string(),
            ts,
            price,
            size,
            off_exchange,
            placement,
            bid: Some(price - 0.01),
            ask: Some(price + 0.01),
            mid: Some(price),
            spread: Some(0.02),
            age_ms: Some(0),
            fresh: true,
        }
    }

    #[test]
    fn absorbed_block_requires_offexchange_mid_and_size() {
        let mut engine = DarkInferenceEngine::new(DarkConfig {
            min_block_size: 5_000,
            ..DarkConfig::default()
        });
        let join = fresh_join("AAPL", 1000, 150.0, 6_000, true, Placement::Mid);
        let out = engine.process(&join);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, DarkType::AbsorbedBlock);
    }

    #[test]
    fn absorbed_block_respects_cooldown() {
        let mut engine = DarkInferenceEngine::new(DarkConfig {
            min_block_size: 5_000,
            cooldown_ms: 10_000,
            ..DarkConfig::default()
        });
        let j1 = fresh_join("AAPL", 1000, 150.0, 6_000, true, Placement::Mid);
        let j2 = fresh_join("AAPL", 2000, 150.0, 6_000, true, Placement::Mid);
        assert_eq!(engine.process(&j1).len(), 1);
        assert_eq!(engine.process(&j2).len(), 0);
    }

    #[test]
    fn stale_or_wide_spread_prints_are_ignored() {
        let mut engine = DarkInferenceEngine::new(DarkConfig::default());
        let mut join = fresh_join("AAPL", 1000, 150.0, 50_000, true, Placement::Mid);
        join.fresh = false;
        assert!(engine.process(&join).is_empty());
    }

    #[test]
    fn stealth_accumulation_fires_on_repeated_buy_side_pressure() {
        let mut engine = DarkInferenceEngine::new(DarkConfig {
            min_count: 3,
            min_size: 9_000,
            window_ms: 60_000,
            ..DarkConfig::default()
        });
        for i in 0..3 {
            let ts = 1000 + i * 1000;
            let join = fresh_join("AAPL", ts, 150.0, 3_000, true, Placement::Aa);
            let out = engine.process(&join);
            if i == 2 {
                assert!(out.iter().any(|d| d.kind == DarkType::StealthAccumulation));
            }
        }
    }
}
