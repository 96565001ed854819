//! C6 — structure summarizer.
//!
//! Looks at the legs recently closed on one underlying root and, when two
//! or more fall within the cluster window of each other, classifies the
//! shape they form (straddle/strangle/vertical/ladder/roll/multi-leg).

use std::collections::{BTreeSet, VecDeque};

use chrono::NaiveDate;

use crate::models::Right;

#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub contract_id: String,
    pub root: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub right: Right,
    pub end_ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureType {
    Straddle,
    Strangle,
    Vertical,
    Ladder,
    Roll,
    MultiLeg,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureType::Straddle => "straddle",
            StructureType::Strangle => "strangle",
            StructureType::Vertical => "vertical",
            StructureType::Ladder => "ladder",
            StructureType::Roll => "roll",
            StructureType::MultiLeg => "multi_leg",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureSummary {
    pub structure_type: StructureType,
    pub legs: usize,
    pub strikes: usize,
    pub strike_span: f64,
    pub rights: String,
    pub contract_ids: Vec<String>,
    pub from_expiry: Option<NaiveDate>,
    pub to_expiry: Option<NaiveDate>,
    pub strike_delta: Option<f64>,
}

fn strike_key(strike: f64) -> i64 {
    (strike * 1000.0).round() as i64
}

/// Classifies the structure formed by `legs` anchored around `anchor_end_ts`.
/// Returns `None` if fewer than two legs fall inside the window.
pub fn classify_structure(anchor_end_ts: i64, legs: &[Leg], window_ms: i64) -> Option<StructureSummary> {
    let eligible: Vec<&Leg> = legs
        .iter()
        .filter(|l| (l.end_ts - anchor_end_ts).abs() <= window_ms)
        .collect();
    if eligible.len() < 2 {
        return None;
    }

    let expiries: BTreeSet<NaiveDate> = eligible.iter().map(|l| l.expiry).collect();
    let rights: BTreeSet<&'static str> = eligible.iter().map(|l| l.right.as_str()).collect();
    let strike_keys: BTreeSet<i64> = eligible.iter().map(|l| strike_key(l.strike)).collect();

    let strikes_sorted: Vec<f64> = eligible.iter().map(|l| l.strike).collect();
    let min_strike = strikes_sorted.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_strike = strikes_sorted.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let structure_type = if expiries.len() == 1 {
        if rights.len() == 2 {
            if strike_keys.len() == 1 {
                StructureType::Straddle
            } else {
                StructureType::Strangle
            }
        } else if strike_keys.len() == 2 {
            StructureType::Vertical
        } else if strike_keys.len() >= 3 {
            StructureType::Ladder
        } else {
            StructureType::MultiLeg
        }
    } else if rights.len() == 1 && expiries.len() == 2 {
        StructureType::Roll
    } else {
        StructureType::MultiLeg
    };

    let (from_expiry, to_expiry, strike_delta) = if structure_type == StructureType::Roll {
        let from = *expiries.iter().next().unwrap();
        let to = *expiries.iter().next_back().unwrap();
        let from_leg = eligible.iter().filter(|l| l.expiry == from).max_by_key(|l| l.end_ts);
        let to_leg = eligible.iter().filter(|l| l.expiry == to).max_by_key(|l| l.end_ts);
        let delta = match (from_leg, to_leg) {
            (Some(f), Some(t)) => Some(t.strike - f.strike),
            _ => None,
        };
        (Some(from), Some(to), delta)
    } else {
        (None, None, None)
    };

    let mut contract_ids: Vec<String> = eligible.iter().map(|l| l.contract_id.clone()).collect();
    contract_ids.sort();
    contract_ids.dedup();

    let rights_str = if rights.len() == 2 {
        "C/P".to_string()
    } else {
        rights.into_iter().next().unwrap_or("").to_string()
    };

    Some(StructureSummary {
        structure_type,
        legs: eligible.len(),
        strikes: strike_keys.len(),
        strike_span: if strike_keys.len() > 1 { max_strike - min_strike } else { 0.0 },
        rights: rights_str,
        contract_ids,
        from_expiry,
        to_expiry,
        strike_delta,
    })
}

/// Ring buffer of recently closed legs per underlying root, capped at a
/// small fixed size so structure detection only ever looks at recent
/// activity.
pub struct RecentLegsRegistry {
    capacity: usize,
    by_root: std::collections::HashMap<String, VecDeque<Leg>>,
}

impl RecentLegsRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            by_root: std::collections::HashMap::new(),
        }
    }

    pub fn record(&mut self, leg: Leg) {
        let entry = self.by_root.entry(leg.root.clone()).or_default();
        entry.push_back(leg);
        while entry.len() > self.capacity {
            entry.pop_front();
        }
    }

    pub fn legs_for(&self, root: &str, anchor_end_ts: i64, window_ms: i64) -> Vec<Leg> {
        match self.by_root.get(root) {
            None => Vec::new(),
            Some(legs) => legs
                .iter()
                .filter(|l| (l.end_ts - anchor_end_ts).abs() <= window_ms)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(contract_id: &str, expiry: &str, strike: f64, right: Right, end_ts: i64) -> Leg {
        Leg {
            contract_id: contract_id.to_string(),
            root: "AAPL".to_string(),
            expiry: NaiveDate::parse_from_str(expiry, "%Y-%m-%d").unwrap(),
            strike,
            right,
            end_ts,
        }
    }

    #[test]
    fn single_leg_is_no_structure() {
        let legs = vec![leg("a", "2026-03-20", 185.0, Right::Call, 1000)];
        assert!(classify_structure(1000, &legs, 500).is_none());
    }

    #[test]
    fn same_strike_both_rights_is_straddle() {
        let legs = vec![
            leg("a", "2026-03-20", 185.0, Right::Call, 1000),
            leg("b", "2026-03-20", 185.0, Right::Put, 1200),
        ];
        let s = classify_structure(1000, &legs, 500).unwrap();
        assert_eq!(s.structure_type, StructureType::Straddle);
    }

    #[test]
    fn different_strikes_both_rights_is_strangle() {
        let legs = vec![
            leg("a", "2026-03-20", 190.0, Right::Call, 1000),
            leg("b", "2026-03-20", 180.0, Right::Put, 1200),
        ];
        let s = classify_structure(1000, &legs, 500).unwrap();
        assert_eq!(s.structure_type, StructureType::Strangle);
    }

    #[test]
    fn two_strikes_one_right_is_vertical() {
        let legs = vec![
            leg("a", "2026-03-20", 190.0, Right::Call, 1000),
            leg("b", "2026-03-20", 185.0, Right::Call, 1200),
        ];
        let s = classify_structure(1000, &legs, 500).unwrap();
        assert_eq!(s.structure_type, StructureType::Vertical);
    }

    #[test]
    fn three_strikes_one_right_is_ladder() {
        let legs = vec![
            leg("a", "2026-03-20", 190.0, Right::Call, 1000),
            leg("b", "2026-03-20", 185.0, Right::Call, 1100),
            leg("c", "2026-03-20", 180.0, Right::Call, 1200),
        ];
        let s = classify_structure(1000, &legs, 500).unwrap();
        assert_eq!(s.structure_type, StructureType::Ladder);
    }

    #[test]
    fn two_expiries_one_right_is_roll() {
        let legs = vec![
            leg("a", "2026-03-20", 185.0, Right::Call, 1000),
            leg("b", "2026-04-17", 190.0, Right::Call, 1200),
        ];
        let s = classify_structure(1000, &legs, 500).unwrap();
        assert_eq!(s.structure_type, StructureType::Roll);
        assert_eq!(s.strike_delta, Some(5.0));
    }

    #[test]
    fn legs_outside_window_are_excluded() {
        let legs = vec![
            leg("a", "2026-03-20", 185.0, Right::Call, 1000),
            leg("b", "2026-03-20", 185.0, Right::Put, 5000),
        ];
        assert!(classify_structure(1000, &legs, 500).is_none());
    }

    #[test]
    fn registry_caps_ring_buffer() {
        let mut reg = RecentLegsRegistry::new(2);
        reg.record(leg("a", "2026-03-20", 185.0, Right::Call, 1000));
        reg.record(leg("b", "2026-03-20", 186.0, Right::Call, 1100));
        reg.record(leg("c", "2026-03-20", 187.0, Right::Call, 1200));
        let legs = reg.legs_for("AAPL", 1200, 10_000);
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].contract_id, "b");
    }
}
