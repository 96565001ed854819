//! C7 — cluster engine.
//!
//! Groups consecutive prints on the same contract that fall within a
//! rolling window into one transient cluster, flushing it once a later
//! print arrives either for a different contract past its window or for the
//! same contract past its own window.

use std::collections::HashMap;

use crate::models::{OptionPrint, Placement};
use crate::quotes::OptionNbboCache;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementCounts {
    pub aa: u64,
    pub a: u64,
    pub mid: u64,
    pub b: u64,
    pub bb: u64,
    pub stale: u64,
    pub missing: u64,
}

impl PlacementCounts {
    pub fn increment(&mut self, p: Placement) {
        match p {
            Placement::Aa => self.aa += 1,
            Placement::A => self.a += 1,
            Placement::Mid => self.mid += 1,
            Placement::B => self.b += 1,
            Placement::Bb => self.bb += 1,
            Placement::Stale => self.stale += 1,
            Placement::Missing => self.missing += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.aa + self.a + self.mid + self.b + self.bb + self.stale + self.missing
    }

    pub fn usable_total(&self) -> u64 {
        self.aa + self.a + self.mid + self.b + self.bb
    }

    pub fn aggressive_total(&self) -> u64 {
        self.aa + self.a + self.b + self.bb
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub contract_id: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub start_source_ts: i64,
    pub end_ingest_ts: i64,
    pub end_seq: u64,
    pub members: Vec<String>,
    pub total_size: u64,
    pub total_premium: f64,
    pub first_price: f64,
    pub last_price: f64,
    pub placements: PlacementCounts,
}

impl Cluster {
    fn new(print: &OptionPrint, placement: Placement) -> Self {
        let mut c = Cluster {
            contract_id: print.option_contract_id.clone(),
            start_ts: print.ts,
            end_ts: print.ts,
            start_source_ts: print.envelope.source_ts,
            end_ingest_ts: print.envelope.ingest_ts,
            end_seq: print.envelope.seq,
            members: Vec::new(),
            total_size: 0,
            total_premium: 0.0,
            first_price: print.price,
            last_price: print.price,
            placements: PlacementCounts::default(),
        };
        c.fold_in(print, placement);
        c
    }

    fn fold_in(&mut self, print: &OptionPrint, placement: Placement) {
        self.end_ts = self.end_ts.max(print.ts);
        self.end_ingest_ts = self.end_ingest_ts.max(print.envelope.ingest_ts);
        self.end_seq = self.end_seq.max(print.envelope.seq);
        self.members.push(print.envelope.trace_id.clone());
        self.total_size += print.size;
        self.total_premium += print.price * print.size as f64;
        self.last_price = print.price;
        self.placements.increment(placement);
    }
}

pub struct ClusterEngine {
    window_ms: i64,
    clusters: HashMap<String, Cluster>,
}

impl ClusterEngine {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            clusters: HashMap::new(),
        }
    }

    /// Folds one print into the cluster map, returning any clusters flushed
    /// as a side effect. Flushes triggered by this print happen before the
    /// print itself is appended, so other contracts' flushed clusters always
    /// observe timestamps strictly less than this print's.
    pub fn ingest(&mut self, print: OptionPrint, nbbo: &OptionNbboCache, max_nbbo_age_ms: i64) -> Vec<Cluster> {
        let contract_id = print.option_contract_id.clone();
        let t = print.ts;
        let mut flushed = Vec::new();

        let stale_keys: Vec<String> = self
            .clusters
            .iter()
            .filter(|(k, c)| **k != contract_id && t - c.end_ts > self.window_ms)
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale_keys {
            if let Some(c) = self.clusters.remove(&k) {
                flushed.push(c);
            }
        }

        let lookup = nbbo.lookup(&contract_id, t, max_nbbo_age_ms);
        let placement = crate::placement::classify(print.price, &lookup);

        match self.clusters.remove(&contract_id) {
            None => {
                self.clusters.insert(contract_id, Cluster::new(&print, placement));
            }
            Some(mut existing) => {
                if t - existing.start_ts <= self.window_ms {
                    existing.fold_in(&print, placement);
                    self.clusters.insert(contract_id, existing);
                } else {
                    flushed.push(existing);
                    self.clusters.insert(contract_id, Cluster::new(&print, placement));
                }
            }
        }

        flushed
    }

    /// Flushes every live cluster, e.g. on graceful shutdown.
    pub fn drain(&mut self) -> Vec<Cluster> {
        self.clusters.drain().map(|(_, c)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Envelope;

    fn print(ts: i64, seq: u64, contract: &str, price: f64, size: u64) -> OptionPrint {
        OptionPrint {
            envelope: Envelope::new(ts, ts, seq, format!("t{}", seq)),
            ts,
            option_contract_id: contract.to_string(),
            price,
            size,
            exchange: "X".to_string(),
            conditions: vec![],
        }
    }

    #[test]
    fn same_contract_within_window_merges() {
        let nbbo = OptionNbboCache::new();
        let mut engine = ClusterEngine::new(1000);
        let flushed = engine.ingest(print(0, 1, "c1", 1.0, 10), &nbbo, 500);
        assert!(flushed.is_empty());
        let flushed = engine.ingest(print(500, 2, "c1", 1.1, 20), &nbbo, 500);
        assert!(flushed.is_empty());
        let all = engine.drain();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].total_size, 30);
        assert_eq!(all[0].members.len(), 2);
    }

    #[test]
    fn same_contract_past_window_flushes_old_cluster() {
        let nbbo = OptionNbboCache::new();
        let mut engine = ClusterEngine::new(1000);
        engine.ingest(print(0, 1, "c1", 1.0, 10), &nbbo, 500);
        let flushed = engine.ingest(print(2000, 2, "c1", 1.0, 10), &nbbo, 500);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].start_ts, 0);
    }

    #[test]
    fn other_contract_past_window_flushes_before_append() {
        let nbbo = OptionNbboCache::new();
        let mut engine = ClusterEngine::new(1000);
        engine.ingest(print(0, 1, "c1", 1.0, 10), &nbbo, 500);
        let flushed = engine.ingest(print(2000, 2, "c2", 1.0, 10), &nbbo, 500);
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].contract_id, "c1");
        assert!(flushed[0].end_ts < 2000);
    }

    #[test]
    fn end_ts_extends_to_max_on_out_of_order_within_window() {
        let nbbo = OptionNbboCache::new();
        let mut engine = ClusterEngine::new(1000);
        engine.ingest(print(500, 1, "c1", 1.0, 10), &nbbo, 500);
        engine.ingest(print(100, 2, "c1", 1.0, 10), &nbbo, 500);
        let all = engine.drain();
        assert_eq!(all[0].end_ts, 500);
        assert_eq!(all[0].start_ts, 500);
    }
}
