//! C3 — option NBBO and equity quote caches.
//!
//! Two `parking_lot::RwLock`-guarded maps, replace-if-newer semantics keyed
//! on `(ts, seq)`. Any worker may read; only the owning stream's worker
//! writes, per the ownership rule in the concurrency model.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::models::{EquityQuote, OptionNbbo};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionQuoteLookup {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub bid_size: Option<u64>,
    pub ask_size: Option<u64>,
    pub age_ms: Option<i64>,
    pub stale: bool,
    pub missing: bool,
}

impl OptionQuoteLookup {
    pub fn fresh(&self) -> bool {
        !self.missing && !self.stale
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some((a + b) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some((a - b).max(0.0)),
            _ => None,
        }
    }
}

pub struct OptionNbboCache {
    quotes: RwLock<HashMap<String, OptionNbbo>>,
}

impl OptionNbboCache {
    pub fn new() -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the cached snapshot for this contract if `nbbo` is at least
    /// as new as what's on file. Returns `true` if it was accepted.
    pub fn update(&self, nbbo: OptionNbbo) -> bool {
        let mut quotes = self.quotes.write();
        let accept = match quotes.get(&nbbo.option_contract_id) {
            None => true,
            Some(existing) => (nbbo.ts, nbbo.envelope.seq) >= (existing.ts, existing.envelope.seq),
        };
        if accept {
            quotes.insert(nbbo.option_contract_id.clone(), nbbo);
        }
        accept
    }

    pub fn lookup(&self, contract_id: &str, at_ts: i64, max_age_ms: i64) -> OptionQuoteLookup {
        let quotes = self.quotes.read();
        match quotes.get(contract_id) {
            None => OptionQuoteLookup {
                bid: None,
                ask: None,
                bid_size: None,
                ask_size: None,
                age_ms: None,
                stale: false,
                missing: true,
            },
            Some(q) => {
                let age_ms = (at_ts - q.ts).max(0);
                let stale = age_ms > max_age_ms;
                OptionQuoteLookup {
                    bid: Some(q.bid),
                    ask: Some(q.ask),
                    bid_size: Some(q.bid_size),
                    ask_size: Some(q.ask_size),
                    age_ms: Some(age_ms),
                    stale,
                    missing: false,
                }
            }
        }
    }
}

impl Default for OptionNbboCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityQuoteLookup {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub age_ms: Option<i64>,
    pub stale: bool,
    pub missing: bool,
}

impl EquityQuoteLookup {
    pub fn fresh(&self) -> bool {
        !self.missing && !self.stale
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some((a + b) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) => Some((a - b).max(0.0)),
            _ => None,
        }
    }
}

pub struct EquityQuoteCache {
    quotes: RwLock<HashMap<String, EquityQuote>>,
}

impl EquityQuoteCache {
    pub fn new() -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
        }
    }

    pub fn update(&self, quote: EquityQuote) -> bool {
        let mut quotes = self.quotes.write();
        let accept = match quotes.get(&quote.underlying_id) {
            None => true,
            Some(existing) => (quote.ts, quote.envelope.seq) >= (existing.ts, existing.envelope.seq),
        };
        if accept {
            quotes.insert(quote.underlying_id.clone(), quote);
        }
        accept
    }

    pub fn lookup(&self, underlying_id: &str, at_ts: i64, max_age_ms: i64) -> EquityQuoteLookup {
        let quotes = self.quotes.read();
        match quotes.get(underlying_id) {
            None => EquityQuoteLookup {
                bid: None,
                ask: None,
                age_ms: None,
                stale: false,
                missing: true,
            },
            Some(q) => {
                let age_ms = (at_ts - q.ts).max(0);
                let stale = age_ms > max_age_ms;
                EquityQuoteLookup {
                    bid: Some(q.bid),
                    ask: Some(q.ask),
                    age_ms: Some(age_ms),
                    stale,
                    missing: false,
                }
            }
        }
    }
}

impl Default for EquityQuoteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Envelope;

    fn nbbo(ts: i64, seq: u64, bid: f64, ask: f64) -> OptionNbbo {
        OptionNbbo {
            envelope: Envelope::new(ts, ts, seq, "t"),
            ts,
            option_contract_id: "AAPL-2026-03-20-185-C".into(),
            bid,
            ask,
            bid_size: 10,
            ask_size: 10,
        }
    }

    #[test]
    fn missing_when_never_seen() {
        let cache = OptionNbboCache::new();
        let lookup = cache.lookup("AAPL-2026-03-20-185-C", 1000, 500);
        assert!(lookup.missing);
    }

    #[test]
    fn stale_past_max_age() {
        let cache = OptionNbboCache::new();
        cache.update(nbbo(1000, 1, 1.0, 1.2));
        let lookup = cache.lookup("AAPL-2026-03-20-185-C", 2000, 500);
        assert!(lookup.stale);
        assert!(!lookup.missing);
    }

    #[test]
    fn rejects_out_of_order_update() {
        let cache = OptionNbboCache::new();
        cache.update(nbbo(2000, 2, 1.0, 1.2));
        let accepted = cache.update(nbbo(1000, 1, 5.0, 5.2));
        assert!(!accepted);
        let lookup = cache.lookup("AAPL-2026-03-20-185-C", 2000, 500);
        assert_eq!(lookup.bid, Some(1.0));
    }
}
