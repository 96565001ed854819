//! C4 — NBBO placement classifier.
//!
//! Buckets a print's price against the posted quote at the time it traded
//! into one of AA/A/MID/B/BB/STALE/MISSING. Pure function, no state.

use crate::models::Placement;
use crate::quotes::OptionQuoteLookup;

/// Classifies an option print against the NBBO snapshot looked up for it.
pub fn classify(price: f64, quote: &OptionQuoteLookup) -> Placement {
    if quote.missing {
        return Placement::Missing;
    }
    let (bid, ask) = match (quote.bid, quote.ask) {
        (Some(b), Some(a)) if a > 0.0 => (b, a),
        _ => return Placement::Missing,
    };
    if quote.stale {
        return Placement::Stale;
    }

    let spread = (ask - bid).max(0.0);
    let eps = (spread * 0.05).max(0.01);

    if price > ask + eps {
        Placement::Aa
    } else if price >= ask - eps {
        Placement::A
    } else if price < bid - eps {
        Placement::Bb
    } else if price <= bid + eps {
        Placement::B
    } else {
        Placement::Mid
    }
}
