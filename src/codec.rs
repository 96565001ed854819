//! C1 — contract ID codec.
//!
//! Parses the two option-contract-identifier shapes seen on the wire (OCC
//! fixed-width and a dashed human-readable form) into a typed [`ContractId`].
//! Never panics: an unparseable identifier is `None`, and callers are
//! expected to degrade (skip identity-derived features) rather than treat it
//! as fatal.

use chrono::NaiveDate;

use crate::models::Right;

#[derive(Debug, Clone, PartialEq)]
pub struct ContractId {
    pub root: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    pub right: Right,
}

impl ContractId {
    /// Canonical dashed rendering, e.g. `AAPL-2026-03-20-185-C`.
    pub fn format_dashed(&self) -> String {
        let strike = format_strike(self.strike);
        format!(
            "{}-{:04}-{:02}-{:02}-{}-{}",
            self.root,
            self.expiry.format("%Y"),
            self.expiry.format("%m"),
            self.expiry.format("%d"),
            strike,
            self.right.as_str()
        )
    }
}

fn format_strike(strike: f64) -> String {
    let mut s = format!("{:.3}", strike);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

/// Parses a contract identifier in either the OCC fixed-width form or the
/// dashed form. Returns `None` rather than erroring on anything malformed.
pub fn parse(raw: &str) -> Option<ContractId> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains('-') {
        if let Some(id) = parse_dashed(raw) {
            return Some(id);
        }
    }
    parse_occ(raw)
}

fn parse_dashed(raw: &str) -> Option<ContractId> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() < 6 {
        return None;
    }
    let n = parts.len();
    let right = Right::from_char(parts[n - 1].chars().next()?)?;
    let strike: f64 = parts[n - 2].parse().ok()?;
    let day: u32 = parts[n - 3].parse().ok()?;
    let month: u32 = parts[n - 4].parse().ok()?;
    let year: i32 = parts[n - 5].parse().ok()?;
    let root_parts = &parts[..n - 5];
    if root_parts.is_empty() || root_parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let expiry = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(ContractId {
        root: root_parts.join("-"),
        expiry,
        strike,
        right,
    })
}

/// OCC fixed-width form: `{ROOT}{YYMMDD}{C|P}{STRIKE*1000, 8 digits}`, root
/// left-padded/trimmed to whatever width the feed uses.
fn parse_occ(raw: &str) -> Option<ContractId> {
    if raw.len() <= 15 {
        return None;
    }
    let bytes_len = raw.len();
    let (root_part, tail) = raw.split_at(bytes_len - 15);
    let root = root_part.trim();
    if root.is_empty() {
        return None;
    }
    let date_str = &tail[0..6];
    let right_char = tail[6..7].chars().next()?;
    let strike_str = &tail[7..15];

    let right = Right::from_char(right_char)?;
    let yy: i32 = date_str[0..2].parse().ok()?;
    let mm: u32 = date_str[2..4].parse().ok()?;
    let dd: u32 = date_str[4..6].parse().ok()?;
    let expiry = NaiveDate::from_ymd_opt(2000 + yy, mm, dd)?;
    let strike_raw: i64 = strike_str.parse().ok()?;
    let strike = strike_raw as f64 / 1000.0;

    Some(ContractId {
        root: root.to_string(),
        expiry,
        strike,
        right,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_occ_call() {
        let id = parse("AAPL260320C00185000").unwrap();
        assert_eq!(id.root, "AAPL");
        assert_eq!(id.expiry, NaiveDate::from_ymd_opt(2026, 3, 20).unwrap());
        assert_eq!(id.strike, 185.0);
        assert_eq!(id.right, Right::Call);
    }

    #[test]
    fn parses_occ_fractional_strike() {
        let id = parse("SPY260320P00450500").unwrap();
        assert_eq!(id.strike, 450.5);
        assert_eq!(id.right, Right::Put);
    }

    #[test]
    fn parses_dashed_form() {
        let id = parse("AAPL-2026-03-20-185-C").unwrap();
        assert_eq!(id.root, "AAPL");
        assert_eq!(id.strike, 185.0);
        assert_eq!(id.right, Right::Call);
    }

    #[test]
    fn parses_dashed_root_with_dash() {
        let id = parse("BRK-B-2026-03-20-400-P").unwrap();
        assert_eq!(id.root, "BRK-B");
        assert_eq!(id.right, Right::Put);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("").is_none());
        assert!(parse("not-a-contract").is_none());
        assert!(parse("AAPL").is_none());
    }

    #[test]
    fn round_trips_dashed() {
        let id = parse("AAPL-2026-03-20-185-C").unwrap();
        assert_eq!(id.format_dashed(), "AAPL-2026-03-20-185-C");
    }
}
