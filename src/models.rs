//! Shared data model: envelope fields and the external event / emitted
//! record types described in the data model section of the spec.
//!
//! Every emitted record is immutable once constructed; callers build a new
//! value rather than mutate one in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fields carried on every external event and every emitted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Source timestamp, ms since epoch.
    pub source_ts: i64,
    /// Wall-clock time this process read the event, ms since epoch.
    pub ingest_ts: i64,
    /// Monotonic per-source sequence number.
    pub seq: u64,
    /// Opaque tracing identifier, propagated or freshly minted.
    pub trace_id: String,
}

impl Envelope {
    pub fn new(source_ts: i64, ingest_ts: i64, seq: u64, trace_id: impl Into<String>) -> Self {
        Self {
            source_ts,
            ingest_ts,
            seq,
            trace_id: trace_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Right {
    #[serde(rename = "C")]
    Call,
    #[serde(rename = "P")]
    Put,
}

impl Right {
    pub fn as_str(&self) -> &'static str {
        match self {
            Right::Call => "C",
            Right::Put => "P",
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Right::Call),
            'P' => Some(Right::Put),
            _ => None,
        }
    }
}

/// Which side of the posted market a trade printed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "MID")]
    Mid,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "BB")]
    Bb,
    #[serde(rename = "STALE")]
    Stale,
    #[serde(rename = "MISSING")]
    Missing,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Aa => "AA",
            Placement::A => "A",
            Placement::Mid => "MID",
            Placement::B => "B",
            Placement::Bb => "BB",
            Placement::Stale => "STALE",
            Placement::Missing => "MISSING",
        }
    }

    /// `true` for AA/A/B/BB — prints that traded at or beyond the posted side.
    pub fn is_aggressive(&self) -> bool {
        matches!(self, Placement::Aa | Placement::A | Placement::B | Placement::Bb)
    }

    pub fn is_buy_side(&self) -> bool {
        matches!(self, Placement::Aa | Placement::A)
    }

    pub fn is_sell_side(&self) -> bool {
        matches!(self, Placement::B | Placement::Bb)
    }

    /// `true` for any bucket that counts toward the usable-placement total
    /// (excludes MISSING/STALE).
    pub fn is_usable(&self) -> bool {
        !matches!(self, Placement::Missing | Placement::Stale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPrint {
    pub envelope: Envelope,
    pub ts: i64,
    pub option_contract_id: String,
    pub price: f64,
    pub size: u64,
    pub exchange: String,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionNbbo {
    pub envelope: Envelope,
    pub ts: i64,
    pub option_contract_id: String,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: u64,
    pub ask_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPrint {
    pub envelope: Envelope,
    pub ts: i64,
    pub underlying_id: String,
    pub price: f64,
    pub size: u64,
    pub exchange: String,
    pub off_exchange_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityQuote {
    pub envelope: Envelope,
    pub ts: i64,
    pub underlying_id: String,
    pub bid: f64,
    pub ask: f64,
}

/// The join of an equity print against the latest equity quote (C5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPrintJoin {
    pub envelope: Envelope,
    pub id: String,
    pub underlying_id: String,
    pub ts: i64,
    pub price: f64,
    pub size: u64,
    pub off_exchange: bool,
    pub placement: Placement,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub mid: Option<f64>,
    pub spread: Option<f64>,
    pub age_ms: Option<i64>,
    /// `true` when the quote was present, non-stale, and within the
    /// configured spread gate — the precondition every dark-inference rule
    /// shares.
    pub fresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PacketKind {
    Contract,
    Structure,
}

/// An open map of named feature values. Writers use the typed setters so a
/// bad write is a compile error rather than a stringly-typed runtime bug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureBag(BTreeMap<String, FeatureValue>);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Num(f64),
    Int(i64),
    Str(String),
    Bool(bool),
}

impl FeatureBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_num(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.0.insert(key.into(), FeatureValue::Num(value));
        self
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.0.insert(key.into(), FeatureValue::Int(value));
        self
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), FeatureValue::Str(value.into()));
        self
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) -> &mut Self {
        self.0.insert(key.into(), FeatureValue::Bool(value));
        self
    }

    pub fn get_num(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(FeatureValue::Num(v)) => Some(*v),
            Some(FeatureValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(FeatureValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(FeatureValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(FeatureValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// Degraded-feature bookkeeping for a packet. Some fields live here instead
/// of the feature bag because they describe the *quality* of a join, not a
/// feature of the trade itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinQuality {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_quote_missing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_quote_stale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbbo_age_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underlying_quote_age_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPacket {
    pub envelope: Envelope,
    pub id: String,
    pub packet_kind: PacketKind,
    pub members: Vec<String>,
    pub features: FeatureBag,
    pub join_quality: JoinQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierHit {
    pub envelope: Envelope,
    pub classifier_id: String,
    pub packet_id: String,
    pub confidence: f64,
    pub direction: Direction,
    pub explanations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub envelope: Envelope,
    pub packet_id: String,
    pub score: u32,
    pub severity: Severity,
    pub hits: Vec<ClassifierHit>,
    pub evidence_refs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DarkType {
    AbsorbedBlock,
    StealthAccumulation,
    Distribution,
}

impl DarkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DarkType::AbsorbedBlock => "absorbed_block",
            DarkType::StealthAccumulation => "stealth_accumulation",
            DarkType::Distribution => "distribution",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredDark {
    pub envelope: Envelope,
    pub underlying_id: String,
    #[serde(rename = "type")]
    pub kind: DarkType,
    pub confidence: f64,
    pub evidence_refs: Vec<String>,
}

/// Rounds `value` to `places` decimal digits, matching the rounding the
/// spec calls for on persisted/derived ratios (e.g. `round(x, 4)`).
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn clip01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
