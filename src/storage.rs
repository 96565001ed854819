//! C12 — store contract.
//!
//! `Store` exposes one `insert_*` per emitted-record table plus `latest`/
//! `range` reads for the query shapes the dashboard/replay harness need.
//! `SqliteStore` is a `rusqlite`-backed reference implementation (WAL mode,
//! prepared statements, row-per-record JSON columns), grounded in the
//! teacher's `signals/db_storage.rs`. `InMemoryStore` (grounded in
//! `signals/storage.rs`'s `VecDeque`-backed store) backs unit tests.

use std::collections::VecDeque;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;

use crate::models::{AlertEvent, ClassifierHit, EquityPrintJoin, FlowPacket, InferredDark};

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_flow_packet(&self, packet: &FlowPacket) -> Result<()>;
    async fn insert_classifier_hit(&self, hit: &ClassifierHit) -> Result<()>;
    async fn insert_alert(&self, alert: &AlertEvent) -> Result<()>;
    async fn insert_equity_print_join(&self, join: &EquityPrintJoin) -> Result<()>;
    async fn insert_inferred_dark(&self, dark: &InferredDark) -> Result<()>;

    async fn recent_flow_packets(&self, limit: usize) -> Result<Vec<FlowPacket>>;
    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertEvent>>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("opening sqlite database")?;
        conn.pragma_update(None, "journal_mode", "WAL").context("setting WAL journal mode")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA).context("applying schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite database")?;
        conn.execute_batch(SCHEMA).context("applying schema")?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS flow_packets (
    id TEXT NOT NULL,
    packet_kind TEXT NOT NULL,
    trace_id TEXT NOT NULL,
    source_ts INTEGER NOT NULL,
    ingest_ts INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    record_json TEXT NOT NULL,
    PRIMARY KEY (id, seq)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS classifier_hits (
    packet_id TEXT NOT NULL,
    classifier_id TEXT NOT NULL,
    trace_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    record_json TEXT NOT NULL,
    PRIMARY KEY (packet_id, classifier_id, seq)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS alerts (
    packet_id TEXT NOT NULL,
    trace_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    score INTEGER NOT NULL,
    severity TEXT NOT NULL,
    record_json TEXT NOT NULL,
    PRIMARY KEY (packet_id, seq)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS equity_print_joins (
    id TEXT NOT NULL PRIMARY KEY,
    underlying_id TEXT NOT NULL,
    ts INTEGER NOT NULL,
    record_json TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS inferred_dark (
    trace_id TEXT NOT NULL,
    underlying_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    seq INTEGER NOT NULL,
    record_json TEXT NOT NULL,
    PRIMARY KEY (trace_id, kind, seq)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_flow_packets_source_ts ON flow_packets(source_ts);
CREATE INDEX IF NOT EXISTS idx_alerts_score ON alerts(score);
";

#[async_trait]
impl Store for SqliteStore {
    async fn insert_flow_packet(&self, packet: &FlowPacket) -> Result<()> {
        let json = serde_json::to_string(packet).context("serializing flow packet")?;
        let kind = match packet.packet_kind {
            crate::models::PacketKind::Contract => "contract",
            crate::models::PacketKind::Structure => "structure",
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO flow_packets (id, packet_kind, trace_id, source_ts, ingest_ts, seq, record_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![packet.id, kind, packet.envelope.trace_id, packet.envelope.source_ts, packet.envelope.ingest_ts, packet.envelope.seq, json],
        )
        .context("inserting flow packet")?;
        Ok(())
    }

    async fn insert_classifier_hit(&self, hit: &ClassifierHit) -> Result<()> {
        let json = serde_json::to_string(hit).context("serializing classifier hit")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO classifier_hits (packet_id, classifier_id, trace_id, seq, record_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![hit.packet_id, hit.classifier_id, hit.envelope.trace_id, hit.envelope.seq, json],
        )
        .context("inserting classifier hit")?;
        Ok(())
    }

    async fn insert_alert(&self, alert: &AlertEvent) -> Result<()> {
        let json = serde_json::to_string(alert).context("serializing alert")?;
        let severity = match alert.severity {
            crate::models::Severity::Low => "low",
            crate::models::Severity::Medium => "medium",
            crate::models::Severity::High => "high",
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO alerts (packet_id, trace_id, seq, score, severity, record_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![alert.packet_id, alert.envelope.trace_id, alert.envelope.seq, alert.score, severity, json],
        )
        .context("inserting alert")?;
        Ok(())
    }

    async fn insert_equity_print_join(&self, join: &EquityPrintJoin) -> Result<()> {
        let json = serde_json::to_string(join).context("serializing equity print join")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO equity_print_joins (id, underlying_id, ts, record_json) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![join.id, join.underlying_id, join.ts, json],
        )
        .context("inserting equity print join")?;
        Ok(())
    }

    async fn insert_inferred_dark(&self, dark: &InferredDark) -> Result<()> {
        let json = serde_json::to_string(dark).context("serializing inferred dark event")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO inferred_dark (trace_id, underlying_id, kind, seq, record_json) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![dark.envelope.trace_id, dark.underlying_id, dark.kind.as_str(), dark.envelope.seq, json],
        )
        .context("inserting inferred dark event")?;
        Ok(())
    }

    async fn recent_flow_packets(&self, limit: usize) -> Result<Vec<FlowPacket>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT record_json FROM flow_packets ORDER BY source_ts DESC LIMIT ?1")
            .context("preparing recent flow packets query")?;
        let rows = stmt
            .query_map([limit as i64], |row| row.get::<_, String>(0))
            .context("querying recent flow packets")?;
        let mut out = Vec::new();
        for row in rows {
            let json = row.context("reading flow packet row")?;
            out.push(serde_json::from_str(&json).context("deserializing flow packet")?);
        }
        Ok(out)
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT record_json FROM alerts ORDER BY seq DESC LIMIT ?1")
            .context("preparing recent alerts query")?;
        let rows = stmt.query_map([limit as i64], |row| row.get::<_, String>(0)).context("querying recent alerts")?;
        let mut out = Vec::new();
        for row in rows {
            let json = row.context("reading alert row")?;
            out.push(serde_json::from_str(&json).context("deserializing alert")?);
        }
        Ok(out)
    }
}

/// In-memory store for unit/integration tests — each table is a capped
/// `VecDeque`, mirroring the teacher's `SignalStorage`.
pub struct InMemoryStore {
    capacity: usize,
    flow_packets: Mutex<VecDeque<FlowPacket>>,
    classifier_hits: Mutex<VecDeque<ClassifierHit>>,
    alerts: Mutex<VecDeque<AlertEvent>>,
    equity_print_joins: Mutex<VecDeque<EquityPrintJoin>>,
    inferred_dark: Mutex<VecDeque<InferredDark>>,
}

impl InMemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            flow_packets: Mutex::new(VecDeque::new()),
            classifier_hits: Mutex::new(VecDeque::new()),
            alerts: Mutex::new(VecDeque::new()),
            equity_print_joins: Mutex::new(VecDeque::new()),
            inferred_dark: Mutex::new(VecDeque::new()),
        }
    }

    fn push<T>(&self, queue: &Mutex<VecDeque<T>>, item: T) {
        let mut q = queue.lock();
        q.push_back(item);
        while q.len() > self.capacity {
            q.pop_front();
        }
    }

    pub fn alerts_snapshot(&self) -> Vec<AlertEvent> {
        self.alerts.lock().iter().cloned().collect()
    }

    pub fn flow_packets_snapshot(&self) -> Vec<FlowPacket> {
        self.flow_packets.lock().iter().cloned().collect()
    }

    pub fn classifier_hits_snapshot(&self) -> Vec<ClassifierHit> {
        self.classifier_hits.lock().iter().cloned().collect()
    }

    pub fn inferred_dark_snapshot(&self) -> Vec<InferredDark> {
        self.inferred_dark.lock().iter().cloned().collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_flow_packet(&self, packet: &FlowPacket) -> Result<()> {
        self.push(&self.flow_packets, packet.clone());
        Ok(())
    }

    async fn insert_classifier_hit(&self, hit: &ClassifierHit) -> Result<()> {
        self.push(&self.classifier_hits, hit.clone());
        Ok(())
    }

    async fn insert_alert(&self, alert: &AlertEvent) -> Result<()> {
        self.push(&self.alerts, alert.clone());
        Ok(())
    }

    async fn insert_equity_print_join(&self, join: &EquityPrintJoin) -> Result<()> {
        self.push(&self.equity_print_joins, join.clone());
        Ok(())
    }

    async fn insert_inferred_dark(&self, dark: &InferredDark) -> Result<()> {
        self.push(&self.inferred_dark, dark.clone());
        Ok(())
    }

    async fn recent_flow_packets(&self, limit: usize) -> Result<Vec<FlowPacket>> {
        let q = self.flow_packets.lock();
        Ok(q.iter().rev().take(limit).cloned().collect())
    }

    async fn recent_alerts(&self, limit: usize) -> Result<Vec<AlertEvent>> {
        let q = self.alerts.lock();
        Ok(q.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Envelope, FeatureBag, JoinQuality, PacketKind};

    fn packet(id: &str) -> FlowPacket {
        FlowPacket {
            envelope: Envelope::new(1, 1, 1, "t1"),
            id: id.to_string(),
            packet_kind: PacketKind::Contract,
            members: vec!["t1".to_string()],
            features: FeatureBag::new(),
            join_quality: JoinQuality::default(),
        }
    }

    #[tokio::test]
    async fn sqlite_store_round_trips_flow_packets() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_flow_packet(&packet("flowpacket:c1:0:0")).await.unwrap();
        let recent = store.recent_flow_packets(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "flowpacket:c1:0:0");
    }

    #[tokio::test]
    async fn in_memory_store_caps_capacity() {
        let store = InMemoryStore::new(2);
        for i in 0..5 {
            store.insert_flow_packet(&packet(&format!("p{}", i))).await.unwrap();
        }
        assert_eq!(store.flow_packets_snapshot().len(), 2);
    }
}
