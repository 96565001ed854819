//! C11 — pipeline orchestrator.
//!
//! Wires the rest of the core together. [`Pipeline`] is the pure, in-memory
//! half: it owns the cluster map, recent-legs registry, and dark-inference
//! state, and turns one inbound print into the packets/hits/alerts it
//! produces without touching any I/O. [`run`] is the async shell around it
//! that actually pulls events off the bus, persists and publishes outputs,
//! and acks — split the way the teacher keeps `SignalDetector` (pure) apart
//! from `enrichment.rs`/`main.rs` (I/O), so the pipeline logic is testable
//! without a live bus or store.
//!
//! Concurrency model: per-stream worker tasks read their own stream in
//! order and either write directly to a cache they own (NBBO, equity
//! quotes) or hand events to this single coordinator, which is the sole
//! owner of cluster state, the recent-legs registry, and dark-inference
//! state. No cluster mutation ever suspends mid-flight; `Pipeline`'s
//! methods are synchronous, and all `.await` points (persist, publish) come
//! after the in-memory state has already been committed.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::bus::{BusMessage, Consumer, Publisher};
use crate::classifiers::ClassifierBank;
use crate::cluster::{Cluster, ClusterEngine};
use crate::config::PipelineConfig;
use crate::dark::DarkInferenceEngine;
use crate::enrich;
use crate::models::{EquityPrint, EquityPrintJoin, EquityQuote, InferredDark, OptionNbbo, OptionPrint};
use crate::quotes::{EquityQuoteCache, OptionNbboCache};
use crate::rolling::RollingWindowStore;
use crate::storage::Store;
use crate::structure::{self, Leg, RecentLegsRegistry};

#[derive(Debug, Clone)]
pub enum PipelineOutput {
    Packet(crate::models::FlowPacket),
    Hit(crate::models::ClassifierHit),
    Alert(crate::models::AlertEvent),
}

pub struct Pipeline {
    cfg: PipelineConfig,
    clusters: ClusterEngine,
    nbbo: Arc<OptionNbboCache>,
    equity_quotes: Arc<EquityQuoteCache>,
    rolling: RollingWindowStore,
    legs: RecentLegsRegistry,
    dark: DarkInferenceEngine,
    classifiers: ClassifierBank,
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig) -> Self {
        let rolling = RollingWindowStore::new(cfg.rolling_window_size, cfg.rolling_ttl);
        let legs = RecentLegsRegistry::new(cfg.recent_legs_capacity);
        let dark = DarkInferenceEngine::new(cfg.dark.clone());
        Self {
            clusters: ClusterEngine::new(cfg.cluster_window_ms),
            nbbo: Arc::new(OptionNbboCache::new()),
            equity_quotes: Arc::new(EquityQuoteCache::new()),
            rolling,
            legs,
            dark,
            classifiers: ClassifierBank::new(),
            cfg,
        }
    }

    pub fn nbbo_cache(&self) -> Arc<OptionNbboCache> {
        self.nbbo.clone()
    }

    pub fn equity_quote_cache(&self) -> Arc<EquityQuoteCache> {
        self.equity_quotes.clone()
    }

    /// Drives C7 (cluster formation) through C10 (alert scoring) for one
    /// option print.
    pub fn handle_option_print(&mut self, print: OptionPrint) -> Vec<PipelineOutput> {
        let flushed = self.clusters.ingest(print, &self.nbbo, self.cfg.option_nbbo_max_age_ms);
        let mut outputs = Vec::new();
        for cluster in flushed {
            outputs.extend(self.finalize_cluster(cluster));
        }
        outputs
    }

    /// Runs C5 dark inference for one already-built equity print join.
    pub fn handle_equity_print_join(&mut self, join: &EquityPrintJoin) -> Vec<InferredDark> {
        self.dark.process(join)
    }

    /// Flushes every live cluster, for use at graceful shutdown.
    pub fn shutdown(&mut self) -> Vec<PipelineOutput> {
        let flushed = self.clusters.drain();
        flushed.into_iter().flat_map(|c| self.finalize_cluster(c)).collect()
    }

    fn finalize_cluster(&mut self, cluster: Cluster) -> Vec<PipelineOutput> {
        let mut outputs = Vec::new();
        let parsed = crate::codec::parse(&cluster.contract_id);

        let structure = parsed.as_ref().and_then(|pc| {
            let leg = Leg {
                contract_id: cluster.contract_id.clone(),
                root: pc.root.clone(),
                expiry: pc.expiry,
                strike: pc.strike,
                right: pc.right,
                end_ts: cluster.end_ts,
            };
            let mut candidate_legs = self.legs.legs_for(&pc.root, cluster.end_ts, self.cfg.cluster_window_ms);
            candidate_legs.push(leg.clone());
            let summary = structure::classify_structure(cluster.end_ts, &candidate_legs, self.cfg.cluster_window_ms);
            self.legs.record(leg);
            summary
        });

        let contract_packet = enrich::build_contract_packet(
            &cluster,
            parsed.as_ref(),
            structure.as_ref(),
            &self.nbbo,
            &self.equity_quotes,
            &self.rolling,
            &self.cfg,
        );
        let hits = self.classifiers.evaluate(&contract_packet, &self.cfg.classifiers);
        outputs.push(PipelineOutput::Packet(contract_packet.clone()));
        if !hits.is_empty() {
            let alert = crate::alert::score_alert(&contract_packet, &hits);
            outputs.extend(hits.into_iter().map(PipelineOutput::Hit));
            outputs.push(PipelineOutput::Alert(alert));
        }

        if let Some(summary) = structure.filter(|s| s.legs >= 2) {
            let structure_packet = enrich::build_structure_packet(
                &cluster,
                parsed.as_ref(),
                &summary,
                &self.nbbo,
                &self.equity_quotes,
                &self.rolling,
                &self.cfg,
            );
            let structure_hits = self.classifiers.evaluate(&structure_packet, &self.cfg.classifiers);
            outputs.push(PipelineOutput::Packet(structure_packet.clone()));
            if !structure_hits.is_empty() {
                let structure_alert = crate::alert::score_alert(&structure_packet, &structure_hits);
                outputs.extend(structure_hits.into_iter().map(PipelineOutput::Hit));
                outputs.push(PipelineOutput::Alert(structure_alert));
            }
        }

        outputs
    }
}

async fn persist_and_publish(store: &dyn Store, publisher: &dyn Publisher, output: PipelineOutput) -> Result<()> {
    match output {
        PipelineOutput::Packet(packet) => {
            store.insert_flow_packet(&packet).await.context("persisting flow packet")?;
            let payload = serde_json::to_vec(&packet).context("serializing flow packet")?;
            let subject = match packet.packet_kind {
                crate::models::PacketKind::Contract => "flow.packets.contract",
                crate::models::PacketKind::Structure => "flow.packets.structure",
            };
            publisher.publish(subject, &payload).await.context("publishing flow packet")?;
        }
        PipelineOutput::Hit(hit) => {
            store.insert_classifier_hit(&hit).await.context("persisting classifier hit")?;
            let payload = serde_json::to_vec(&hit).context("serializing classifier hit")?;
            publisher.publish("flow.classifier_hits", &payload).await.context("publishing classifier hit")?;
        }
        PipelineOutput::Alert(alert) => {
            store.insert_alert(&alert).await.context("persisting alert")?;
            let payload = serde_json::to_vec(&alert).context("serializing alert")?;
            publisher.publish("flow.alerts", &payload).await.context("publishing alert")?;
        }
    }
    Ok(())
}

/// Subscribes `consumer` to one stream and decodes+forwards each message to
/// `handle`. Acks on success; a decode failure is logged and skipped
/// (recoverable per the error handling design), a downstream persist/
/// publish failure propagates and the message is left unacked.
async fn drive_stream<T, F, Fut>(mut consumer: Box<dyn Consumer>, stream_name: &'static str, mut handle: F) -> Result<()>
where
    T: serde::de::DeserializeOwned,
    F: FnMut(T) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    loop {
        let msg: Option<BusMessage> = consumer.recv().await.with_context(|| format!("receiving from {}", stream_name))?;
        let Some(msg) = msg else {
            info!(stream = stream_name, "stream closed");
            return Ok(());
        };
        let decoded: T = match serde_json::from_slice(&msg.payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(stream = stream_name, error = %e, "dropping malformed message");
                continue;
            }
        };
        if let Err(e) = handle(decoded).await {
            error!(stream = stream_name, error = %e, "handler failed, message left unacked");
            return Err(e);
        }
    }
}

/// Runs the four stream workers plus the coordinator loop until `shutdown`
/// resolves, at which point all live clusters are flushed before returning.
pub async fn run(
    pipeline: Arc<tokio::sync::Mutex<Pipeline>>,
    bus: Arc<dyn Publisher + Send + Sync>,
    option_prints: Box<dyn Consumer>,
    option_nbbo: Box<dyn Consumer>,
    equity_prints: Box<dyn Consumer>,
    equity_quotes_stream: Box<dyn Consumer>,
    store: Arc<dyn Store>,
    nbbo_cache: Arc<OptionNbboCache>,
    equity_quote_cache: Arc<EquityQuoteCache>,
    equity_quote_max_age_ms: i64,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let option_nbbo_worker = {
        let cache = nbbo_cache.clone();
        tokio::spawn(drive_stream::<OptionNbbo, _, _>(option_nbbo, "option.nbbo", move |nbbo| {
            let cache = cache.clone();
            async move {
                cache.update(nbbo);
                Ok(())
            }
        }))
    };

    let equity_quote_worker = {
        let cache = equity_quote_cache.clone();
        tokio::spawn(drive_stream::<EquityQuote, _, _>(equity_quotes_stream, "equity.quotes", move |quote| {
            let cache = cache.clone();
            async move {
                cache.update(quote);
                Ok(())
            }
        }))
    };

    let equity_print_worker = {
        let cache = equity_quote_cache.clone();
        let pipeline = pipeline.clone();
        let store = store.clone();
        let bus = bus.clone();
        tokio::spawn(drive_stream::<EquityPrint, _, _>(equity_prints, "equity.prints", move |print| {
            let cache = cache.clone();
            let pipeline = pipeline.clone();
            let store = store.clone();
            let bus = bus.clone();
            async move {
                let join = crate::dark::join_equity_print(&print, &cache, equity_quote_max_age_ms);
                store.insert_equity_print_join(&join).await.context("persisting equity print join")?;
                let payload = serde_json::to_vec(&join).context("serializing equity print join")?;
                bus.publish("flow.equity_joins", &payload).await.context("publishing equity print join")?;

                let dark_events = pipeline.lock().await.handle_equity_print_join(&join);
                for event in dark_events {
                    store.insert_inferred_dark(&event).await.context("persisting inferred dark event")?;
                    let payload = serde_json::to_vec(&event).context("serializing inferred dark event")?;
                    bus.publish("flow.dark", &payload).await.context("publishing inferred dark event")?;
                }
                Ok(())
            }
        }))
    };

    let option_print_worker = {
        let pipeline = pipeline.clone();
        let store = store.clone();
        let bus = bus.clone();
        tokio::spawn(drive_stream::<OptionPrint, _, _>(option_prints, "option.prints", move |print| {
            let pipeline = pipeline.clone();
            let store = store.clone();
            let bus = bus.clone();
            async move {
                let outputs = pipeline.lock().await.handle_option_print(print);
                for output in outputs {
                    persist_and_publish(store.as_ref(), bus.as_ref(), output).await?;
                }
                Ok(())
            }
        }))
    };

    tokio::pin!(shutdown);
    shutdown.await;
    info!("shutdown signal received, flushing live clusters");

    option_nbbo_worker.abort();
    equity_quote_worker.abort();
    equity_print_worker.abort();
    option_print_worker.abort();

    let flushed = pipeline.lock().await.shutdown();
    for output in flushed {
        persist_and_publish(store.as_ref(), bus.as_ref(), output).await.context("persisting output during shutdown flush")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Envelope;

    fn option_print(ts: i64, seq: u64, contract: &str, price: f64, size: u64) -> OptionPrint {
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

    fn option_nbbo(ts: i64, seq: u64, contract: &str, bid: f64, ask: f64) -> OptionNbbo {
        OptionNbbo {
            envelope: Envelope::new(ts, ts, seq, format!("n{}", seq)),
            ts,
            option_contract_id: contract.to_string(),
            bid,
            ask,
            bid_size: 50,
            ask_size: 50,
        }
    }

    #[test]
    fn large_aggressive_print_raises_an_alert_on_flush() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let contract = "AAPL-2026-03-20-185-C";
        pipeline.nbbo_cache().update(option_nbbo(0, 1, contract, 49.00, 49.05));

        // A single large print well above the ask opens a cluster; it only
        // becomes a packet once something pushes the cluster past its window.
        // Premium (price * size, no contract multiplier) must clear the spike
        // classifier's minimum on its own since a lone print never meets the
        // sweep classifier's print-count gate.
        pipeline.handle_option_print(option_print(0, 2, contract, 50.00, 600));
        let outputs = pipeline.handle_option_print(option_print(3_000, 3, contract, 1.02, 10));

        let has_alert = outputs.iter().any(|o| matches!(o, PipelineOutput::Alert(_)));
        assert!(has_alert, "expected the large aggressive cluster to raise an alert on flush");
    }

    #[test]
    fn stale_nbbo_at_flush_time_degrades_feature_without_crashing() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let contract = "AAPL-2026-03-20-185-C";
        pipeline.nbbo_cache().update(option_nbbo(0, 1, contract, 1.00, 1.05));

        // Three prints within the same cluster window push end_ts to 1900ms,
        // past the 1500ms NBBO max age, while the quote itself never updates.
        pipeline.handle_option_print(option_print(0, 2, contract, 1.02, 10));
        pipeline.handle_option_print(option_print(1_000, 3, contract, 1.02, 10));
        pipeline.handle_option_print(option_print(1_900, 4, contract, 1.02, 10));
        let outputs = pipeline.handle_option_print(option_print(4_000, 5, contract, 1.02, 10));

        let packet = outputs
            .iter()
            .find_map(|o| match o {
                PipelineOutput::Packet(p) if p.packet_kind == crate::models::PacketKind::Contract => Some(p),
                _ => None,
            })
            .expect("expected the first cluster to flush");
        assert_eq!(packet.features.get_int("nbbo_stale"), Some(1));
    }

    #[test]
    fn straddle_legs_emit_a_structure_packet() {
        // Cluster window defaults to 2000ms. Walk two contracts through
        // flushes staggered so their recorded legs land within that window
        // of each other, the way a real straddle would close both legs
        // close together but not necessarily atomically.
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        let call = "AAPL-2026-03-20-185-C";
        let put = "AAPL-2026-03-20-185-P";
        pipeline.nbbo_cache().update(option_nbbo(0, 1, call, 1.0, 1.05));
        pipeline.nbbo_cache().update(option_nbbo(0, 2, put, 1.0, 1.05));

        // Opens and then flushes the call cluster at end_ts=0, recording its leg.
        pipeline.handle_option_print(option_print(0, 3, call, 1.02, 100));
        pipeline.handle_option_print(option_print(3_000, 4, call, 1.02, 100));

        // Opens the put cluster at end_ts=1500.
        pipeline.handle_option_print(option_print(1_500, 5, put, 1.02, 100));

        // A later call print forces the put cluster to flush (it's now more
        // than the window stale relative to this print), at which point the
        // call leg recorded above is still within 2000ms of the put leg.
        let outputs = pipeline.handle_option_print(option_print(4_000, 6, call, 1.02, 100));

        let has_structure = outputs
            .iter()
            .any(|o| matches!(o, PipelineOutput::Packet(p) if p.packet_kind == crate::models::PacketKind::Structure));
        assert!(has_structure, "expected a straddle structure packet once both legs close within the window");
    }
}
