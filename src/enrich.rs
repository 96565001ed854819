//! C8 — feature enricher.
//!
//! Builds the [`FlowPacket`] feature bag for a flushed cluster: identity,
//! NBBO aggregates and current snapshot, underlying context, rolling
//! baselines, and (when a structure was detected) structure tags. Missing
//! or stale context degrades to explicit `*_missing`/`*_stale` markers
//! rather than failing the packet — mirroring the partial-success shape the
//! teacher's enrichment pipeline uses for its own external lookups.

use crate::cluster::Cluster;
use crate::codec::ContractId;
use crate::config::PipelineConfig;
use crate::models::{round_to, Envelope, FeatureBag, FlowPacket, JoinQuality, PacketKind};
use crate::quotes::{EquityQuoteCache, OptionNbboCache};
use crate::rolling::RollingWindowStore;
use crate::structure::StructureSummary;

fn nbbo_aggregates(cluster: &Cluster, features: &mut FeatureBag) {
    let p = &cluster.placements;
    let count = p.total();
    let usable = p.usable_total();
    let aggressive = p.aggressive_total();

    features.set_int("count", count as i64);
    features.set_int("nbbo_count_aa", p.aa as i64);
    features.set_int("nbbo_count_a", p.a as i64);
    features.set_int("nbbo_count_b", p.b as i64);
    features.set_int("nbbo_count_bb", p.bb as i64);
    features.set_int("nbbo_count_mid", p.mid as i64);
    features.set_int("nbbo_count_missing", p.missing as i64);
    features.set_int("nbbo_count_stale", p.stale as i64);

    let coverage = if count > 0 { usable as f64 / count as f64 } else { 0.0 };
    features.set_num("nbbo_coverage_ratio", round_to(coverage, 4));

    if aggressive > 0 {
        let buy = (p.aa + p.a) as f64 / aggressive as f64;
        let sell = (p.bb + p.b) as f64 / aggressive as f64;
        features.set_num("nbbo_aggressive_buy_ratio", round_to(buy, 4));
        features.set_num("nbbo_aggressive_sell_ratio", round_to(sell, 4));
    } else {
        features.set_num("nbbo_aggressive_buy_ratio", 0.0);
        features.set_num("nbbo_aggressive_sell_ratio", 0.0);
    }

    if usable > 0 {
        features.set_num("nbbo_inside_ratio", round_to(p.mid as f64 / usable as f64, 4));
        features.set_num("nbbo_aggressive_ratio", round_to(aggressive as f64 / usable as f64, 4));
    } else {
        features.set_num("nbbo_inside_ratio", 0.0);
        features.set_num("nbbo_aggressive_ratio", 0.0);
    }
}

fn identity_features(cluster: &Cluster, features: &mut FeatureBag) {
    features.set_str("option_contract_id", cluster.contract_id.clone());
    features.set_int("start_ts", cluster.start_ts);
    features.set_int("end_ts", cluster.end_ts);
    features.set_int("window_ms", cluster.end_ts - cluster.start_ts);
    features.set_int("total_size", cluster.total_size as i64);
    features.set_num("total_premium", round_to(cluster.total_premium, 4));
    features.set_num("total_notional", round_to(cluster.total_premium * 100.0, 2));
    features.set_num("first_price", cluster.first_price);
    features.set_num("last_price", cluster.last_price);
}

fn contract_id_features(parsed: Option<&ContractId>, anchor_ts: i64, features: &mut FeatureBag) {
    let Some(id) = parsed else { return };
    features.set_str("option_root", id.root.clone());
    features.set_str("option_right", id.right.as_str());
    features.set_num("option_strike", id.strike);
    features.set_str("option_expiry", id.expiry.format("%Y-%m-%d").to_string());

    let anchor_date = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(anchor_ts)
        .map(|dt| dt.date_naive())
        .unwrap_or(id.expiry);
    let dte = (id.expiry - anchor_date).num_days();
    features.set_int("dte", dte);
}

fn underlying_context(
    root: Option<&str>,
    anchor_ts: i64,
    equity_quotes: &EquityQuoteCache,
    cfg: &PipelineConfig,
    features: &mut FeatureBag,
    join_quality: &mut JoinQuality,
) {
    let Some(root) = root else { return };
    features.set_str("underlying_id", root.to_string());
    let lookup = equity_quotes.lookup(root, anchor_ts, cfg.equity_quote_max_age_ms);
    if lookup.fresh() {
        if let (Some(bid), Some(ask)) = (lookup.bid, lookup.ask) {
            let mid = (bid + ask) / 2.0;
            let spread = (ask - bid).max(0.0);
            features.set_num("underlying_bid", bid);
            features.set_num("underlying_ask", ask);
            features.set_num("underlying_mid", mid);
            features.set_num("underlying_spread", spread);
        }
        join_quality.underlying_quote_age_ms = lookup.age_ms;
    } else if lookup.missing {
        join_quality.underlying_quote_missing = Some(true);
    } else {
        join_quality.underlying_quote_stale = Some(true);
    }
}

fn current_nbbo_snapshot(
    contract_id: &str,
    anchor_ts: i64,
    nbbo: &OptionNbboCache,
    cfg: &PipelineConfig,
    features: &mut FeatureBag,
    join_quality: &mut JoinQuality,
) {
    let lookup = nbbo.lookup(contract_id, anchor_ts, cfg.option_nbbo_max_age_ms);
    if lookup.fresh() {
        if let (Some(bid), Some(ask)) = (lookup.bid, lookup.ask) {
            features.set_num("nbbo_bid", bid);
            features.set_num("nbbo_ask", ask);
            features.set_num("nbbo_mid", (bid + ask) / 2.0);
            features.set_num("nbbo_spread", (ask - bid).max(0.0));
        }
        if let Some(bs) = lookup.bid_size {
            features.set_int("nbbo_bid_size", bs as i64);
        }
        if let Some(asz) = lookup.ask_size {
            features.set_int("nbbo_ask_size", asz as i64);
        }
        join_quality.nbbo_age_ms = lookup.age_ms;
    } else if lookup.missing {
        features.set_int("nbbo_missing", 1);
    } else {
        features.set_int("nbbo_stale", 1);
    }
}

fn rolling_baselines(
    contract_id: &str,
    cluster: &Cluster,
    nbbo_spread: Option<f64>,
    rolling: &RollingWindowStore,
    features: &mut FeatureBag,
) {
    apply_baseline(rolling, &format!("premium:{}", contract_id), cluster.total_premium, "premium", features);
    apply_baseline(rolling, &format!("size:{}", contract_id), cluster.total_size as f64, "size", features);

    match nbbo_spread {
        Some(spread) => {
            apply_baseline(rolling, &format!("spread:{}", contract_id), spread, "spread", features);
        }
        None => {
            features.set_num("spread_mean", 0.0);
            features.set_num("spread_std", 0.0);
            features.set_num("spread_z", 0.0);
            features.set_int("spread_baseline_n", 0);
        }
    }
}

fn apply_baseline(rolling: &RollingWindowStore, key: &str, value: f64, name: &str, features: &mut FeatureBag) {
    let update = rolling.update(key, value).unwrap_or_else(crate::rolling::RollingUpdate::unavailable);
    features.set_num(format!("{}_mean", name), round_to(update.mean, 4));
    features.set_num(format!("{}_std", name), round_to(update.stddev, 4));
    features.set_num(format!("{}_z", name), round_to(update.z, 4));
    features.set_int(format!("{}_baseline_n", name), update.n as i64);
}

fn structure_tags(structure: Option<&StructureSummary>, features: &mut FeatureBag) {
    let Some(s) = structure else { return };
    features.set_str("structure_type", s.structure_type.as_str());
    features.set_int("structure_legs", s.legs as i64);
    features.set_int("structure_strikes", s.strikes as i64);
    features.set_num("structure_strike_span", s.strike_span);
    features.set_str("structure_rights", s.rights.clone());
    if let (Some(from), Some(to)) = (s.from_expiry, s.to_expiry) {
        features.set_str("from_expiry", from.format("%Y-%m-%d").to_string());
        features.set_str("to_expiry", to.format("%Y-%m-%d").to_string());
    }
    if let Some(delta) = s.strike_delta {
        features.set_num("strike_delta", delta);
    }
}

/// Builds the per-contract packet for one flushed cluster.
pub fn build_contract_packet(
    cluster: &Cluster,
    parsed: Option<&ContractId>,
    structure: Option<&StructureSummary>,
    nbbo: &OptionNbboCache,
    equity_quotes: &EquityQuoteCache,
    rolling: &RollingWindowStore,
    cfg: &PipelineConfig,
) -> FlowPacket {
    let mut features = FeatureBag::new();
    let mut join_quality = JoinQuality::default();

    identity_features(cluster, &mut features);
    contract_id_features(parsed, cluster.end_ts, &mut features);
    nbbo_aggregates(cluster, &mut features);
    current_nbbo_snapshot(&cluster.contract_id, cluster.end_ts, nbbo, cfg, &mut features, &mut join_quality);
    underlying_context(
        parsed.map(|p| p.root.as_str()),
        cluster.end_ts,
        equity_quotes,
        cfg,
        &mut features,
        &mut join_quality,
    );
    let nbbo_spread = features.get_num("nbbo_spread");
    rolling_baselines(&cluster.contract_id, cluster, nbbo_spread, rolling, &mut features);
    structure_tags(structure, &mut features);

    FlowPacket {
        envelope: Envelope::new(cluster.start_source_ts, cluster.end_ingest_ts, cluster.end_seq, cluster.members.first().cloned().unwrap_or_default()),
        id: format!("flowpacket:{}:{}:{}", cluster.contract_id, cluster.start_ts, cluster.end_ts),
        packet_kind: PacketKind::Contract,
        members: cluster.members.clone(),
        features,
        join_quality,
    }
}

/// Builds the companion structure packet for an anchor cluster whose legs
/// formed a detected structure.
pub fn build_structure_packet(
    cluster: &Cluster,
    parsed: Option<&ContractId>,
    structure: &StructureSummary,
    nbbo: &OptionNbboCache,
    equity_quotes: &EquityQuoteCache,
    rolling: &RollingWindowStore,
    cfg: &PipelineConfig,
) -> FlowPacket {
    let mut features = FeatureBag::new();
    let mut join_quality = JoinQuality::default();

    features.set_int("start_ts", cluster.start_ts);
    features.set_int("end_ts", cluster.end_ts);
    contract_id_features(parsed, cluster.end_ts, &mut features);
    underlying_context(
        parsed.map(|p| p.root.as_str()),
        cluster.end_ts,
        equity_quotes,
        cfg,
        &mut features,
        &mut join_quality,
    );
    let _ = (nbbo, rolling); // current snapshot/baselines aren't meaningful at the structure level
    structure_tags(Some(structure), &mut features);

    let root = parsed.map(|p| p.root.as_str()).unwrap_or("unknown");
    FlowPacket {
        envelope: Envelope::new(cluster.start_source_ts, cluster.end_ingest_ts, cluster.end_seq, cluster.members.first().cloned().unwrap_or_default()),
        id: format!("flowpacket:structure:{}:{}:{}", root, cluster.start_ts, cluster.end_ts),
        packet_kind: PacketKind::Structure,
        members: structure.contract_ids.clone(),
        features,
        join_quality,
    }
}
