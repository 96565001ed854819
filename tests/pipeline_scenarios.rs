//! End-to-end scenario tests driving the public `Pipeline` API directly,
//! the way the teacher's `tests/backtest_run_integration.rs` exercises a
//! whole backtest run rather than one function at a time.

use islandflow_core::config::PipelineConfig;
use islandflow_core::dark;
use islandflow_core::models::{DarkType, Envelope, EquityPrint, EquityQuote, OptionNbbo, OptionPrint, Placement};
use islandflow_core::orchestrator::PipelineOutput;
use islandflow_core::Pipeline;

fn option_print(ts: i64, seq: u64, contract: &str, price: f64, size: u64) -> OptionPrint {
    OptionPrint {
        envelope: Envelope::new(ts, ts, seq, format!("opt{}", seq)),
        ts,
        option_contract_id: contract.to_string(),
        price,
        size,
        exchange: "NASDAQ".to_string(),
        conditions: vec![],
    }
}

fn option_nbbo(ts: i64, seq: u64, contract: &str, bid: f64, ask: f64) -> OptionNbbo {
    OptionNbbo {
        envelope: Envelope::new(ts, ts, seq, format!("nbbo{}", seq)),
        ts,
        option_contract_id: contract.to_string(),
        bid,
        ask,
        bid_size: 100,
        ask_size: 100,
    }
}

fn equity_print(ts: i64, seq: u64, underlying: &str, price: f64, size: u64, off_exchange: bool) -> EquityPrint {
    EquityPrint {
        envelope: Envelope::new(ts, ts, seq, format!("eq{}", seq)),
        ts,
        underlying_id: underlying.to_string(),
        price,
        size,
        exchange: "TRF".to_string(),
        off_exchange_flag: off_exchange,
    }
}

fn equity_quote(ts: i64, seq: u64, underlying: &str, bid: f64, ask: f64) -> EquityQuote {
    EquityQuote {
        envelope: Envelope::new(ts, ts, seq, format!("eqq{}", seq)),
        ts,
        underlying_id: underlying.to_string(),
        bid,
        ask,
    }
}

/// S1 — a run of aggressive, above-ask call prints on one contract reads
/// as a sweep and raises an alert once the cluster flushes.
#[test]
fn s1_call_sweep_raises_an_alert() {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let contract = "AAPL-2026-03-20-185-C";
    pipeline.nbbo_cache().update(option_nbbo(0, 1, contract, 29.00, 29.05));

    // Three prints above the ask, large enough in aggregate premium (price *
    // size, no contract multiplier) to clear the sweep classifier's minimum.
    pipeline.handle_option_print(option_print(0, 2, contract, 30.00, 600));
    pipeline.handle_option_print(option_print(200, 3, contract, 30.00, 600));
    pipeline.handle_option_print(option_print(400, 4, contract, 30.00, 600));
    let outputs = pipeline.handle_option_print(option_print(3_000, 5, contract, 1.02, 10));

    let alert = outputs.iter().find_map(|o| match o {
        PipelineOutput::Alert(a) => Some(a),
        _ => None,
    });
    assert!(alert.is_some(), "expected a sweep of above-ask call prints to raise an alert");

    let hit = outputs.iter().find_map(|o| match o {
        PipelineOutput::Hit(h) if h.classifier_id == "large_bullish_call_sweep" => Some(h),
        _ => None,
    });
    assert!(hit.is_some(), "expected the bullish call sweep classifier to fire");
}

/// S2 — NBBO that never arrives, or arrives and then goes stale, degrades
/// placement to MISSING/STALE rather than crashing the pipeline.
#[test]
fn s2_missing_and_stale_nbbo_degrade_placement() {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let contract = "AAPL-2026-03-20-185-C";

    // No NBBO ever published for this contract.
    let outputs = pipeline.handle_option_print(option_print(0, 1, contract, 1.0, 10));
    assert!(outputs.is_empty(), "a lone print shouldn't flush its own cluster");

    pipeline.nbbo_cache().update(option_nbbo(0, 2, contract, 1.0, 1.05));
    pipeline.handle_option_print(option_print(1_000, 3, contract, 1.02, 10));
    pipeline.handle_option_print(option_print(1_900, 4, contract, 1.02, 10));
    let flushed = pipeline.handle_option_print(option_print(4_000, 5, contract, 1.02, 10));

    let packet = flushed
        .iter()
        .find_map(|o| match o {
            PipelineOutput::Packet(p) if p.packet_kind == islandflow_core::models::PacketKind::Contract => Some(p),
            _ => None,
        })
        .expect("expected the first cluster to flush");

    // First print had no NBBO at all (missing); later ones saw a quote
    // that had gone stale by the time the cluster closed.
    assert_eq!(packet.features.get_int("nbbo_count_missing"), Some(1));
    assert_eq!(packet.features.get_int("nbbo_stale"), Some(1));
}

/// S3 — a call and a put on the same root/strike/expiry closing within the
/// cluster window of each other are summarized as a straddle.
#[test]
fn s3_straddle_structure_is_detected() {
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    let call = "AAPL-2026-03-20-185-C";
    let put = "AAPL-2026-03-20-185-P";
    pipeline.nbbo_cache().update(option_nbbo(0, 1, call, 1.0, 1.05));
    pipeline.nbbo_cache().update(option_nbbo(0, 2, put, 1.0, 1.05));

    pipeline.handle_option_print(option_print(0, 3, call, 1.02, 100));
    pipeline.handle_option_print(option_print(3_000, 4, call, 1.02, 100));
    pipeline.handle_option_print(option_print(1_500, 5, put, 1.02, 100));
    let outputs = pipeline.handle_option_print(option_print(4_000, 6, call, 1.02, 100));

    let structure_packet = outputs.iter().find_map(|o| match o {
        PipelineOutput::Packet(p) if p.packet_kind == islandflow_core::models::PacketKind::Structure => Some(p),
        _ => None,
    });
    let packet = structure_packet.expect("expected a structure packet for the straddle");
    assert_eq!(packet.features.get_str("structure_type"), Some("straddle"));
    assert_eq!(packet.features.get_str("structure_rights"), Some("C/P"));
}

/// S4 — a large off-exchange print trading at the midpoint, under a tight
/// spread, infers an absorbed block.
#[test]
fn s4_absorbed_block_is_inferred() {
    let cfg = PipelineConfig::default();
    let mut pipeline = Pipeline::new(cfg.clone());

    let quotes = pipeline.equity_quote_cache();
    quotes.update(equity_quote(0, 1, "AAPL", 149.98, 150.02));

    let print = equity_print(0, 2, "AAPL", 150.0, 20_000, true);
    let join = dark::join_equity_print(&print, &quotes, cfg.equity_quote_max_age_ms);
    assert_eq!(join.placement, Placement::Mid);
    assert!(join.fresh);

    let events = pipeline.handle_equity_print_join(&join);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, DarkType::AbsorbedBlock);
    assert_eq!(events[0].evidence_refs, vec![join.id.clone()]);
}

/// S5 — alert severity boundaries sit exactly at score 45 (low/medium) and
/// 80 (medium/high).
#[test]
fn s5_alert_severity_boundaries() {
    use islandflow_core::alert::score_alert;
    use islandflow_core::models::{ClassifierHit, Direction, FeatureBag, FlowPacket, JoinQuality, PacketKind};

    let make_packet = |premium: f64| {
        let mut features = FeatureBag::new();
        features.set_num("total_premium", premium);
        FlowPacket {
            envelope: Envelope::new(0, 0, 1, "t1"),
            id: "flowpacket:c1:0:0".to_string(),
            packet_kind: PacketKind::Contract,
            members: vec!["t1".to_string()],
            features,
            join_quality: JoinQuality::default(),
        }
    };
    let make_hit = |confidence: f64| ClassifierHit {
        envelope: Envelope::new(0, 0, 1, "t1"),
        classifier_id: "unusual_contract_spike".to_string(),
        packet_id: "flowpacket:c1:0:0".to_string(),
        confidence,
        direction: Direction::Neutral,
        explanations: vec![],
    };

    let low_medium_boundary = score_alert(&make_packet(45_000.0), &[]);
    assert_eq!(low_medium_boundary.score, 45);
    assert_eq!(low_medium_boundary.severity, islandflow_core::models::Severity::Medium);

    let just_below = score_alert(&make_packet(44_000.0), &[]);
    assert_eq!(just_below.severity, islandflow_core::models::Severity::Low);

    let medium_high_boundary = score_alert(&make_packet(60_000.0), &[make_hit(0.75)]);
    assert_eq!(medium_high_boundary.score, 80);
    assert_eq!(medium_high_boundary.severity, islandflow_core::models::Severity::High);
}

/// S6 — replaying the same input events through a fresh pipeline produces
/// byte-identical packets, since every id is a deterministic function of
/// its inputs rather than a randomly minted one.
#[test]
fn s6_replay_is_idempotent() {
    let contract = "AAPL-2026-03-20-185-C";
    let run = || {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.nbbo_cache().update(option_nbbo(0, 1, contract, 1.00, 1.05));
        pipeline.handle_option_print(option_print(0, 2, contract, 1.02, 100));
        pipeline.handle_option_print(option_print(3_000, 3, contract, 1.02, 100))
    };

    let first = run();
    let second = run();

    let ids = |outputs: &[PipelineOutput]| -> Vec<String> {
        outputs
            .iter()
            .filter_map(|o| match o {
                PipelineOutput::Packet(p) => Some(p.id.clone()),
                _ => None,
            })
            .collect()
    };

    assert_eq!(ids(&first), ids(&second));
    assert!(!ids(&first).is_empty());
}
