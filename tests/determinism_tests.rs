// tests/determinism_tests.rs
//
// Run-level determinism properties: same seed => identical checksums,
// different seed => divergence, and a generate -> serialize -> replay
// round trip that reproduces every event field-for-field.

use passiva::config::{SimulationConfig, SimulationMode};
use passiva::fingerprint::RunDigest;
use passiva::sim::{MarketSimulator, SimError};
use passiva::types::MarketDataEvent;

const TOLERANCE: f64 = 1e-12;

fn base_config() -> SimulationConfig {
    SimulationConfig {
        iterations: 200,
        latency_ms: 0,
        ..SimulationConfig::default()
    }
}

fn run_capture(config: SimulationConfig, events_to_process: u64) -> (RunDigest, Vec<MarketDataEvent>) {
    let mut simulator = MarketSimulator::new(config).expect("simulator constructs");
    let mut digest = RunDigest::new();
    let mut events = Vec::new();

    for _ in 0..events_to_process {
        let md = match simulator.generate_event() {
            Ok(md) => md,
            Err(SimError::ReplayExhausted) => break,
            Err(e) => panic!("unexpected simulator error: {e}"),
        };
        digest.observe(&md);
        events.push(md);
    }
    (digest, events)
}

fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE
}

fn assert_event_equal(lhs: &MarketDataEvent, rhs: &MarketDataEvent) {
    assert_eq!(lhs.instrument, rhs.instrument);
    assert!(nearly_equal(lhs.best_bid_price, rhs.best_bid_price));
    assert!(nearly_equal(lhs.best_ask_price, rhs.best_ask_price));
    assert_eq!(lhs.best_bid_size, rhs.best_bid_size);
    assert_eq!(lhs.best_ask_size, rhs.best_ask_size);
    assert_eq!(lhs.sequence_number, rhs.sequence_number);
    assert_eq!(lhs.timestamp, rhs.timestamp);

    assert_eq!(lhs.bid_levels.len(), rhs.bid_levels.len());
    for (l, r) in lhs.bid_levels.iter().zip(&rhs.bid_levels) {
        assert!(nearly_equal(l.price, r.price));
        assert_eq!(l.size, r.size);
        assert_eq!(l.order_id, r.order_id);
        assert_eq!(l.timestamp, r.timestamp);
    }
    assert_eq!(lhs.ask_levels.len(), rhs.ask_levels.len());
    for (l, r) in lhs.ask_levels.iter().zip(&rhs.ask_levels) {
        assert!(nearly_equal(l.price, r.price));
        assert_eq!(l.size, r.size);
        assert_eq!(l.order_id, r.order_id);
        assert_eq!(l.timestamp, r.timestamp);
    }

    assert_eq!(lhs.trades.len(), rhs.trades.len());
    for (l, r) in lhs.trades.iter().zip(&rhs.trades) {
        assert_eq!(l.aggressor_side, r.aggressor_side);
        assert!(nearly_equal(l.price, r.price));
        assert_eq!(l.size, r.size);
        assert_eq!(l.trade_id, r.trade_id);
        assert_eq!(l.timestamp, r.timestamp);
    }

    assert_eq!(lhs.partial_fills.len(), rhs.partial_fills.len());
    for (l, r) in lhs.partial_fills.iter().zip(&rhs.partial_fills) {
        assert_eq!(l.order_id, r.order_id);
        assert!(nearly_equal(l.price, r.price));
        assert_eq!(l.filled_size, r.filled_size);
        assert_eq!(l.remaining_size, r.remaining_size);
        assert_eq!(l.timestamp, r.timestamp);
    }
}

#[test]
fn same_seed_runs_are_checksum_identical() {
    let mut cfg_a = base_config();
    cfg_a.seed = 12345;
    let (digest_a, _) = run_capture(cfg_a, 200);
    assert_eq!(digest_a.processed, 200);

    let mut cfg_b = base_config();
    cfg_b.seed = 12345;
    let (digest_b, _) = run_capture(cfg_b, 200);

    assert_eq!(digest_a.checksum, digest_b.checksum);
    assert!(nearly_equal(digest_a.avg_bid(), digest_b.avg_bid()));
    assert!(nearly_equal(digest_a.avg_ask(), digest_b.avg_ask()));
}

#[test]
fn different_seed_diverges() {
    let mut cfg_a = base_config();
    cfg_a.seed = 12345;
    let (digest_a, _) = run_capture(cfg_a, 200);

    let mut cfg_c = base_config();
    cfg_c.seed = 54321;
    let (digest_c, _) = run_capture(cfg_c, 200);

    assert_eq!(digest_c.processed, 200);
    assert_ne!(digest_a.checksum, digest_c.checksum);
}

#[test]
fn replay_matches_generation_field_for_field() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("determinism_replay.log");

    let mut writer_cfg = base_config();
    writer_cfg.seed = 777;
    writer_cfg.event_log_path = Some(log_path.clone());
    let (gen_digest, generated) = run_capture(writer_cfg, 200);
    assert_eq!(gen_digest.processed, 200);

    // A replay simulator with a different seed must reproduce the market
    // side exactly: the seed only feeds generation.
    let replay_cfg = SimulationConfig {
        seed: 999,
        mode: SimulationMode::Replay,
        replay_log_path: Some(log_path),
        ..base_config()
    };
    let (replay_digest, replayed) = run_capture(replay_cfg, 200);

    assert_eq!(gen_digest.processed, replay_digest.processed);
    assert_eq!(gen_digest.checksum, replay_digest.checksum);
    assert!(nearly_equal(gen_digest.avg_bid(), replay_digest.avg_bid()));
    assert!(nearly_equal(gen_digest.avg_ask(), replay_digest.avg_ask()));

    assert_eq!(generated.len(), replayed.len());
    for (g, r) in generated.iter().zip(&replayed) {
        assert_event_equal(g, r);
    }
}

#[test]
fn replay_beyond_log_terminates_normally() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("short.log");

    let mut writer_cfg = base_config();
    writer_cfg.iterations = 20;
    writer_cfg.event_log_path = Some(log_path.clone());
    let (digest, _) = run_capture(writer_cfg, 20);
    assert_eq!(digest.processed, 20);

    let replay_cfg = SimulationConfig {
        mode: SimulationMode::Replay,
        replay_log_path: Some(log_path),
        ..base_config()
    };
    // Ask for more events than the log holds: the run stops at 20.
    let (replay_digest, _) = run_capture(replay_cfg, 200);
    assert_eq!(replay_digest.processed, 20);
}
