// src/fingerprint.rs
//
// Canonical event fingerprint + FNV-1a digest used to assert run
// determinism. The fingerprint covers what a run is sensitive to
// (sequence, top of book, trades, partial fills) at fixed 6-decimal
// precision; the digest folds every event's fingerprint into one u64.

use std::fmt::Write as _;

use crate::types::MarketDataEvent;

pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Fold a string into a running FNV-1a 64 hash.
pub fn fnv1a64_update(mut hash: u64, data: &str) -> u64 {
    for b in data.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// One-shot FNV-1a 64 of a string.
pub fn fnv1a64(data: &str) -> u64 {
    fnv1a64_update(FNV_OFFSET_BASIS, data)
}

/// Canonical per-event fingerprint string.
pub fn event_fingerprint(ev: &MarketDataEvent) -> String {
    let mut fp = format!(
        "{}|{:.6}|{:.6}|{}|{}",
        ev.sequence_number, ev.best_bid_price, ev.best_ask_price, ev.best_bid_size, ev.best_ask_size
    );
    for trade in &ev.trades {
        let _ = write!(
            fp,
            "|T:{}:{:.6}:{}",
            trade.aggressor_side.as_str(),
            trade.price,
            trade.size
        );
    }
    for fill in &ev.partial_fills {
        let _ = write!(
            fp,
            "|F:{}:{:.6}:{}:{}",
            fill.order_id, fill.price, fill.filled_size, fill.remaining_size
        );
    }
    fp
}

/// Streaming digest over a run: event count, checksum and average top
/// of book, matching the run summary printed by the CLI.
#[derive(Debug, Clone, Copy)]
pub struct RunDigest {
    pub processed: u64,
    pub checksum: u64,
    sum_bid: f64,
    sum_ask: f64,
}

impl Default for RunDigest {
    fn default() -> Self {
        Self {
            processed: 0,
            checksum: FNV_OFFSET_BASIS,
            sum_bid: 0.0,
            sum_ask: 0.0,
        }
    }
}

impl RunDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, ev: &MarketDataEvent) {
        self.processed += 1;
        self.sum_bid += ev.best_bid_price;
        self.sum_ask += ev.best_ask_price;
        self.checksum = fnv1a64_update(self.checksum, &event_fingerprint(ev));
    }

    pub fn avg_bid(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.sum_bid / self.processed as f64
        }
    }

    pub fn avg_ask(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.sum_ask / self.processed as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, Trade};

    fn event(seq: i64) -> MarketDataEvent {
        MarketDataEvent {
            instrument: "XYZ".to_string(),
            best_bid_price: 99.95,
            best_ask_price: 100.05,
            best_bid_size: 5,
            best_ask_size: 6,
            bid_levels: Vec::new(),
            ask_levels: Vec::new(),
            trades: Vec::new(),
            partial_fills: Vec::new(),
            mm_fills: Vec::new(),
            timestamp: 1_000 + seq,
            sequence_number: seq,
        }
    }

    #[test]
    fn known_fnv_vector() {
        // FNV-1a 64 of the empty string is the offset basis.
        assert_eq!(fnv1a64(""), FNV_OFFSET_BASIS);
        // Standard test vector.
        assert_eq!(fnv1a64("a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn fingerprint_includes_trades_and_fills() {
        let mut ev = event(1);
        assert_eq!(event_fingerprint(&ev), "1|99.950000|100.050000|5|6");

        ev.trades.push(Trade {
            aggressor_side: Side::Buy,
            price: 100.05,
            size: 3,
            trade_id: 9,
            timestamp: 1_001,
        });
        assert!(event_fingerprint(&ev).ends_with("|T:BUY:100.050000:3"));
    }

    #[test]
    fn digest_is_order_sensitive() {
        let mut a = RunDigest::new();
        let mut b = RunDigest::new();

        a.observe(&event(1));
        a.observe(&event(2));
        b.observe(&event(2));
        b.observe(&event(1));

        assert_eq!(a.processed, b.processed);
        assert_ne!(a.checksum, b.checksum);
    }

    #[test]
    fn identical_streams_match() {
        let mut a = RunDigest::new();
        let mut b = RunDigest::new();
        for seq in 1..=10 {
            a.observe(&event(seq));
            b.observe(&event(seq));
        }
        assert_eq!(a.checksum, b.checksum);
        assert!((a.avg_bid() - 99.95).abs() < 1e-12);
    }
}
