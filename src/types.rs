// src/types.rs
//
// Common shared types for the Passiva simulator core.
//
// Everything that crosses a component boundary lives here: order and fill
// records owned by the matching engine, the market data event produced by
// the simulator, and the trade / level records embedded in it. All of these
// are single-use immutable values once emitted.

use serde::{Deserialize, Serialize};

/// Logical millisecond timestamp. The simulator advances this by one unit
/// per generated event; wall time never enters the core.
pub type TimestampMs = i64;

/// Buy or sell side of an order or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Stable uppercase tag used by the text event log and the transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// Parse the uppercase wire tag. Returns None for anything else.
    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Acknowledged,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
}

/// A passive limit order. Owned by the matching engine while resting;
/// price and side are immutable after construction, `created_at` is the
/// price-level tie-break key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub side: Side,
    pub price: f64,
    pub original_qty: i64,
    /// Remaining unfilled quantity. Invariant: 0 <= leaves_qty <= original_qty.
    pub leaves_qty: i64,
    pub status: OrderStatus,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

impl Order {
    pub fn new(order_id: u64, side: Side, price: f64, qty: i64, ts: TimestampMs) -> Self {
        Self {
            order_id,
            side,
            price,
            original_qty: qty,
            leaves_qty: qty,
            status: OrderStatus::New,
            created_at: ts,
            updated_at: ts,
        }
    }
}

/// A fill against a resting maker order. `side` and `price` are the
/// maker's, never the taker's; `leaves_qty` is the maker's remainder
/// after this fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub order_id: u64,
    pub trade_id: u64,
    pub side: Side,
    pub price: f64,
    pub fill_qty: i64,
    pub leaves_qty: i64,
    pub timestamp: TimestampMs,
}

/// One displayed level of the synthetic book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLevel {
    pub price: f64,
    pub size: i64,
    pub order_id: u64,
    pub timestamp: TimestampMs,
}

/// A public trade printed on a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub aggressor_side: Side,
    pub price: f64,
    pub size: i64,
    pub trade_id: u64,
    pub timestamp: TimestampMs,
}

/// A synthetic public partial-fill print. Distinct from `FillEvent`:
/// these belong to the market side of the feed, not to the MM's orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFillEvent {
    pub order_id: u64,
    pub price: f64,
    pub filled_size: i64,
    pub remaining_size: i64,
    pub timestamp: TimestampMs,
}

/// One tick of market data crossing from the simulator into the driver.
///
/// `bid_levels` are ordered descending by price, `ask_levels` ascending.
/// `mm_fills` carries the maker fills attributable to the MM's resting
/// orders on this tick; replay regenerates these rather than reading them
/// back from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataEvent {
    pub instrument: String,
    pub best_bid_price: f64,
    pub best_ask_price: f64,
    pub best_bid_size: i64,
    pub best_ask_size: i64,
    pub bid_levels: Vec<OrderLevel>,
    pub ask_levels: Vec<OrderLevel>,
    pub trades: Vec<Trade>,
    pub partial_fills: Vec<PartialFillEvent>,
    pub mm_fills: Vec<FillEvent>,
    pub timestamp: TimestampMs,
    pub sequence_number: i64,
}

impl MarketDataEvent {
    /// Arithmetic mid of the displayed top of book.
    pub fn mid_price(&self) -> f64 {
        (self.best_bid_price + self.best_ask_price) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_starts_new_with_full_leaves() {
        let o = Order::new(7, Side::Buy, 100.5, 12, 1_000);
        assert_eq!(o.status, OrderStatus::New);
        assert_eq!(o.leaves_qty, o.original_qty);
        assert_eq!(o.created_at, o.updated_at);
    }

    #[test]
    fn side_wire_tags_round_trip() {
        assert_eq!(Side::parse(Side::Buy.as_str()), Some(Side::Buy));
        assert_eq!(Side::parse(Side::Sell.as_str()), Some(Side::Sell));
        assert_eq!(Side::parse("HOLD"), None);
    }
}
