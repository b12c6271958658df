// src/matching.rs
//
// Price-time priority matching over passive resting orders.
//
// The engine owns two ordered books: bids sorted descending by price then
// ascending by creation time, asks sorted ascending by price then ascending
// by creation time. Incoming aggressors walk the opposite book from the top
// and fill at the maker's resting price; the aggressor itself is never
// inserted. All mutation is local to the struct.

use crate::types::{FillEvent, Order, OrderStatus, Side, TimestampMs};

#[derive(Debug, Default)]
pub struct MatchingEngine {
    bid_book: Vec<Order>,
    ask_book: Vec<Order>,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bids(&self) -> &[Order] {
        &self.bid_book
    }

    pub fn asks(&self) -> &[Order] {
        &self.ask_book
    }

    /// Validate and insert a resting order.
    ///
    /// Orders with non-positive quantity or price are rejected and not
    /// inserted; everything else is acknowledged and placed at its
    /// price-time position.
    pub fn add_order(&mut self, mut order: Order) -> OrderStatus {
        if order.leaves_qty <= 0 || order.price <= 0.0 {
            return OrderStatus::Rejected;
        }

        order.status = OrderStatus::Acknowledged;
        match order.side {
            Side::Buy => insert_ordered(&mut self.bid_book, order, true),
            Side::Sell => insert_ordered(&mut self.ask_book, order, false),
        }
        OrderStatus::Acknowledged
    }

    /// Remove a resting order by id from either side.
    ///
    /// Returns false when the id is unknown, so a second cancel of the
    /// same id is a no-op.
    pub fn cancel_order(&mut self, order_id: u64) -> bool {
        for book in [&mut self.bid_book, &mut self.ask_book] {
            if let Some(pos) = book.iter().position(|o| o.order_id == order_id) {
                let mut order = book.remove(pos);
                order.status = OrderStatus::Canceled;
                return true;
            }
        }
        false
    }

    /// Match an incoming aggressive order against the opposite book.
    ///
    /// Fills are emitted in book order, which by construction is strict
    /// price-then-time priority, each at the maker's resting price. Fully
    /// consumed makers are removed; partially consumed makers stay with
    /// their leaves decremented. Returns an empty vec for an empty book,
    /// a non-crossing limit, or zero quantity.
    pub fn match_incoming(
        &mut self,
        aggressor_side: Side,
        limit_price: f64,
        qty: i64,
        trade_id: u64,
        ts: TimestampMs,
    ) -> Vec<FillEvent> {
        let mut fills = Vec::new();
        let mut remaining = qty;

        // Aggressor BUY consumes resting asks, aggressor SELL resting bids.
        let passive_book = match aggressor_side {
            Side::Buy => &mut self.ask_book,
            Side::Sell => &mut self.bid_book,
        };

        let mut i = 0;
        while i < passive_book.len() && remaining > 0 {
            let crosses = match aggressor_side {
                Side::Buy => passive_book[i].price <= limit_price,
                Side::Sell => passive_book[i].price >= limit_price,
            };
            if !crosses {
                break;
            }

            let maker = &mut passive_book[i];
            let fill_qty = remaining.min(maker.leaves_qty);
            maker.leaves_qty -= fill_qty;
            maker.updated_at = ts;
            remaining -= fill_qty;

            maker.status = if maker.leaves_qty == 0 {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };

            fills.push(FillEvent {
                order_id: maker.order_id,
                trade_id,
                side: maker.side,
                price: maker.price,
                fill_qty,
                leaves_qty: maker.leaves_qty,
                timestamp: ts,
            });

            if passive_book[i].leaves_qty == 0 {
                passive_book.remove(i);
            } else {
                i += 1;
            }
        }

        fills
    }
}

/// Insert maintaining the book's total order. Bids compare descending by
/// price, asks ascending; equal prices tie-break ascending by created_at
/// so earlier orders keep priority.
fn insert_ordered(book: &mut Vec<Order>, order: Order, is_bid: bool) {
    let idx = book.partition_point(|existing| {
        if existing.price != order.price {
            if is_bid {
                existing.price > order.price
            } else {
                existing.price < order.price
            }
        } else {
            existing.created_at <= order.created_at
        }
    });
    book.insert(idx, order);
}
