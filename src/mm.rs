// src/mm.rs
//
// Market-maker orchestrator: the per-event driver tying the matching
// venue, accounting, risk engine and strategy together.
//
// For every market data event, in order:
//   1) warn on sequence gaps (non-fatal),
//   2) skip the tick entirely when either book side is empty,
//   3) apply incoming maker fills to accounting + the active-order map,
//   4) mark to mid,
//   5) evaluate risk; on a disallowed state cancel everything and stop,
//   6) cancel stale quotes, snapshot, ask the strategy,
//   7) clamp sizes and submit the new bid/ask pair.
//
// Active orders live in a BTreeMap so cancel ordering is deterministic.

use std::collections::BTreeMap;

use tracing::warn;

use crate::accounting::Accounting;
use crate::config::{FeeSchedule, RiskConfig};
use crate::risk::{RiskManager, RiskRuleResult, RiskState};
use crate::strategy::{Strategy, StrategySnapshot};
use crate::types::{FillEvent, MarketDataEvent, Order, OrderStatus, Side, TimestampMs};

/// High bits tagging MM-owned order ids so they never collide with the
/// simulator's own counters within a run.
pub const MM_ORDER_TAG: u64 = 1 << 48;

/// The order-entry surface the orchestrator drives. Implemented by the
/// market simulator; tests substitute their own recording gateways.
pub trait OrderGateway {
    fn submit_order(&mut self, order: &Order) -> OrderStatus;
    fn cancel_order(&mut self, order_id: u64) -> bool;
}

/// Snapshot of the maker's books and risk posture, for the CLI report
/// and the transport metrics payload.
#[derive(Debug, Clone)]
pub struct MakerReport {
    pub position: i64,
    pub cash: f64,
    pub mark_price: f64,
    pub avg_entry_price: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub net_pnl: f64,
    pub fees: f64,
    pub rebates: f64,
    pub gross_exposure: f64,
    pub net_exposure: f64,
    pub risk_state: RiskState,
    pub drawdown: f64,
    pub high_water_mark: f64,
    pub total_fills: u64,
    pub active_orders: usize,
    pub strategy: &'static str,
    pub inventory_skew: f64,
}

pub struct MarketMaker {
    accounting: Accounting,
    risk_manager: RiskManager,
    strategy: Box<dyn Strategy>,
    active_orders: BTreeMap<u64, Order>,
    last_bid_price: f64,
    last_ask_price: f64,
    has_last_event: bool,
    last_processed_sequence: i64,
    order_counter: u64,
    total_fills: u64,
}

impl MarketMaker {
    pub fn new(
        initial_capital: f64,
        fees: FeeSchedule,
        risk_config: RiskConfig,
        strategy: Box<dyn Strategy>,
    ) -> Self {
        Self {
            accounting: Accounting::new(initial_capital, fees),
            risk_manager: RiskManager::new(risk_config),
            strategy,
            active_orders: BTreeMap::new(),
            last_bid_price: 0.0,
            last_ask_price: 0.0,
            has_last_event: false,
            last_processed_sequence: 0,
            order_counter: 0,
            total_fills: 0,
        }
    }

    /// Drive one market data event through the full control loop.
    pub fn on_market_data(&mut self, md: &MarketDataEvent, gateway: &mut dyn OrderGateway) {
        if md.sequence_number != self.last_processed_sequence + 1 && self.last_processed_sequence != 0
        {
            warn!(
                missed = md.sequence_number - self.last_processed_sequence - 1,
                sequence = md.sequence_number,
                "sequence gap detected"
            );
        }
        self.last_processed_sequence = md.sequence_number;

        if md.bid_levels.is_empty() || md.ask_levels.is_empty() {
            warn!(sequence = md.sequence_number, "empty order book, skipping quote update");
            return;
        }

        // Maker fills for our resting orders arrive with the event.
        for fill in &md.mm_fills {
            if self.active_orders.contains_key(&fill.order_id) {
                self.on_fill(fill);
            }
        }

        let mid_price = md.mid_price();
        self.accounting.mark_to_market(mid_price);

        self.risk_manager.evaluate(&self.accounting, md, mid_price);
        if !self.risk_manager.is_quoting_allowed() {
            self.cancel_all_orders(gateway, md.timestamp);
            return;
        }

        self.update_quotes(md, gateway);

        self.last_bid_price = md.best_bid_price;
        self.last_ask_price = md.best_ask_price;
        self.has_last_event = true;
    }

    fn on_fill(&mut self, fill: &FillEvent) {
        self.total_fills += 1;

        // Resting orders always earn the maker role.
        self.accounting
            .on_fill(fill.side, fill.price, fill.fill_qty, true);

        if fill.leaves_qty == 0 {
            self.active_orders.remove(&fill.order_id);
        } else if let Some(order) = self.active_orders.get_mut(&fill.order_id) {
            order.leaves_qty = fill.leaves_qty;
            order.status = OrderStatus::PartiallyFilled;
            order.updated_at = fill.timestamp;
        }
    }

    fn cancel_all_orders(&mut self, gateway: &mut dyn OrderGateway, now: TimestampMs) {
        for order_id in std::mem::take(&mut self.active_orders).into_keys() {
            self.risk_manager.record_cancel(now);
            gateway.cancel_order(order_id);
        }
    }

    fn update_quotes(&mut self, md: &MarketDataEvent, gateway: &mut dyn OrderGateway) {
        // Stale quotes go first; the strategy sees a clean slate.
        self.cancel_all_orders(gateway, md.timestamp);

        let best_bid = md.bid_levels[0].price;
        let best_ask = md.ask_levels[0].price;
        let mid_price = (best_bid + best_ask) / 2.0;

        let snapshot = StrategySnapshot {
            best_bid,
            best_ask,
            mid_price,
            bid_levels: md.bid_levels.clone(),
            ask_levels: md.ask_levels.clone(),
            trades: md.trades.clone(),
            position: self.accounting.position(),
            max_position: self.risk_manager.config().max_net_position,
            timestamp: md.timestamp,
            sequence_number: md.sequence_number,
        };

        let decision = self.strategy.compute_quotes(&snapshot);
        if !decision.should_quote {
            return;
        }

        let cfg = self.risk_manager.config();
        let bid_size = decision.bid_size.clamp(cfg.min_quote_size, cfg.max_quote_size);
        let ask_size = decision.ask_size.clamp(cfg.min_quote_size, cfg.max_quote_size);

        self.submit_quote(gateway, Side::Buy, decision.bid_price, bid_size, md.timestamp);
        self.submit_quote(gateway, Side::Sell, decision.ask_price, ask_size, md.timestamp);
    }

    fn submit_quote(
        &mut self,
        gateway: &mut dyn OrderGateway,
        side: Side,
        price: f64,
        size: i64,
        ts: TimestampMs,
    ) {
        let order_id = self.generate_order_id();
        let mut order = Order::new(order_id, side, price, size, ts);
        if gateway.submit_order(&order) == OrderStatus::Acknowledged {
            order.status = OrderStatus::Acknowledged;
            self.active_orders.insert(order_id, order);
            self.risk_manager.record_quote(ts);
        }
    }

    fn generate_order_id(&mut self) -> u64 {
        self.order_counter += 1;
        MM_ORDER_TAG | self.order_counter
    }

    /// Mark at the last observed mid and summarize the run.
    pub fn report(&mut self) -> Option<MakerReport> {
        if !self.has_last_event {
            return None;
        }

        let mark = (self.last_bid_price + self.last_ask_price) / 2.0;
        self.accounting.mark_to_market(mark);

        Some(MakerReport {
            position: self.accounting.position(),
            cash: self.accounting.cash(),
            mark_price: mark,
            avg_entry_price: self.accounting.avg_entry_price(),
            realized_pnl: self.accounting.realized_pnl(),
            unrealized_pnl: self.accounting.unrealized_pnl(),
            total_pnl: self.accounting.total_pnl(),
            net_pnl: self.accounting.net_pnl(),
            fees: self.accounting.total_fees(),
            rebates: self.accounting.total_rebates(),
            gross_exposure: self.accounting.gross_exposure(mark),
            net_exposure: self.accounting.net_exposure(mark),
            risk_state: self.risk_manager.current_state(),
            drawdown: self.risk_manager.current_drawdown(),
            high_water_mark: self.risk_manager.high_water_mark(),
            total_fills: self.total_fills,
            active_orders: self.active_orders.len(),
            strategy: self.strategy.name(),
            inventory_skew: crate::strategy::HeuristicStrategy::inventory_skew(
                self.accounting.position(),
            ),
        })
    }

    pub fn accounting(&self) -> &Accounting {
        &self.accounting
    }

    pub fn risk_state(&self) -> RiskState {
        self.risk_manager.current_state()
    }

    pub fn risk_details(&self) -> &[RiskRuleResult] {
        self.risk_manager.last_results()
    }

    pub fn engage_kill_switch(&mut self) {
        self.risk_manager.engage_kill_switch();
    }

    pub fn reset_kill_switch(&mut self) {
        self.risk_manager.reset_kill_switch();
    }

    pub fn total_fills(&self) -> u64 {
        self.total_fills
    }

    pub fn active_order_count(&self) -> usize {
        self.active_orders.len()
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.active_orders.values()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn mark_price(&self) -> f64 {
        if self.has_last_event {
            (self.last_bid_price + self.last_ask_price) / 2.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::HeuristicStrategy;
    use crate::types::OrderLevel;

    /// Gateway that acknowledges everything and records the traffic.
    #[derive(Debug, Default)]
    struct RecordingGateway {
        submitted: Vec<Order>,
        canceled: Vec<u64>,
    }

    impl OrderGateway for RecordingGateway {
        fn submit_order(&mut self, order: &Order) -> OrderStatus {
            self.submitted.push(order.clone());
            OrderStatus::Acknowledged
        }

        fn cancel_order(&mut self, order_id: u64) -> bool {
            self.canceled.push(order_id);
            true
        }
    }

    fn level(price: f64, size: i64, id: u64, ts: TimestampMs) -> OrderLevel {
        OrderLevel {
            price,
            size,
            order_id: id,
            timestamp: ts,
        }
    }

    fn event(seq: i64, ts: TimestampMs) -> MarketDataEvent {
        MarketDataEvent {
            instrument: "XYZ".to_string(),
            best_bid_price: 99.95,
            best_ask_price: 100.05,
            best_bid_size: 10,
            best_ask_size: 10,
            bid_levels: vec![level(99.95, 10, 1, ts)],
            ask_levels: vec![level(100.05, 10, 2, ts)],
            trades: Vec::new(),
            partial_fills: Vec::new(),
            mm_fills: Vec::new(),
            timestamp: ts,
            sequence_number: seq,
        }
    }

    fn maker() -> MarketMaker {
        MarketMaker::new(
            100_000.0,
            FeeSchedule::default(),
            RiskConfig::default(),
            Box::new(HeuristicStrategy::new()),
        )
    }

    #[test]
    fn quotes_both_sides_each_tick() {
        let mut mm = maker();
        let mut gw = RecordingGateway::default();

        mm.on_market_data(&event(1, 1_000), &mut gw);
        assert_eq!(gw.submitted.len(), 2);
        assert_eq!(mm.active_order_count(), 2);
        assert_eq!(gw.submitted[0].side, Side::Buy);
        assert_eq!(gw.submitted[1].side, Side::Sell);

        // Next tick cancels the stale pair before re-quoting.
        mm.on_market_data(&event(2, 1_001), &mut gw);
        assert_eq!(gw.canceled.len(), 2);
        assert_eq!(gw.submitted.len(), 4);
        assert_eq!(mm.active_order_count(), 2);
    }

    #[test]
    fn mm_ids_carry_the_owner_tag() {
        let mut mm = maker();
        let mut gw = RecordingGateway::default();
        mm.on_market_data(&event(1, 1_000), &mut gw);

        for order in &gw.submitted {
            assert_ne!(order.order_id & MM_ORDER_TAG, 0);
        }
    }

    #[test]
    fn empty_book_skips_the_tick() {
        let mut mm = maker();
        let mut gw = RecordingGateway::default();

        let mut md = event(1, 1_000);
        md.ask_levels.clear();
        mm.on_market_data(&md, &mut gw);
        assert!(gw.submitted.is_empty());
        assert_eq!(mm.active_order_count(), 0);
    }

    #[test]
    fn maker_fill_flows_into_accounting() {
        let mut mm = maker();
        let mut gw = RecordingGateway::default();

        mm.on_market_data(&event(1, 1_000), &mut gw);
        let bid = gw.submitted[0].clone();

        let mut md = event(2, 1_001);
        md.mm_fills.push(FillEvent {
            order_id: bid.order_id,
            trade_id: 900,
            side: Side::Buy,
            price: bid.price,
            fill_qty: bid.original_qty,
            leaves_qty: 0,
            timestamp: 1_001,
        });
        mm.on_market_data(&md, &mut gw);

        assert_eq!(mm.total_fills(), 1);
        assert_eq!(mm.accounting().position(), bid.original_qty);
    }

    #[test]
    fn partial_fill_updates_leaves_in_place() {
        let mut mm = maker();
        let mut gw = RecordingGateway::default();

        mm.on_market_data(&event(1, 1_000), &mut gw);
        let bid = gw.submitted[0].clone();

        // Fill part of the bid; the rest of the tick is an empty book so
        // the order map is left alone after the fill is applied.
        let mut md = event(2, 1_001);
        md.bid_levels.clear();
        md.mm_fills.push(FillEvent {
            order_id: bid.order_id,
            trade_id: 901,
            side: Side::Buy,
            price: bid.price,
            fill_qty: 2,
            leaves_qty: bid.original_qty - 2,
            timestamp: 1_001,
        });
        mm.on_market_data(&md, &mut gw);
        // Empty book: tick skipped before fills are applied.
        assert_eq!(mm.total_fills(), 0);

        let mut md = event(3, 1_002);
        md.mm_fills.push(FillEvent {
            order_id: bid.order_id,
            trade_id: 902,
            side: Side::Buy,
            price: bid.price,
            fill_qty: 2,
            leaves_qty: bid.original_qty - 2,
            timestamp: 1_002,
        });
        mm.on_market_data(&md, &mut gw);
        assert_eq!(mm.total_fills(), 1);
        assert_eq!(mm.accounting().position(), 2);
    }

    #[test]
    fn breach_cancels_everything_and_stops_quoting() {
        let cfg = RiskConfig {
            max_quote_spread: 0.05, // the 0.1 book spread breaches instantly
            ..RiskConfig::default()
        };
        let mut mm = MarketMaker::new(
            100_000.0,
            FeeSchedule::default(),
            cfg,
            Box::new(HeuristicStrategy::new()),
        );
        let mut gw = RecordingGateway::default();

        mm.on_market_data(&event(1, 1_000), &mut gw);
        assert_eq!(mm.risk_state(), RiskState::Breached);
        assert!(gw.submitted.is_empty());
        assert_eq!(mm.active_order_count(), 0);
    }

    #[test]
    fn kill_switch_blocks_quoting_until_reset() {
        let mut mm = maker();
        let mut gw = RecordingGateway::default();

        mm.on_market_data(&event(1, 1_000), &mut gw);
        assert_eq!(mm.active_order_count(), 2);

        mm.engage_kill_switch();
        mm.on_market_data(&event(2, 1_001), &mut gw);
        // Resting orders were flushed and nothing new submitted.
        assert_eq!(mm.active_order_count(), 0);
        assert_eq!(gw.submitted.len(), 2);
        assert_eq!(mm.risk_state(), RiskState::KillSwitch);

        mm.reset_kill_switch();
        mm.on_market_data(&event(3, 1_002), &mut gw);
        assert_eq!(mm.active_order_count(), 2);
    }

    #[test]
    fn report_reflects_accounting_and_risk() {
        let mut mm = maker();
        let mut gw = RecordingGateway::default();
        assert!(mm.report().is_none());

        mm.on_market_data(&event(1, 1_000), &mut gw);
        let report = mm.report().expect("has events");
        assert_eq!(report.position, 0);
        assert_eq!(report.strategy, "heuristic");
        assert_eq!(report.active_orders, 2);
        assert!((report.mark_price - 100.0).abs() < 1e-9);
    }
}
