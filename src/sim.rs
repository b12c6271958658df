// src/sim.rs
//
// Synthetic market data generator with an embedded passive book for the
// MM's resting orders.
//
// Simulate mode drives a seeded Gaussian mid-price walk, jitters five
// displayed levels per side, prints occasional public trades and partial
// fills, and sweeps each public trade through the MM book to produce
// maker fills. Replay mode reproduces the market side of a recorded log
// and regenerates maker fills fresh against the live MM book.
//
// All randomness comes from one per-instance ChaCha stream seeded from
// the config; the logical clock starts at a fixed epoch and advances one
// millisecond per event. Given the same config, two simulators emit
// bit-identical event streams.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

use crate::config::{SimulationConfig, SimulationMode};
use crate::event_log::{read_event_log, EventLogError, EventLogWriter};
use crate::matching::MatchingEngine;
use crate::mm::OrderGateway;
use crate::types::{
    FillEvent, MarketDataEvent, Order, OrderLevel, OrderStatus, PartialFillEvent, Side,
    TimestampMs, Trade,
};

/// Fixed logical epoch; wall time never reaches the event stream.
pub const SIM_EPOCH_MS: TimestampMs = 1_600_000_000_000;

const BOOK_DEPTH: usize = 5;
const TRADE_PROBABILITY: f64 = 0.2;
const PARTIAL_FILL_PROBABILITY: f64 = 0.4;
const MIN_PRICE: f64 = 0.01;

#[derive(Debug, Error)]
pub enum SimError {
    /// Generating past the end of the replay log; a normal termination
    /// signal for the driver, not a failure.
    #[error("replay log exhausted")]
    ReplayExhausted,
    #[error("replay mode requires a replay log path")]
    MissingReplayPath,
    #[error("volatility must be non-negative, got {0}")]
    InvalidVolatility(f64),
    #[error("failed to open event log: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load replay log: {0}")]
    Log(#[from] EventLogError),
}

pub struct MarketSimulator {
    config: SimulationConfig,
    mid_price: f64,
    noise: Normal<f64>,
    rng: ChaCha8Rng,
    sequence_number: i64,
    sim_order_counter: u64,
    clock_ms: TimestampMs,
    bid_levels: Vec<OrderLevel>,
    ask_levels: Vec<OrderLevel>,
    matching_engine: MatchingEngine,
    event_log: Option<EventLogWriter>,
    replay_events: Vec<MarketDataEvent>,
    replay_index: usize,
}

impl MarketSimulator {
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        if config.volatility < 0.0 || config.volatility.is_nan() {
            return Err(SimError::InvalidVolatility(config.volatility));
        }
        let noise = Normal::new(0.0, config.volatility)
            .map_err(|_| SimError::InvalidVolatility(config.volatility))?;

        let replay_events = match config.mode {
            SimulationMode::Replay => {
                let path = config
                    .replay_log_path
                    .as_deref()
                    .ok_or(SimError::MissingReplayPath)?;
                read_event_log(path)?
            }
            SimulationMode::Simulate => Vec::new(),
        };

        let event_log = match (&config.mode, &config.event_log_path) {
            (SimulationMode::Simulate, Some(path)) => Some(EventLogWriter::create(path)?),
            _ => None,
        };

        let mut sim = Self {
            mid_price: config.initial_price,
            noise,
            rng: ChaCha8Rng::seed_from_u64(config.seed as u64),
            sequence_number: 0,
            sim_order_counter: 0,
            clock_ms: SIM_EPOCH_MS,
            bid_levels: Vec::with_capacity(BOOK_DEPTH),
            ask_levels: Vec::with_capacity(BOOK_DEPTH),
            matching_engine: MatchingEngine::new(),
            event_log,
            replay_events,
            replay_index: 0,
            config,
        };

        if sim.config.mode == SimulationMode::Simulate {
            sim.initialize_order_book();
        }
        Ok(sim)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn matching_engine(&self) -> &MatchingEngine {
        &self.matching_engine
    }

    /// Produce the next market data event.
    ///
    /// `ReplayExhausted` marks the normal end of a replay run; every
    /// other error is a genuine I/O failure at construction time, so the
    /// per-event path is infallible in simulate mode.
    pub fn generate_event(&mut self) -> Result<MarketDataEvent, SimError> {
        let event = match self.config.mode {
            SimulationMode::Replay => self.next_replay_event()?,
            SimulationMode::Simulate => self.next_synthetic_event(),
        };

        if self.config.latency_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(self.config.latency_ms));
        }

        Ok(event)
    }

    fn next_replay_event(&mut self) -> Result<MarketDataEvent, SimError> {
        let Some(recorded) = self.replay_events.get(self.replay_index) else {
            return Err(SimError::ReplayExhausted);
        };
        self.replay_index += 1;

        // The log carries the market side only; maker fills are produced
        // fresh against whatever the MM is resting right now.
        let mut event = recorded.clone();
        event.mm_fills = self.sweep_mm_book(&event.trades);
        Ok(event)
    }

    fn next_synthetic_event(&mut self) -> MarketDataEvent {
        self.clock_ms += 1;
        self.sequence_number += 1;

        // Mid-price diffusion, floored away from zero.
        self.mid_price += self.noise.sample(&mut self.rng);
        self.mid_price = self.mid_price.max(MIN_PRICE);

        self.update_order_book();

        let (trades, partial_fills) = self.simulate_trade_activity();
        let mm_fills = self.sweep_mm_book(&trades);

        let event = MarketDataEvent {
            instrument: self.config.instrument.clone(),
            best_bid_price: self.bid_levels.first().map_or(0.0, |l| l.price),
            best_ask_price: self.ask_levels.first().map_or(0.0, |l| l.price),
            best_bid_size: self.bid_levels.first().map_or(0, |l| l.size),
            best_ask_size: self.ask_levels.first().map_or(0, |l| l.size),
            bid_levels: self.bid_levels.clone(),
            ask_levels: self.ask_levels.clone(),
            trades,
            partial_fills,
            mm_fills,
            timestamp: self.clock_ms,
            sequence_number: self.sequence_number,
        };

        if let Some(writer) = &mut self.event_log {
            // Best effort: a failing log must not abort the run.
            let _ = writer.write_event(&event);
            let _ = writer.flush();
        }

        event
    }

    fn initialize_order_book(&mut self) {
        for i in 1..=BOOK_DEPTH {
            let price_offset = i as f64 * self.config.spread / 2.0;
            let bid_size = self.rng.gen_range(1..=10);
            let bid_id = self.next_sim_order_id();
            self.bid_levels.push(OrderLevel {
                price: self.mid_price - price_offset,
                size: bid_size,
                order_id: bid_id,
                timestamp: self.clock_ms,
            });
            let ask_size = self.rng.gen_range(1..=10);
            let ask_id = self.next_sim_order_id();
            self.ask_levels.push(OrderLevel {
                price: self.mid_price + price_offset,
                size: ask_size,
                order_id: ask_id,
                timestamp: self.clock_ms,
            });
        }
    }

    /// Jitter displayed prices and sizes, then restore each side's order.
    fn update_order_book(&mut self) {
        for level in &mut self.bid_levels {
            level.price += self.rng.gen_range(-0.001..=0.001);
            level.size = (level.size + self.rng.gen_range(-2..=2)).max(1);
        }
        for level in &mut self.ask_levels {
            level.price += self.rng.gen_range(-0.001..=0.001);
            level.size = (level.size + self.rng.gen_range(-2..=2)).max(1);
        }

        self.bid_levels
            .sort_by(|a, b| b.price.total_cmp(&a.price));
        self.ask_levels
            .sort_by(|a, b| a.price.total_cmp(&b.price));
    }

    fn simulate_trade_activity(&mut self) -> (Vec<Trade>, Vec<PartialFillEvent>) {
        let mut trades = Vec::new();
        let mut partial_fills = Vec::new();

        if self.rng.gen_range(0.0..1.0) < TRADE_PROBABILITY {
            let side = if self.rng.gen_range(0.0..1.0) < 0.5 {
                Side::Buy
            } else {
                Side::Sell
            };
            // Aggressors print at the top of the opposite side.
            let levels = match side {
                Side::Buy => &self.ask_levels,
                Side::Sell => &self.bid_levels,
            };

            if let Some(top) = levels.first() {
                let trade_size = self.rng.gen_range(1..=20);
                let trade_price = top.price;

                trades.push(Trade {
                    aggressor_side: side,
                    price: trade_price,
                    size: trade_size,
                    trade_id: self.sequence_number as u64,
                    timestamp: self.clock_ms,
                });

                if self.rng.gen_range(0.0..1.0) < PARTIAL_FILL_PROBABILITY {
                    let filled_size = (trade_size / 2).max(1);
                    partial_fills.push(PartialFillEvent {
                        order_id: self.sequence_number as u64,
                        price: trade_price,
                        filled_size,
                        remaining_size: trade_size - filled_size,
                        timestamp: self.clock_ms,
                    });
                }
            }
        }

        (trades, partial_fills)
    }

    /// Run each public trade through the MM passive book; the resulting
    /// maker fills ride on the event being built.
    fn sweep_mm_book(&mut self, trades: &[Trade]) -> Vec<FillEvent> {
        let mut fills = Vec::new();
        for trade in trades {
            fills.extend(self.matching_engine.match_incoming(
                trade.aggressor_side,
                trade.price,
                trade.size,
                trade.trade_id,
                trade.timestamp,
            ));
        }
        fills
    }

    fn next_sim_order_id(&mut self) -> u64 {
        self.sim_order_counter += 1;
        self.sim_order_counter
    }
}

impl OrderGateway for MarketSimulator {
    fn submit_order(&mut self, order: &Order) -> OrderStatus {
        self.matching_engine.add_order(order.clone())
    }

    fn cancel_order(&mut self, order_id: u64) -> bool {
        self.matching_engine.cancel_order(order_id)
    }
}
