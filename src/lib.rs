//! Passiva core library.
//!
//! A deterministic single-instrument market-making simulator. The crate
//! is a coordinated stack of small components:
//!
//! - **Matching** (`matching`): price-time priority book over passive
//!   maker orders; incoming aggressors fill at the maker's resting price.
//! - **Estimators** (`estimators`): windowed realized volatility and
//!   normalized order-flow imbalance.
//! - **Accounting** (`accounting`): signed position, absolute cost basis,
//!   realized/unrealized P&L, fees and rebates.
//! - **Risk** (`risk`): seven per-tick rules aggregated into a four-state
//!   machine with cooldown-gated recovery and a sticky kill switch.
//! - **Strategy** (`strategy`): pure snapshot-to-quotes transforms; a
//!   fixed-spread heuristic and an inventory-aware reservation quoter.
//! - **Orchestrator** (`mm`): the per-event driver wiring fills, marks,
//!   risk and quote submission together.
//! - **Simulator** (`sim`): seeded synthetic market data with an embedded
//!   passive book for the MM's orders, plus log replay.
//!
//! Determinism is the load-bearing property: given one configuration and
//! seed, every event, fill, quote and P&L figure is bit-identical across
//! runs and across a generate/replay round trip. The binaries
//! (`src/main.rs`, `src/bin/ws_server.rs`) are thin drivers around these
//! components.

pub mod accounting;
pub mod binary_log;
pub mod config;
pub mod estimators;
pub mod event_log;
pub mod fingerprint;
pub mod matching;
pub mod metrics;
pub mod mm;
pub mod risk;
pub mod sim;
pub mod strategy;
pub mod types;
pub mod wsproto;

// --- Re-exports for ergonomic external use ---------------------------------

pub use accounting::Accounting;
pub use config::{
    FeeSchedule, ReservationQuoterConfig, RiskConfig, SimulationConfig, SimulationMode,
};
pub use estimators::{RollingOfi, RollingVolatility};
pub use fingerprint::{event_fingerprint, fnv1a64, fnv1a64_update, RunDigest};
pub use matching::MatchingEngine;
pub use mm::{MakerReport, MarketMaker, OrderGateway, MM_ORDER_TAG};
pub use risk::{RiskManager, RiskRuleId, RiskRuleResult, RiskState};
pub use sim::{MarketSimulator, SimError, SIM_EPOCH_MS};
pub use strategy::{
    HeuristicStrategy, QuoteDecision, ReservationQuoter, Strategy, StrategySnapshot,
};
pub use types::{
    FillEvent, MarketDataEvent, Order, OrderLevel, OrderStatus, PartialFillEvent, Side,
    TimestampMs, Trade,
};
