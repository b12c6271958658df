// src/accounting.rs
//
// Double-entry position and P&L accounting.
//
//  - signed integer position with an absolute cost basis
//    (|position| * average entry price, always >= 0),
//  - realized P&L on the closing portion of every opposite-side fill,
//  - unrealized P&L re-marked after every fill and on demand,
//  - fees and rebates accumulated from the fee schedule.
//
// Invariants (checked by the tests, relied on by the risk manager):
//   total_pnl == realized + unrealized after every operation;
//   position == 0  =>  cost_basis == 0 and unrealized == 0;
//   net_pnl == total_pnl - fees + rebates.

use crate::config::FeeSchedule;
use crate::types::Side;

#[derive(Debug, Clone)]
pub struct Accounting {
    initial_capital: f64,
    cash: f64,
    position: i64,
    cost_basis: f64,
    realized_pnl: f64,
    unrealized_pnl: f64,
    total_fees: f64,
    total_rebates: f64,
    mark_price: f64,
    fees: FeeSchedule,
}

impl Accounting {
    pub fn new(initial_capital: f64, fees: FeeSchedule) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: 0,
            cost_basis: 0.0,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            total_fees: 0.0,
            total_rebates: 0.0,
            mark_price: 0.0,
            fees,
        }
    }

    /// Apply one fill.
    ///
    /// Same-sign fills extend the cost basis by notional; opposite-sign
    /// fills realize P&L on the closing quantity at the average entry
    /// price and, on a flip, reset the basis for the freshly opened
    /// remainder. The mark moves to the fill price afterwards.
    pub fn on_fill(&mut self, side: Side, price: f64, qty: i64, is_maker: bool) {
        let notional = price * qty as f64;

        // Fees first: bps on notional, then the per-share role component.
        let mut fee = notional * (self.fees.fee_bps / 10_000.0);
        if is_maker {
            let rebate = self.fees.maker_rebate_per_share * qty as f64;
            self.total_rebates += rebate;
            fee -= rebate;
        } else {
            fee += self.fees.taker_fee_per_share * qty as f64;
        }
        self.total_fees += fee;

        match side {
            Side::Buy => {
                self.cash -= notional;
                if self.position >= 0 {
                    // Opening or extending a long.
                    self.cost_basis += notional;
                } else {
                    // Closing a short, possibly flipping long.
                    let close_qty = qty.min(-self.position);
                    let open_qty = qty - close_qty;
                    let avg_entry = self.avg_entry_price();
                    self.realized_pnl += (avg_entry - price) * close_qty as f64;
                    if open_qty > 0 {
                        self.cost_basis = price * open_qty as f64;
                    } else {
                        self.cost_basis -= avg_entry * close_qty as f64;
                    }
                }
                self.position += qty;
            }
            Side::Sell => {
                self.cash += notional;
                if self.position <= 0 {
                    // Opening or extending a short; basis stays absolute.
                    self.cost_basis += notional;
                } else {
                    // Closing a long, possibly flipping short.
                    let close_qty = qty.min(self.position);
                    let open_qty = qty - close_qty;
                    let avg_entry = self.avg_entry_price();
                    self.realized_pnl += (price - avg_entry) * close_qty as f64;
                    if open_qty > 0 {
                        self.cost_basis = price * open_qty as f64;
                    } else {
                        self.cost_basis -= avg_entry * close_qty as f64;
                    }
                }
                self.position -= qty;
            }
        }

        // Flat book carries no basis.
        if self.position == 0 {
            self.cost_basis = 0.0;
        }

        self.mark_to_market(price);
    }

    /// Re-mark the open position: longs earn mark - entry, shorts
    /// entry - mark; flat is exactly zero.
    pub fn mark_to_market(&mut self, mark_price: f64) {
        self.mark_price = mark_price;
        if self.position != 0 {
            let avg = self.avg_entry_price();
            self.unrealized_pnl = if self.position > 0 {
                (mark_price - avg) * self.position as f64
            } else {
                (avg - mark_price) * (-self.position) as f64
            };
        } else {
            self.unrealized_pnl = 0.0;
        }
    }

    pub fn avg_entry_price(&self) -> f64 {
        if self.position == 0 {
            0.0
        } else {
            self.cost_basis / self.position.unsigned_abs() as f64
        }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cost_basis(&self) -> f64 {
        self.cost_basis
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.unrealized_pnl
    }

    pub fn total_pnl(&self) -> f64 {
        self.realized_pnl + self.unrealized_pnl
    }

    pub fn net_pnl(&self) -> f64 {
        self.total_pnl() - self.total_fees + self.total_rebates
    }

    pub fn total_fees(&self) -> f64 {
        self.total_fees
    }

    pub fn total_rebates(&self) -> f64 {
        self.total_rebates
    }

    pub fn mark_price(&self) -> f64 {
        self.mark_price
    }

    pub fn gross_exposure(&self, mark_price: f64) -> f64 {
        self.position.unsigned_abs() as f64 * mark_price
    }

    pub fn net_exposure(&self, mark_price: f64) -> f64 {
        self.position as f64 * mark_price
    }

    /// Zero the daily accumulators while keeping the open position and
    /// its basis intact.
    pub fn reset_daily(&mut self) {
        self.realized_pnl = 0.0;
        self.unrealized_pnl = 0.0;
        self.total_fees = 0.0;
        self.total_rebates = 0.0;
    }
}
