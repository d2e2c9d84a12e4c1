use rust_decimal::Decimal;

use crate::engine::state::{Position, DUST_THRESHOLD};
use crate::models::{IndicatorSnapshot, OrderIntent, OrderSizing, ReasonCode, Side, Trend};
use crate::strategy::SignalFacts;

/// What this cycle does. At most one order attempt is possible per cycle,
/// so the rule table collapses every firing rule down to the first match.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Hold,
    Buy { quote_size: Decimal },
    Sell { base_size: f64, reason: ReasonCode },
}

impl Action {
    /// Turn a decided action into the single order intent for this cycle.
    pub fn into_intent(self) -> Option<OrderIntent> {
        match self {
            Action::Hold => None,
            Action::Buy { quote_size } => Some(OrderIntent::new(
                Side::Buy,
                OrderSizing::Quote(quote_size),
                ReasonCode::MacdBuySignal,
            )),
            Action::Sell { base_size, reason } => {
                Some(OrderIntent::new(Side::Sell, OrderSizing::Base(base_size), reason))
            }
        }
    }
}

/// Which balance view sizes the bearish-crossover exit: the snapshot
/// captured at cycle start, or the refreshed value the other exits read.
/// A named parameter so the choice never hides in variable scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingBalance {
    CycleStart,
    Refreshed,
}

/// Everything the rule table reads for one cycle. Balances are plain
/// arguments, never looked up through captured closures.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub facts: &'a SignalFacts,
    pub cur: &'a IndicatorSnapshot,
    pub position: &'a Position,
    /// Quote (USD) balance available this cycle.
    pub quote_balance: f64,
    /// Base (ETH) balance as currently known.
    pub base_balance: f64,
    /// Base balance snapshot captured at the start of the cycle.
    pub cycle_start_base: f64,
    pub is_new_candle: bool,
}

/// The position state machine's decision table.
///
/// Rules are evaluated in a fixed priority order and exactly the first
/// match becomes the cycle's action:
///
/// 1. entry (new candle, MACD surging up, nothing held)
/// 2. take-profit exit
/// 3. momentum-loss exit
/// 4. bearish-crossover exit
#[derive(Debug, Clone)]
pub struct RuleTable {
    /// Minimum MACD rise over the previous candle to enter.
    pub entry_delta_min: f64,
    /// MACD rise at or below this while above the signal line exits.
    pub momentum_delta_max: f64,
    /// Take-profit target as a multiple of entry price.
    pub take_profit_ratio: f64,
    pub crossover_sizing: SizingBalance,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            entry_delta_min: 10.0,
            momentum_delta_max: 2.5,
            take_profit_ratio: 1.03,
            crossover_sizing: SizingBalance::CycleStart,
        }
    }
}

impl RuleTable {
    pub fn decide(&self, ctx: &RuleContext<'_>) -> Action {
        self.entry(ctx)
            .or_else(|| self.take_profit(ctx))
            .or_else(|| self.momentum_loss(ctx))
            .or_else(|| self.bearish_crossover(ctx))
            .unwrap_or(Action::Hold)
    }

    /// Rule 1: FLAT -> LONG on a fresh candle whose MACD jumped at least
    /// `entry_delta_min` while trending up. Spends the entire quote
    /// balance, rounded to cents for the order payload.
    fn entry(&self, ctx: &RuleContext<'_>) -> Option<Action> {
        if !ctx.is_new_candle {
            return None;
        }
        if ctx.facts.macd_delta < self.entry_delta_min || ctx.facts.macd_trend != Trend::Up {
            return None;
        }
        if ctx.base_balance > DUST_THRESHOLD {
            tracing::info!("buy signal but already holding {:.6} base units", ctx.base_balance);
            return None;
        }

        // Always two decimal places so the payload reads as cents.
        let mut quote_size = Decimal::from_f64_retain(ctx.quote_balance)
            .unwrap_or_default()
            .round_dp(2);
        quote_size.rescale(2);
        Some(Action::Buy { quote_size })
    }

    /// Rule 2: sell everything once the candle high clears the take-profit
    /// target while MACD still sits above the signal line.
    fn take_profit(&self, ctx: &RuleContext<'_>) -> Option<Action> {
        let entry_price = ctx.position.entry_price()?;
        let target = entry_price * self.take_profit_ratio;

        if ctx.cur.high < target || !ctx.facts.macd_above_signal {
            return None;
        }
        if ctx.base_balance <= DUST_THRESHOLD {
            tracing::debug!("take-profit matched but balance is dust, skipping");
            return None;
        }

        Some(Action::Sell {
            base_size: ctx.base_balance,
            reason: ReasonCode::TakeProfit,
        })
    }

    /// Rule 3: MACD still above the signal line but barely rising (or
    /// falling) means momentum is gone; sell regardless of profit target.
    fn momentum_loss(&self, ctx: &RuleContext<'_>) -> Option<Action> {
        if !ctx.facts.macd_above_signal || ctx.facts.macd_delta > self.momentum_delta_max {
            return None;
        }
        if ctx.base_balance <= DUST_THRESHOLD {
            tracing::debug!("momentum-loss matched but balance is dust, skipping");
            return None;
        }

        Some(Action::Sell {
            base_size: ctx.base_balance,
            reason: ReasonCode::MomentumLoss,
        })
    }

    /// Rule 4: MACD below the signal line and falling. Sized from the
    /// balance view selected by `crossover_sizing`.
    fn bearish_crossover(&self, ctx: &RuleContext<'_>) -> Option<Action> {
        if ctx.facts.macd_above_signal || ctx.facts.macd_trend != Trend::Down {
            return None;
        }

        let sizing_base = match self.crossover_sizing {
            SizingBalance::CycleStart => ctx.cycle_start_base,
            SizingBalance::Refreshed => ctx.base_balance,
        };
        if sizing_base <= DUST_THRESHOLD {
            tracing::debug!("bearish crossover matched but nothing to sell");
            return None;
        }

        Some(Action::Sell {
            base_size: sizing_base,
            reason: ReasonCode::BearishCrossover,
        })
    }
}
