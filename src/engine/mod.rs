// Position lifecycle and cycle orchestration
pub mod coordinator;
pub mod rules;
pub mod state;

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Duration;

use crate::api::{MarketDataSource, OrderSink};
use crate::config::TradingSettings;
use crate::db::TradeStore;
use crate::error::BotError;
use crate::market::CandleSeries;
use crate::models::{AccountSnapshot, ReasonCode};
use crate::strategy::evaluate;

pub use coordinator::{ExecutionOutcome, OrderExecutor};
pub use rules::{Action, RuleContext, RuleTable, SizingBalance};
pub use state::{CycleState, Position, PositionState, DUST_THRESHOLD};

/// What one cycle decided and, if an order went out, how it ended.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub action: Action,
    pub outcome: Option<ExecutionOutcome>,
}

/// The trading loop: once per cycle, pull balances and candles, derive
/// facts, run the rule table, and hand at most one intent to the
/// coordinator. One cycle always runs to completion before the next
/// starts; nothing here is shared across tasks.
pub struct Engine {
    market: Arc<dyn MarketDataSource>,
    orders: Arc<dyn OrderSink>,
    store: Option<TradeStore>,
    rules: RuleTable,
    trading: TradingSettings,
    state: CycleState,
}

impl Engine {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        orders: Arc<dyn OrderSink>,
        store: Option<TradeStore>,
        rules: RuleTable,
        trading: TradingSettings,
    ) -> Self {
        Self {
            market,
            orders,
            store,
            rules,
            trading,
            state: CycleState::new(),
        }
    }

    /// Start from explicit process state instead of a cold flat one.
    pub fn with_state(
        market: Arc<dyn MarketDataSource>,
        orders: Arc<dyn OrderSink>,
        store: Option<TradeStore>,
        rules: RuleTable,
        trading: TradingSettings,
        state: CycleState,
    ) -> Self {
        Self {
            market,
            orders,
            store,
            rules,
            trading,
            state,
        }
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    /// Run cycles forever, sleeping the inter-cycle delay between them and
    /// the shorter fallback delay after a fetch failure.
    pub async fn run(&mut self) {
        loop {
            let delay_secs = match self.run_cycle().await {
                Ok(report) => {
                    if let Some(outcome) = &report.outcome {
                        tracing::info!(
                            "cycle complete: {} order {} -> {}",
                            outcome.intent.side.as_str(),
                            outcome.intent.client_order_id,
                            outcome.status.as_str()
                        );
                    }
                    self.trading.cycle_delay_secs
                }
                Err(e) if e.is_transient_fetch() => {
                    tracing::warn!("cycle aborted: {}", e);
                    self.trading.fallback_delay_secs
                }
                Err(BotError::InsufficientHistory { have, need }) => {
                    tracing::warn!(
                        "only {} candles fetched, need {}; skipping decisions this cycle",
                        have,
                        need
                    );
                    self.trading.cycle_delay_secs
                }
                Err(e) => {
                    tracing::error!("cycle failed: {}", e);
                    self.trading.cycle_delay_secs
                }
            };

            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }
    }

    /// One full cycle: fetch -> compute -> decide -> execute -> report.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, BotError> {
        // Balances first; the base amount captured here is the cycle-start
        // snapshot some sizing deliberately reads.
        let raw_balances = self.market.balances().await?;
        let balances = AccountSnapshot {
            quote_balance: raw_balances
                .get(&self.trading.quote_currency)
                .copied()
                .unwrap_or(0.0),
            base_balance: raw_balances
                .get(&self.trading.base_currency)
                .copied()
                .unwrap_or(0.0),
        };
        let cycle_start_base = balances.base_balance;

        self.state.position.reconcile_balance(balances.base_balance);

        let raw_candles = self
            .market
            .candles(self.trading.lookback_secs, &self.trading.granularity)
            .await?;
        let series = CandleSeries::from_raw(raw_candles)?;

        let prev = series.previous();
        let cur = series.latest();
        let facts = evaluate(&prev, &cur);

        if cur.macd < cur.signal {
            self.state.momentum_exit_armed = false;
        }

        let is_new_candle = series.is_new_candle(self.state.last_candle_start);
        if is_new_candle {
            if let Some(store) = &self.store {
                if let Err(e) = store.record_market_data(&cur, &facts, Utc::now()).await {
                    tracing::error!("failed to persist market data row: {}", e);
                }
            }
            self.state.last_candle_start = Some(cur.start);
        }

        let ctx = RuleContext {
            facts: &facts,
            cur: &cur,
            position: &self.state.position,
            quote_balance: balances.quote_balance,
            base_balance: balances.base_balance,
            cycle_start_base,
            is_new_candle,
        };
        let action = self.rules.decide(&ctx);

        if matches!(
            action,
            Action::Sell {
                reason: ReasonCode::MomentumLoss,
                ..
            }
        ) {
            self.state.momentum_exit_armed = true;
        }

        let outcome = match action.clone().into_intent() {
            Some(intent) => {
                let executor = OrderExecutor::new(self.orders.as_ref(), self.store.as_ref());
                Some(
                    executor
                        .execute(
                            intent,
                            &cur,
                            &balances,
                            &mut self.state.position,
                            self.rules.take_profit_ratio,
                        )
                        .await,
                )
            }
            None => None,
        };

        self.log_status(&cur, &facts, &balances);

        Ok(CycleReport { action, outcome })
    }

    /// Per-cycle operator status block.
    fn log_status(
        &self,
        cur: &crate::models::IndicatorSnapshot,
        facts: &crate::strategy::SignalFacts,
        balances: &AccountSnapshot,
    ) {
        tracing::info!("price: ${:.2}", cur.close);
        tracing::info!("fast EMA: {:.6}  slow EMA: {:.6}", cur.ema_fast, cur.ema_slow);
        tracing::info!("MACD: {:.6}  signal: {:.6}", cur.macd, cur.signal);
        tracing::info!(
            "MACD trend: {}  signal trend: {}  posture: {}",
            facts.macd_trend.as_str(),
            facts.signal_trend.as_str(),
            if facts.macd_above_signal {
                "MACD above signal"
            } else {
                "MACD below signal"
            }
        );
        tracing::info!(
            "{} balance: ${:.2}  {} balance: {:.6}",
            self.trading.quote_currency,
            balances.quote_balance,
            self.trading.base_currency,
            balances.base_balance
        );
        tracing::info!("momentum exit armed: {}", self.state.momentum_exit_armed);

        if let Some(entry_price) = self.state.position.entry_price() {
            if let Some((usd, pct)) = self.state.position.unrealized_pnl(cur.close) {
                tracing::info!(
                    "entry price: ${:.2}  unrealized P/L: {:+.2} USD ({:+.2}%)",
                    entry_price,
                    usd,
                    pct
                );
            }
        }
    }
}
