use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;

use crate::api::OrderSink;
use crate::db::TradeStore;
use crate::engine::state::Position;
use crate::error::BotError;
use crate::models::{
    AccountSnapshot, IndicatorSnapshot, OrderIntent, OrderSizing, Side, TradeRecord, TradeStatus,
};

/// What one order attempt came to.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub intent: OrderIntent,
    pub status: TradeStatus,
    /// Price the attempt was valued at (latest close).
    pub price: f64,
    /// Realized quantity: bought units derived from the quote notional,
    /// or the submitted base size for sells.
    pub quantity: f64,
    /// (USD, percent) realized on a successful exit; `None` for buys,
    /// failures, and exits with no known entry price.
    pub profit_loss: Option<(f64, f64)>,
}

/// Turns one decided intent into exactly one submission attempt, then
/// reconciles: position mutation and audit rows on success, a FAILED
/// trade row and untouched position otherwise.
pub struct OrderExecutor<'a> {
    orders: &'a dyn OrderSink,
    store: Option<&'a TradeStore>,
}

impl<'a> OrderExecutor<'a> {
    pub fn new(orders: &'a dyn OrderSink, store: Option<&'a TradeStore>) -> Self {
        Self { orders, store }
    }

    pub async fn execute(
        &self,
        intent: OrderIntent,
        cur: &IndicatorSnapshot,
        balances: &AccountSnapshot,
        position: &mut Position,
        take_profit_ratio: f64,
    ) -> ExecutionOutcome {
        let now = Utc::now();
        let price = cur.close;
        let quantity = match &intent.sizing {
            OrderSizing::Quote(quote) => quote.to_f64().unwrap_or(0.0) / price,
            OrderSizing::Base(base) => *base,
        };

        tracing::info!(
            "submitting {} order {} ({}): {:?}",
            intent.side.as_str(),
            intent.client_order_id,
            intent.reason.as_str(),
            intent.sizing
        );

        let (accepted, raw_response) = match self.orders.submit_order(&intent).await {
            Ok(result) if result.accepted => (true, result.raw_response),
            Ok(result) => {
                tracing::warn!(
                    "order {} rejected ({}): {}",
                    intent.client_order_id,
                    result.status,
                    result.raw_response
                );
                (false, result.raw_response)
            }
            Err(e) => {
                tracing::error!("order {} submission failed: {}", intent.client_order_id, e);
                (false, e.to_string())
            }
        };

        let status = if accepted {
            TradeStatus::Success
        } else {
            TradeStatus::Failed
        };

        self.persist(
            self.record_trade(&intent, price, quantity, status, cur, now),
            "trade record",
            &intent,
        )
        .await;

        if !accepted {
            return ExecutionOutcome {
                intent,
                status,
                price,
                quantity,
                profit_loss: None,
            };
        }

        self.persist(
            async {
                match self.store {
                    Some(store) => {
                        store
                            .record_balance(balances.base_balance, balances.quote_balance, now)
                            .await
                    }
                    None => Ok(()),
                }
            },
            "balance record",
            &intent,
        )
        .await;

        let profit_loss = match intent.side {
            Side::Buy => {
                position.open(price, now, quantity);
                self.persist(
                    async {
                        match self.store {
                            Some(store) => {
                                store.record_position_open(now, price, quantity).await
                            }
                            None => Ok(()),
                        }
                    },
                    "position open record",
                    &intent,
                )
                .await;
                tracing::info!("went long at ${:.2} for {:.6} units", price, quantity);
                None
            }
            Side::Sell => {
                let entry_price = position.entry_price();
                let take_profit = entry_price.map(|e| e * take_profit_ratio);
                let profit_loss = entry_price.map(|entry| {
                    let usd = (price - entry) * quantity;
                    let pct = ((price - entry) / entry * 100.0 * 100.0).round() / 100.0;
                    (usd, pct)
                });

                self.persist(
                    async {
                        match self.store {
                            Some(store) => {
                                store
                                    .record_position_close(
                                        now,
                                        price,
                                        take_profit,
                                        profit_loss.map(|(usd, _)| usd),
                                        profit_loss.map(|(_, pct)| pct),
                                    )
                                    .await
                            }
                            None => Ok(()),
                        }
                    },
                    "position close record",
                    &intent,
                )
                .await;

                match profit_loss {
                    Some((usd, pct)) => {
                        tracing::info!("closed position at ${:.2}: {:+.2} USD ({:+.2}%)", price, usd, pct)
                    }
                    None => tracing::info!("sold {:.6} units with no recorded entry", quantity),
                }

                position.close();
                profit_loss
            }
        };

        ExecutionOutcome {
            intent,
            status,
            price,
            quantity,
            profit_loss,
        }
    }

    async fn record_trade(
        &self,
        intent: &OrderIntent,
        price: f64,
        quantity: f64,
        status: TradeStatus,
        cur: &IndicatorSnapshot,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), BotError> {
        let Some(store) = self.store else {
            return Ok(());
        };
        store
            .record_trade(&TradeRecord {
                order_id: intent.client_order_id,
                side: intent.side,
                price,
                quantity,
                macd: cur.macd,
                signal: cur.signal,
                reason: intent.reason,
                status,
                timestamp: now,
            })
            .await
    }

    /// A lost audit row is a degraded condition, never a crash: the order
    /// already happened, so log loudly and carry on.
    async fn persist<F>(&self, write: F, what: &str, intent: &OrderIntent)
    where
        F: std::future::Future<Output = Result<(), BotError>>,
    {
        if let Err(e) = write.await {
            tracing::error!(
                "failed to persist {} for order {}: {}",
                what,
                intent.client_order_id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SubmitResult;
    use crate::models::ReasonCode;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSink {
        accepted: bool,
        status: u16,
        transport_error: bool,
        calls: AtomicUsize,
    }

    impl StubSink {
        fn accepting() -> Self {
            Self {
                accepted: true,
                status: 200,
                transport_error: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting(status: u16) -> Self {
            Self {
                accepted: false,
                status,
                transport_error: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                accepted: false,
                status: 0,
                transport_error: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OrderSink for StubSink {
        async fn submit_order(&self, _intent: &OrderIntent) -> Result<SubmitResult, BotError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.transport_error {
                return Err(BotError::Fetch("connection reset".into()));
            }
            Ok(SubmitResult {
                accepted: self.accepted,
                status: self.status,
                raw_response: if self.accepted {
                    r#"{"success":true}"#.to_string()
                } else {
                    r#"{"error":"INSUFFICIENT_FUND"}"#.to_string()
                },
            })
        }
    }

    fn snapshot(close: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            close,
            high: close + 5.0,
            ema_fast: 0.0,
            ema_slow: 0.0,
            macd: 12.0,
            signal: 8.0,
        }
    }

    fn balances() -> AccountSnapshot {
        AccountSnapshot {
            quote_balance: 3000.0,
            base_balance: 1.5,
        }
    }

    #[tokio::test]
    async fn test_successful_buy_opens_position() {
        let sink = StubSink::accepting();
        let executor = OrderExecutor::new(&sink, None);
        let mut position = Position::flat();
        let intent = OrderIntent::new(
            Side::Buy,
            OrderSizing::Quote(Decimal::new(300000, 2)),
            ReasonCode::MacdBuySignal,
        );

        let outcome = executor
            .execute(intent, &snapshot(2000.0), &balances(), &mut position, 1.03)
            .await;

        assert_eq!(outcome.status, TradeStatus::Success);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert!(position.is_long());
        assert_eq!(position.entry_price(), Some(2000.0));
        // 3000 USD at 2000 -> 1.5 units
        assert!((outcome.quantity - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_successful_sell_reports_profit_and_closes() {
        let sink = StubSink::accepting();
        let executor = OrderExecutor::new(&sink, None);
        let mut position = Position::flat();
        position.open(2000.0, Utc::now(), 1.5);

        let intent = OrderIntent::new(
            Side::Sell,
            OrderSizing::Base(1.5),
            ReasonCode::TakeProfit,
        );
        let outcome = executor
            .execute(intent, &snapshot(2060.0), &balances(), &mut position, 1.03)
            .await;

        assert_eq!(outcome.status, TradeStatus::Success);
        let (usd, pct) = outcome.profit_loss.unwrap();
        assert!((usd - 90.0).abs() < 1e-9);
        assert!((pct - 3.0).abs() < 1e-9);
        assert!(!position.is_long());
        assert!(position.entry_price().is_none());
    }

    #[tokio::test]
    async fn test_rejected_order_never_mutates_position() {
        let sink = StubSink::rejecting(400);
        let executor = OrderExecutor::new(&sink, None);
        let mut position = Position::flat();
        position.open(2000.0, Utc::now(), 1.5);
        let before = position.clone();

        let intent = OrderIntent::new(
            Side::Sell,
            OrderSizing::Base(1.5),
            ReasonCode::MomentumLoss,
        );
        let outcome = executor
            .execute(intent, &snapshot(2060.0), &balances(), &mut position, 1.03)
            .await;

        assert_eq!(outcome.status, TradeStatus::Failed);
        assert!(outcome.profit_loss.is_none());
        assert_eq!(position, before);
    }

    #[tokio::test]
    async fn test_transport_error_records_failure_without_mutation() {
        let sink = StubSink::failing();
        let executor = OrderExecutor::new(&sink, None);
        let mut position = Position::flat();

        let intent = OrderIntent::new(
            Side::Buy,
            OrderSizing::Quote(Decimal::new(100000, 2)),
            ReasonCode::MacdBuySignal,
        );
        let outcome = executor
            .execute(intent, &snapshot(2000.0), &balances(), &mut position, 1.03)
            .await;

        assert_eq!(outcome.status, TradeStatus::Failed);
        assert!(!position.is_long());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sell_without_entry_has_no_profit_loss() {
        let sink = StubSink::accepting();
        let executor = OrderExecutor::new(&sink, None);
        let mut position = Position::flat();

        let intent = OrderIntent::new(
            Side::Sell,
            OrderSizing::Base(0.6),
            ReasonCode::BearishCrossover,
        );
        let outcome = executor
            .execute(intent, &snapshot(1700.0), &balances(), &mut position, 1.03)
            .await;

        assert_eq!(outcome.status, TradeStatus::Success);
        assert!(outcome.profit_loss.is_none());
    }
}
