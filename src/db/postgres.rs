use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::BotError;
use crate::models::{IndicatorSnapshot, TradeRecord};
use crate::strategy::SignalFacts;

/// Append-only Postgres store for the audit trail: trades, balance
/// snapshots, position open/close events, and per-candle market data.
/// Nothing here is ever updated or deleted, and the core never reads it
/// back.
pub struct TradeStore {
    pool: PgPool,
}

impl TradeStore {
    /// Connect and run embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, BotError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| BotError::Persistence(e.to_string()))?;

        tracing::info!("Connected to Postgres at {}", database_url);

        Ok(Self { pool })
    }

    pub async fn record_trade(&self, trade: &TradeRecord) -> Result<(), BotError> {
        sqlx::query(
            r#"
            INSERT INTO trades (trade_type, time, price, quantity,
                                macd_value, signal_value, reason, order_id, order_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(trade.side.as_str())
        .bind(trade.timestamp)
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.macd)
        .bind(trade.signal)
        .bind(trade.reason.as_str())
        .bind(trade.order_id)
        .bind(trade.status.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!("Recorded {} trade {}", trade.side.as_str(), trade.order_id);
        Ok(())
    }

    pub async fn record_balance(
        &self,
        base_balance: f64,
        quote_balance: f64,
        time: DateTime<Utc>,
    ) -> Result<(), BotError> {
        sqlx::query(
            r#"
            INSERT INTO account_balance (base_balance, quote_balance, time)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(base_balance)
        .bind(quote_balance)
        .bind(time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_position_open(
        &self,
        entry_time: DateTime<Utc>,
        entry_price: f64,
        quantity: f64,
    ) -> Result<(), BotError> {
        sqlx::query(
            r#"
            INSERT INTO positions (entry_time, entry_price, quantity)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(entry_time)
        .bind(entry_price)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// P/L columns stay NULL when the entry price is unknown (a crossover
    /// exit can fire against a holding this process never opened).
    pub async fn record_position_close(
        &self,
        exit_time: DateTime<Utc>,
        exit_price: f64,
        take_profit: Option<f64>,
        profit_loss_usd: Option<f64>,
        profit_loss_pct: Option<f64>,
    ) -> Result<(), BotError> {
        sqlx::query(
            r#"
            INSERT INTO positions (exit_time, exit_price, take_profit,
                                   profit_loss_usd, profit_loss_pct)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(exit_time)
        .bind(exit_price)
        .bind(take_profit)
        .bind(profit_loss_usd)
        .bind(profit_loss_pct)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// One row per closed candle, written on the new-candle boundary only.
    pub async fn record_market_data(
        &self,
        snapshot: &IndicatorSnapshot,
        facts: &SignalFacts,
        time: DateTime<Utc>,
    ) -> Result<(), BotError> {
        let posture = if facts.macd_above_signal {
            "MACD above signal"
        } else {
            "MACD below signal"
        };

        sqlx::query(
            r#"
            INSERT INTO market_data (macd_value, signal_value, price,
                                     macd_trend, signal_trend, posture, time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(snapshot.macd)
        .bind(snapshot.signal)
        .bind(snapshot.close)
        .bind(facts.macd_trend.as_str())
        .bind(facts.signal_trend.as_str())
        .bind(posture)
        .bind(time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
