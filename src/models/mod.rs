use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One OHLC bar at a fixed granularity, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Indicator values derived for a single candle.
///
/// Recomputed from the full fetched window every cycle, never persisted
/// incrementally.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub start: DateTime<Utc>,
    pub close: f64,
    pub high: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub macd: f64,
    pub signal: f64,
}

/// Direction of an indicator between two consecutive candles.
///
/// Only two states exist: `Up` iff the value strictly increased, `Down`
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Why an order was attempted. Stored verbatim in the trades table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    MacdBuySignal,
    TakeProfit,
    MomentumLoss,
    BearishCrossover,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MacdBuySignal => "MACD_BUY_SIGNAL",
            ReasonCode::TakeProfit => "TAKE_PROFIT",
            ReasonCode::MomentumLoss => "MACD Momentum Loss",
            ReasonCode::BearishCrossover => "Bearish Crossover",
        }
    }
}

/// Order sizing: buys spend quote currency, sells unload base units.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSizing {
    /// Quote-denominated notional (USD), rounded to 2 decimals.
    Quote(Decimal),
    /// Base-denominated quantity (ETH).
    Base(f64),
}

/// A decided order attempt. Created by the rule table, consumed exactly
/// once by the execution coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub client_order_id: Uuid,
    pub side: Side,
    pub sizing: OrderSizing,
    pub reason: ReasonCode,
}

impl OrderIntent {
    /// Build an intent with a fresh, globally unique client order id.
    /// Two intents never share an id; the exchange deduplicates on it.
    pub fn new(side: Side, sizing: OrderSizing, reason: ReasonCode) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            side,
            sizing,
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Success,
    Failed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Success => "Success",
            TradeStatus::Failed => "Failed",
        }
    }
}

/// Append-only audit record of one order attempt's outcome.
#[derive(Debug, Clone)]
pub struct TradeRecord {
    pub order_id: Uuid,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub macd: f64,
    pub signal: f64,
    pub reason: ReasonCode,
    pub status: TradeStatus,
    pub timestamp: DateTime<Utc>,
}

/// Balances fetched once per cycle; read-only input to sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub quote_balance: f64,
    pub base_balance: f64,
}
