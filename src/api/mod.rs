// Exchange collaborators: market data in, orders out.
pub mod coinbase;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::BotError;
use crate::models::{Candle, OrderIntent};

pub use coinbase::ExchangeClient;

/// Authenticated market-data feed. Implementations must return
/// time-synchronized responses; anything malformed surfaces as
/// `BotError::Fetch` and the cycle is abandoned.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// OHLC candles covering `lookback_secs` up to now at the given
    /// granularity. Order is unspecified; the series processor sorts.
    async fn candles(&self, lookback_secs: u64, granularity: &str)
        -> Result<Vec<Candle>, BotError>;

    /// Available balance per currency code.
    async fn balances(&self) -> Result<HashMap<String, f64>, BotError>;
}

/// Synchronous response to one order submission. The sink honors the
/// intent's client order id for deduplication; we never poll for fills.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitResult {
    pub accepted: bool,
    pub status: u16,
    pub raw_response: String,
}

/// Authenticated order gateway.
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<SubmitResult, BotError>;
}

/// Produces a bearer token for one request. Keeps credential handling and
/// token signing out of the trading core; production wires a real signer
/// in, tests wire a constant.
pub trait TokenProvider: Send + Sync {
    fn bearer(&self, method: &str, path: &str) -> String;
}

/// Fixed token, e.g. from the environment or a test fixture.
pub struct StaticTokenProvider(pub String);

impl TokenProvider for StaticTokenProvider {
    fn bearer(&self, _method: &str, _path: &str) -> String {
        self.0.clone()
    }
}
