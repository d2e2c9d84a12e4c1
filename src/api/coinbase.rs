use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::api::{MarketDataSource, OrderSink, SubmitResult, TokenProvider};
use crate::error::BotError;
use crate::models::{Candle, OrderIntent, OrderSizing, Side};

const CANDLES_PATH_FMT: &str = "/api/v3/brokerage/products/{product}/candles";
const ACCOUNTS_PATH: &str = "/api/v3/brokerage/accounts";
const ORDERS_PATH: &str = "/api/v3/brokerage/orders";
const RATE_LIMIT_RPM: u32 = 30;

/// Leverage attached to market buys, as the exchange expects it.
const BUY_LEVERAGE: &str = "3.0";

// Type alias for the rate limiter to simplify signatures
type ApiRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Coinbase Advanced Trade REST client for one product.
///
/// Cloneable; clones share the same rate limiter. Every request is
/// authenticated through the injected `TokenProvider`, so signing details
/// never leak in here.
#[derive(Clone)]
pub struct ExchangeClient {
    http: Client,
    base_url: String,
    product_id: String,
    auth: Arc<dyn TokenProvider>,
    rate_limiter: Arc<ApiRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<RawCandle>,
}

/// Candle row as the exchange sends it: everything stringly typed.
#[derive(Debug, Deserialize)]
struct RawCandle {
    start: String,
    open: String,
    high: String,
    low: String,
    close: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<RawAccount>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    currency: String,
    available_balance: RawBalance,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    value: String,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    client_order_id: String,
    product_id: &'a str,
    side: &'a str,
    order_configuration: OrderConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    leverage: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct OrderConfiguration {
    market_market_ioc: MarketIoc,
}

#[derive(Debug, Serialize)]
struct MarketIoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    quote_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_size: Option<String>,
}

impl ExchangeClient {
    pub fn new(
        base_url: String,
        product_id: String,
        timeout_secs: u64,
        auth: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_minute(NonZeroU32::new(RATE_LIMIT_RPM).unwrap());
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            http,
            base_url,
            product_id,
            auth,
            rate_limiter,
        })
    }

    fn candles_path(&self) -> String {
        CANDLES_PATH_FMT.replace("{product}", &self.product_id)
    }

    fn parse_candle(raw: &RawCandle) -> Result<Candle, BotError> {
        let secs: i64 = raw
            .start
            .parse()
            .map_err(|_| BotError::Fetch(format!("bad candle start '{}'", raw.start)))?;
        let start: DateTime<Utc> = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| BotError::Fetch(format!("candle start out of range: {}", secs)))?;

        let field = |name: &str, v: &str| -> Result<f64, BotError> {
            v.parse()
                .map_err(|_| BotError::Fetch(format!("bad candle {} '{}'", name, v)))
        };

        Ok(Candle {
            start,
            open: field("open", &raw.open)?,
            high: field("high", &raw.high)?,
            low: field("low", &raw.low)?,
            close: field("close", &raw.close)?,
        })
    }
}

#[async_trait]
impl MarketDataSource for ExchangeClient {
    async fn candles(
        &self,
        lookback_secs: u64,
        granularity: &str,
    ) -> Result<Vec<Candle>, BotError> {
        self.rate_limiter.until_ready().await;

        let end = Utc::now().timestamp();
        let start = end - lookback_secs as i64;
        let path = self.candles_path();
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.auth.bearer("GET", &path))
            .query(&[
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("granularity", granularity.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Fetch(format!(
                "candles request returned {}: {}",
                status, body
            )));
        }

        let payload: CandlesResponse = response.json().await?;
        payload.candles.iter().map(Self::parse_candle).collect()
    }

    async fn balances(&self) -> Result<HashMap<String, f64>, BotError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, ACCOUNTS_PATH);
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.auth.bearer("GET", ACCOUNTS_PATH))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Fetch(format!(
                "accounts request returned {}: {}",
                status, body
            )));
        }

        let payload: AccountsResponse = response.json().await?;
        let mut balances = HashMap::new();
        for account in payload.accounts {
            let value: f64 = account.available_balance.value.parse().map_err(|_| {
                BotError::Fetch(format!(
                    "bad balance '{}' for {}",
                    account.available_balance.value, account.currency
                ))
            })?;
            balances.insert(account.currency, value);
        }
        Ok(balances)
    }
}

#[async_trait]
impl OrderSink for ExchangeClient {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<SubmitResult, BotError> {
        self.rate_limiter.until_ready().await;

        let (quote_size, base_size) = match &intent.sizing {
            OrderSizing::Quote(q) => (Some(q.to_string()), None),
            OrderSizing::Base(b) => (None, Some(b.to_string())),
        };

        let request = OrderRequest {
            client_order_id: intent.client_order_id.to_string(),
            product_id: &self.product_id,
            side: intent.side.as_str(),
            order_configuration: OrderConfiguration {
                market_market_ioc: MarketIoc {
                    quote_size,
                    base_size,
                },
            },
            leverage: (intent.side == Side::Buy).then_some(BUY_LEVERAGE),
        };

        let url = format!("{}{}", self.base_url, ORDERS_PATH);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.auth.bearer("POST", ORDERS_PATH))
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let raw_response = response.text().await.unwrap_or_default();

        Ok(SubmitResult {
            accepted: (200..300).contains(&status),
            status,
            raw_response,
        })
    }
}
