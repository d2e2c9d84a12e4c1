use anyhow::{Context, Result};
use serde::Deserialize;

/// Exchange transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSettings {
    pub base_url: String,
    pub product_id: String,
    /// Static bearer token handed to the client's token provider. Real
    /// deployments swap in a signing provider instead.
    pub bearer_token: String,
    pub http_timeout_secs: u64,
}

/// Cycle and market-window settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingSettings {
    pub granularity: String,
    pub lookback_secs: u64,
    pub quote_currency: String,
    pub base_currency: String,
    /// Normal delay between cycles.
    pub cycle_delay_secs: u64,
    /// Shorter delay applied after a transport/parse failure.
    pub fallback_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: Option<String>,
    pub exchange: ExchangeSettings,
    pub trading: TradingSettings,
}

impl Settings {
    /// Layered load: built-in defaults, then an optional TOML file, then
    /// `TRENDBOT_`-prefixed environment variables (`__` as separator,
    /// e.g. `TRENDBOT_EXCHANGE__BEARER_TOKEN`).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("exchange.base_url", "https://api.coinbase.com")?
            .set_default("exchange.product_id", "ETH-USD")?
            .set_default("exchange.bearer_token", "")?
            .set_default("exchange.http_timeout_secs", 10)?
            .set_default("trading.granularity", "FOUR_HOUR")?
            // 21 days of four-hour candles
            .set_default("trading.lookback_secs", 1_814_400)?
            .set_default("trading.quote_currency", "USD")?
            .set_default("trading.base_currency", "ETH")?
            .set_default("trading.cycle_delay_secs", 15)?
            .set_default("trading.fallback_delay_secs", 10)?;

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("trendbot").required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("TRENDBOT").separator("__"))
            .build()
            .context("Failed to assemble configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(settings)
    }
}
