use thiserror::Error;

/// Failure taxonomy for one trading cycle.
///
/// None of these are fatal to the process: `Fetch` aborts the cycle and
/// triggers the short fallback delay, `InsufficientHistory` skips decision
/// logic, `OrderRejected` is recorded and re-evaluated next cycle, and
/// `Persistence` degrades to error-level logging.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("market data fetch failed: {0}")]
    Fetch(String),

    #[error("insufficient candle history: have {have}, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("order rejected by exchange ({status}): {body}")]
    OrderRejected { status: u16, body: String },

    #[error("persistence write failed: {0}")]
    Persistence(String),
}

impl BotError {
    /// True when the next cycle should start after the short fallback
    /// delay instead of the normal inter-cycle delay.
    pub fn is_transient_fetch(&self) -> bool {
        matches!(self, BotError::Fetch(_))
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::Fetch(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Fetch(format!("malformed payload: {}", e))
    }
}

impl From<sqlx::Error> for BotError {
    fn from(e: sqlx::Error) -> Self {
        BotError::Persistence(e.to_string())
    }
}
