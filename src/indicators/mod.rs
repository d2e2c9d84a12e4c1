// Technical indicator math
pub mod ema;
pub mod macd;

pub use ema::ewm_span;
pub use macd::{macd_series, MacdPoint, FAST_SPAN, MIN_CANDLES, SIGNAL_SPAN, SLOW_SPAN};
