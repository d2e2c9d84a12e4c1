//! MACD (Moving Average Convergence Divergence).
//!
//! MACD line = EMA(fast) - EMA(slow), signal line = EMA(MACD, signal span).
//! All three EMAs use first-value seeding, so every bar carries a value;
//! callers enforce the warm-up minimum before trusting them.

use crate::indicators::ema::ewm_span;

pub const FAST_SPAN: usize = 12;
pub const SLOW_SPAN: usize = 26;
pub const SIGNAL_SPAN: usize = 9;

/// Bars required before the slow EMA plus signal EMA have settled.
pub const MIN_CANDLES: usize = SLOW_SPAN + SIGNAL_SPAN;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub macd: f64,
    pub signal: f64,
}

/// Compute the full MACD series over closing prices. One point per input.
pub fn macd_series(closes: &[f64]) -> Vec<MacdPoint> {
    if closes.is_empty() {
        return Vec::new();
    }

    let ema_fast = ewm_span(closes, FAST_SPAN);
    let ema_slow = ewm_span(closes, SLOW_SPAN);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ewm_span(&macd_line, SIGNAL_SPAN);

    (0..closes.len())
        .map(|i| MacdPoint {
            ema_fast: ema_fast[i],
            ema_slow: ema_slow[i],
            macd: macd_line[i],
            signal: signal_line[i],
        })
        .collect()
}
