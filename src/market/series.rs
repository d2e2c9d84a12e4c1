use chrono::{DateTime, Utc};

use crate::error::BotError;
use crate::indicators::{macd_series, MacdPoint, MIN_CANDLES};
use crate::models::{Candle, IndicatorSnapshot};

/// Time-ordered candle window with indicator values attached.
///
/// Built fresh every cycle from the raw fetch; rejects windows too short
/// for the EMA warm-up and treats out-of-contract data (duplicate start
/// times) as a transient fetch failure.
#[derive(Debug)]
pub struct CandleSeries {
    candles: Vec<Candle>,
    points: Vec<MacdPoint>,
}

impl CandleSeries {
    pub fn from_raw(mut candles: Vec<Candle>) -> Result<Self, BotError> {
        candles.sort_by_key(|c| c.start);

        for pair in candles.windows(2) {
            if pair[0].start == pair[1].start {
                return Err(BotError::Fetch(format!(
                    "duplicate candle start time {}",
                    pair[0].start
                )));
            }
        }

        if candles.len() < MIN_CANDLES {
            return Err(BotError::InsufficientHistory {
                have: candles.len(),
                need: MIN_CANDLES,
            });
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let points = macd_series(&closes);

        Ok(Self { candles, points })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    fn snapshot_at(&self, idx: usize) -> IndicatorSnapshot {
        let candle = &self.candles[idx];
        let point = &self.points[idx];
        IndicatorSnapshot {
            start: candle.start,
            close: candle.close,
            high: candle.high,
            ema_fast: point.ema_fast,
            ema_slow: point.ema_slow,
            macd: point.macd,
            signal: point.signal,
        }
    }

    /// Snapshot of the most recent candle.
    pub fn latest(&self) -> IndicatorSnapshot {
        self.snapshot_at(self.candles.len() - 1)
    }

    /// Snapshot of the candle before the most recent one.
    pub fn previous(&self) -> IndicatorSnapshot {
        self.snapshot_at(self.candles.len() - 2)
    }

    /// Whether the latest candle starts a new bar relative to the
    /// last-processed marker. Gates buy-rule evaluation and the per-candle
    /// market-data row; sell rules ignore it.
    pub fn is_new_candle(&self, last_seen: Option<DateTime<Utc>>) -> bool {
        match last_seen {
            None => true,
            Some(seen) => self.latest().start != seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candle(i: i64, close: f64) -> Candle {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::hours(4 * i);
        Candle {
            start,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
        }
    }

    fn window(n: i64) -> Vec<Candle> {
        (0..n).map(|i| candle(i, 2000.0 + i as f64)).collect()
    }

    #[test]
    fn test_rejects_short_history() {
        let err = CandleSeries::from_raw(window(10)).unwrap_err();
        match err {
            BotError::InsufficientHistory { have, need } => {
                assert_eq!(have, 10);
                assert_eq!(need, 35);
            }
            other => panic!("expected InsufficientHistory, got {:?}", other),
        }
    }

    #[test]
    fn test_reorders_descending_input() {
        let mut candles = window(40);
        candles.reverse();
        let series = CandleSeries::from_raw(candles).unwrap();
        assert_eq!(series.latest().close, 2039.0);
        assert_eq!(series.previous().close, 2038.0);
    }

    #[test]
    fn test_rejects_duplicate_start_times() {
        let mut candles = window(40);
        candles[5].start = candles[6].start;
        let err = CandleSeries::from_raw(candles).unwrap_err();
        assert!(matches!(err, BotError::Fetch(_)));
    }

    #[test]
    fn test_new_candle_detection() {
        let series = CandleSeries::from_raw(window(40)).unwrap();
        let latest = series.latest().start;

        assert!(series.is_new_candle(None));
        assert!(series.is_new_candle(Some(latest - Duration::hours(4))));
        assert!(!series.is_new_candle(Some(latest)));
    }

    #[test]
    fn test_snapshots_carry_indicator_values() {
        let series = CandleSeries::from_raw(window(40)).unwrap();
        let cur = series.latest();
        let prev = series.previous();

        // Steadily rising closes keep the fast EMA above the slow one.
        assert!(cur.macd > 0.0);
        assert!(cur.macd > prev.macd);
        assert_eq!(cur.high, cur.close + 1.0);
    }
}
