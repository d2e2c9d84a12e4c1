//! Signal evaluation: discrete trend facts from two consecutive
//! indicator snapshots. Pure functions, no state retained across calls.

use crate::models::{IndicatorSnapshot, Trend};

/// Fact set the rule table consumes each cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalFacts {
    pub macd_trend: Trend,
    pub signal_trend: Trend,
    pub macd_above_signal: bool,
    pub macd_delta: f64,
}

/// Derive trend facts from the previous and current snapshots.
///
/// `macd_trend` is `Up` iff macd strictly increased; everything else,
/// including an unchanged value, is `Down`. Same rule for the signal line.
pub fn evaluate(prev: &IndicatorSnapshot, cur: &IndicatorSnapshot) -> SignalFacts {
    SignalFacts {
        macd_trend: if cur.macd > prev.macd { Trend::Up } else { Trend::Down },
        signal_trend: if cur.signal > prev.signal { Trend::Up } else { Trend::Down },
        macd_above_signal: cur.macd > cur.signal,
        macd_delta: cur.macd - prev.macd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(macd: f64, signal: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            close: 2000.0,
            high: 2010.0,
            ema_fast: 0.0,
            ema_slow: 0.0,
            macd,
            signal,
        }
    }

    #[test]
    fn test_macd_trend_up_iff_strictly_greater() {
        let facts = evaluate(&snapshot(5.0, 0.0), &snapshot(6.0, 0.0));
        assert_eq!(facts.macd_trend, Trend::Up);

        let facts = evaluate(&snapshot(5.0, 0.0), &snapshot(5.0, 0.0));
        assert_eq!(facts.macd_trend, Trend::Down);

        let facts = evaluate(&snapshot(5.0, 0.0), &snapshot(4.0, 0.0));
        assert_eq!(facts.macd_trend, Trend::Down);
    }

    #[test]
    fn test_signal_trend_mirrors_signal_line() {
        let facts = evaluate(&snapshot(0.0, 1.0), &snapshot(0.0, 2.0));
        assert_eq!(facts.signal_trend, Trend::Up);

        let facts = evaluate(&snapshot(0.0, 2.0), &snapshot(0.0, 1.0));
        assert_eq!(facts.signal_trend, Trend::Down);
    }

    #[test]
    fn test_macd_above_signal_uses_current_snapshot_only() {
        let facts = evaluate(&snapshot(-10.0, 10.0), &snapshot(3.0, 2.0));
        assert!(facts.macd_above_signal);

        let facts = evaluate(&snapshot(10.0, -10.0), &snapshot(2.0, 3.0));
        assert!(!facts.macd_above_signal);
    }

    #[test]
    fn test_macd_delta() {
        let facts = evaluate(&snapshot(5.0, 0.0), &snapshot(17.5, 0.0));
        assert!((facts.macd_delta - 12.5).abs() < f64::EPSILON);
    }
}
