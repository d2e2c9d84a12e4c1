/// Exponential moving average over a full series.
///
/// alpha = 2 / (span + 1), seeded with the first value (not an SMA):
/// ema[0] = x[0], ema[t] = alpha * x[t] + (1 - alpha) * ema[t-1].
/// Returns one value per input, same length.
pub fn ewm_span(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() || span == 0 {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);

    for &v in &values[1..] {
        ema = alpha * v + (1.0 - alpha) * ema;
        out.push(ema);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_with_first_value() {
        let ema = ewm_span(&[10.0, 20.0, 30.0], 3);
        assert_eq!(ema[0], 10.0);
    }

    #[test]
    fn test_recursive_smoothing() {
        // span=3 -> alpha=0.5
        let ema = ewm_span(&[10.0, 20.0, 30.0], 3);
        assert!((ema[1] - 15.0).abs() < f64::EPSILON);
        assert!((ema[2] - 22.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_constant_series_stays_flat() {
        let ema = ewm_span(&[100.0; 8], 5);
        for v in ema {
            assert!((v - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_same_length_as_input() {
        let ema = ewm_span(&[1.0, 2.0, 3.0, 4.0], 12);
        assert_eq!(ema.len(), 4);
    }

    #[test]
    fn test_empty_and_zero_span() {
        assert!(ewm_span(&[], 3).is_empty());
        assert!(ewm_span(&[1.0, 2.0], 0).is_empty());
    }
}
