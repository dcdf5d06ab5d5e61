//! Relative Strength Index (RSI).
//!
//! Simple-average form: RS = mean(gains over window) / mean(losses over
//! window), RSI = 100 - 100 / (1 + RS). Saturates at 100 when the loss
//! average is zero. The first `period` entries are undefined (the window
//! needs `period` price changes).

/// Compute the RSI over a value series with a rolling window of `period`
/// price changes.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    if period == 0 || n <= period {
        return vec![None; n];
    }

    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut result = vec![None; period];
    for end in period..n {
        let window = &deltas[end - period..end];
        let avg_gain: f64 = window.iter().filter(|d| **d > 0.0).sum::<f64>() / period as f64;
        let avg_loss: f64 = -window.iter().filter(|d| **d < 0.0).sum::<f64>() / period as f64;

        let value = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        result.push(Some(value));
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
