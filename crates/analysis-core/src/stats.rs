//! Small statistics helpers shared by the analysis crates.

/// Number of trading days used to annualize daily figures.
pub const TRADING_DAYS: f64 = 252.0;

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Simple close-to-close returns. Output is one element shorter than the input.
pub fn simple_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Annualized volatility as a fraction (0.25 == 25%). `None` with fewer than two returns.
pub fn annualized_volatility(closes: &[f64]) -> Option<f64> {
    let returns = simple_returns(closes);
    if returns.len() < 2 {
        return None;
    }
    Some(std_dev(&returns) * TRADING_DAYS.sqrt())
}

/// Largest peak-to-trough decline as a non-positive fraction.
pub fn max_drawdown(closes: &[f64]) -> Option<f64> {
    let first = *closes.first()?;
    let mut peak = first;
    let mut worst = 0.0_f64;
    for &c in closes {
        if c > peak {
            peak = c;
        }
        if peak > 0.0 {
            worst = worst.min((c - peak) / peak);
        }
    }
    Some(worst)
}

pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}
