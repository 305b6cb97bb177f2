//! Indicator math over aligned series.
//!
//! Every function returns one element per input bar. Positions where the
//! indicator's window is not yet filled are `None`, never zero, and each value
//! only uses data up to and including its own bar.

use analysis_core::{Bar, SupportResistanceConfig};

/// Value at the most recent bar.
pub fn latest(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let mut sum: f64 = data[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);
    for i in period..data.len() {
        sum += data[i] - data[i - period];
        result[i] = Some(sum / period as f64);
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values
pub fn ema(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut prev = data[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(prev);

    for i in period..data.len() {
        prev = (data[i] - prev) * multiplier + prev;
        result[i] = Some(prev);
    }
    result
}

/// EMA over a series whose defined values form a contiguous tail.
fn ema_of_defined(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; series.len()];
    let Some(start) = series.iter().position(|v| v.is_some()) else {
        return result;
    };
    let tail: Vec<f64> = series[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    for (i, v) in ema(&tail, period).into_iter().enumerate() {
        result[start + i] = v;
    }
    result
}

fn sma_of_defined(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; series.len()];
    let Some(start) = series.iter().position(|v| v.is_some()) else {
        return result;
    };
    let tail: Vec<f64> = series[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
    for (i, v) in sma(&tail, period).into_iter().enumerate() {
        result[start + i] = v;
    }
    result
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first value appears once `period` price changes are available and is
/// seeded from their simple averages. A zero average loss reads as 100.
pub fn rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let to_rsi = |avg_gain: f64, avg_loss: f64| {
        if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - (100.0 / (1.0 + rs))
        }
    };

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = Some(to_rsi(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result[i + 1] = Some(to_rsi(avg_gain, avg_loss));
    }
    result
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Vec<Option<f64>>,
    pub signal_line: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let empty = vec![None; data.len()];
    if fast_period == 0 || signal_period == 0 || slow_period <= fast_period {
        return MacdResult {
            macd_line: empty.clone(),
            signal_line: empty.clone(),
            histogram: empty,
        };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_of_defined(&macd_line, signal_period);
    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    /// (close - lower) / (upper - lower); `None` where the bands coincide.
    pub percent_b: Vec<Option<f64>>,
}

pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = sma(data, period);
    let mut upper = vec![None; data.len()];
    let mut lower = vec![None; data.len()];
    let mut percent_b = vec![None; data.len()];

    for i in 0..data.len() {
        let Some(mean) = middle[i] else { continue };
        let slice = &data[i + 1 - period..=i];
        let variance: f64 = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        let up = mean + std_dev * std;
        let lo = mean - std_dev * std;
        upper[i] = Some(up);
        lower[i] = Some(lo);
        if up > lo {
            percent_b[i] = Some((data[i] - lo) / (up - lo));
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
        percent_b,
    }
}

fn highest_lowest(bars: &[Bar]) -> (f64, f64) {
    let highest = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let lowest = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    (highest, lowest)
}

/// Stochastic Oscillator
pub struct StochasticResult {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

pub fn stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> StochasticResult {
    let mut k_values = vec![None; bars.len()];
    if k_period == 0 || bars.len() < k_period {
        return StochasticResult {
            d: k_values.clone(),
            k: k_values,
        };
    }

    for i in k_period - 1..bars.len() {
        let (highest, lowest) = highest_lowest(&bars[i + 1 - k_period..=i]);
        let k = if highest == lowest {
            50.0
        } else {
            100.0 * (bars[i].close - lowest) / (highest - lowest)
        };
        k_values[i] = Some(k);
    }

    let d_values = sma_of_defined(&k_values, d_period);

    StochasticResult {
        k: k_values,
        d: d_values,
    }
}

/// Williams %R, in [-100, 0]
pub fn williams_r(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return result;
    }

    for i in period - 1..bars.len() {
        let (highest, lowest) = highest_lowest(&bars[i + 1 - period..=i]);
        let value = if highest == lowest {
            -50.0
        } else {
            -100.0 * (highest - bars[i].close) / (highest - lowest)
        };
        result[i] = Some(value);
    }
    result
}

/// Average Directional Index (ADX) measures trend strength (0-100)
pub struct AdxResult {
    pub adx: Vec<Option<f64>>,
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
}

/// Directional movement with Wilder smoothing. +DI/-DI start at bar `period`,
/// ADX at bar `2 * period - 1`.
pub fn adx(bars: &[Bar], period: usize) -> AdxResult {
    let mut adx_values = vec![None; bars.len()];
    let mut plus_di_values = vec![None; bars.len()];
    let mut minus_di_values = vec![None; bars.len()];

    if period == 0 || bars.len() < period + 1 {
        return AdxResult {
            adx: adx_values,
            plus_di: plus_di_values,
            minus_di: minus_di_values,
        };
    }

    // +DM, -DM and TR for bars 1..n
    let mut plus_dm = Vec::with_capacity(bars.len() - 1);
    let mut minus_dm = Vec::with_capacity(bars.len() - 1);
    let mut true_range = Vec::with_capacity(bars.len() - 1);

    for i in 1..bars.len() {
        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;

        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });

        let hl = bars[i].high - bars[i].low;
        let hc = (bars[i].high - bars[i - 1].close).abs();
        let lc = (bars[i].low - bars[i - 1].close).abs();
        true_range.push(hl.max(hc).max(lc));
    }

    let mut smoothed_plus_dm = plus_dm[..period].iter().sum::<f64>();
    let mut smoothed_minus_dm = minus_dm[..period].iter().sum::<f64>();
    let mut smoothed_tr = true_range[..period].iter().sum::<f64>();

    let mut dx_values: Vec<f64> = Vec::new();
    let mut adx_val = 0.0;

    // Index j in the movement arrays belongs to bar j + 1.
    for j in period - 1..plus_dm.len() {
        if j >= period {
            smoothed_plus_dm = smoothed_plus_dm - smoothed_plus_dm / period as f64 + plus_dm[j];
            smoothed_minus_dm = smoothed_minus_dm - smoothed_minus_dm / period as f64 + minus_dm[j];
            smoothed_tr = smoothed_tr - smoothed_tr / period as f64 + true_range[j];
        }

        let pdi = if smoothed_tr > 0.0 { 100.0 * smoothed_plus_dm / smoothed_tr } else { 0.0 };
        let mdi = if smoothed_tr > 0.0 { 100.0 * smoothed_minus_dm / smoothed_tr } else { 0.0 };
        plus_di_values[j + 1] = Some(pdi);
        minus_di_values[j + 1] = Some(mdi);

        let di_sum = pdi + mdi;
        let dx = if di_sum > 0.0 { 100.0 * (pdi - mdi).abs() / di_sum } else { 0.0 };
        dx_values.push(dx);

        if dx_values.len() == period {
            adx_val = dx_values.iter().sum::<f64>() / period as f64;
            adx_values[j + 1] = Some(adx_val);
        } else if dx_values.len() > period {
            adx_val = (adx_val * (period - 1) as f64 + dx) / period as f64;
            adx_values[j + 1] = Some(adx_val);
        }
    }

    AdxResult {
        adx: adx_values,
        plus_di: plus_di_values,
        minus_di: minus_di_values,
    }
}

/// Support and resistance levels from confirmed swing pivots.
///
/// A pivot needs `window` bars on each side, so the most recent `window` bars
/// can never produce one. Levels closer than `min_separation_pct` are merged
/// into their average. Output is ordered nearest to the last close first.
pub fn support_resistance(bars: &[Bar], config: &SupportResistanceConfig) -> Vec<f64> {
    let w = config.window;
    if w == 0 || bars.len() < 2 * w + 1 {
        return vec![];
    }

    let mut pivots: Vec<f64> = Vec::new();
    for i in w..bars.len() - w {
        let left = &bars[i - w..i];
        let right = &bars[i + 1..=i + w];

        let high = bars[i].high;
        if left.iter().all(|b| high > b.high) && right.iter().all(|b| high >= b.high) {
            pivots.push(high);
        }
        let low = bars[i].low;
        if left.iter().all(|b| low < b.low) && right.iter().all(|b| low <= b.low) {
            pivots.push(low);
        }
    }

    if pivots.is_empty() {
        return vec![];
    }
    pivots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    // Cluster ascending levels; a level joins the current cluster while it is
    // within the separation of that cluster's mean.
    let mut levels: Vec<f64> = Vec::new();
    let mut cluster: Vec<f64> = vec![pivots[0]];
    for &p in &pivots[1..] {
        let mean = cluster.iter().sum::<f64>() / cluster.len() as f64;
        if (p - mean).abs() / mean * 100.0 < config.min_separation_pct {
            cluster.push(p);
        } else {
            levels.push(mean);
            cluster = vec![p];
        }
    }
    levels.push(cluster.iter().sum::<f64>() / cluster.len() as f64);

    let current = bars[bars.len() - 1].close;
    levels.sort_by(|a, b| {
        (a - current)
            .abs()
            .partial_cmp(&(b - current).abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    });
    levels.truncate(config.max_levels);
    levels
}
