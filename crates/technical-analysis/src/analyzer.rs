use analysis_core::{
    stats, Bar, EngineConfig, IndicatorReading, IndicatorSet, IndicatorSpec, PriceSeries, SignalTag,
    SupportResistanceConfig, TrendState, VolumeState,
};
use std::collections::BTreeMap;

use crate::indicators::*;

/// Bars averaged when classifying the latest volume.
const VOLUME_LOOKBACK: usize = 20;

/// Computes the configured indicator set over a price series snapshot.
pub struct IndicatorEngine {
    specs: Vec<IndicatorSpec>,
    sr_config: SupportResistanceConfig,
}

impl IndicatorEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            specs: config.indicator_set.clone(),
            sr_config: config.support_resistance,
        }
    }

    pub fn with_specs(specs: Vec<IndicatorSpec>) -> Self {
        Self {
            specs,
            sr_config: SupportResistanceConfig::default(),
        }
    }

    pub fn specs(&self) -> &[IndicatorSpec] {
        &self.specs
    }

    /// Invalid bars are skipped; every window runs over the remaining bars.
    /// Indicators whose window is not filled come back undefined.
    pub fn compute(&self, series: &PriceSeries) -> IndicatorSet {
        let bars = series.valid_bars();
        let mut set = IndicatorSet::empty();
        set.bars_used = bars.len();

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let last_close = closes.last().copied();
        set.last_close = last_close;

        for spec in &self.specs {
            let reading = match last_close {
                Some(close) => reading_for(spec, &bars, &closes, close),
                None => IndicatorReading::undefined(),
            };
            set.readings.insert(spec.name(), reading);
        }

        set.levels = support_resistance(&bars, &self.sr_config);
        set.realized_volatility = stats::annualized_volatility(&closes);
        set.trend = trend_state(&closes);
        set.volume_state = volume_state(&bars);
        set
    }
}

fn reading(value: Option<f64>, state: &str, signal: SignalTag) -> IndicatorReading {
    IndicatorReading {
        value,
        components: BTreeMap::new(),
        state: state.to_string(),
        signal,
    }
}

fn reading_for(spec: &IndicatorSpec, bars: &[Bar], closes: &[f64], close: f64) -> IndicatorReading {
    match *spec {
        IndicatorSpec::Rsi { period } => {
            let Some(value) = latest(&rsi(closes, period)) else {
                return IndicatorReading::undefined();
            };
            if value > 70.0 {
                reading(Some(value), "overbought", SignalTag::Bearish)
            } else if value < 30.0 {
                reading(Some(value), "oversold", SignalTag::Bullish)
            } else {
                reading(Some(value), "neutral", SignalTag::Neutral)
            }
        }
        IndicatorSpec::Macd { fast, slow, signal } => {
            let result = macd(closes, fast, slow, signal);
            let Some(line) = latest(&result.macd_line) else {
                return IndicatorReading::undefined();
            };
            let hist = latest(&result.histogram);
            let mut r = match hist {
                Some(h) if h > 0.0 => reading(Some(line), "bullish_momentum", SignalTag::Bullish),
                Some(h) if h < 0.0 => reading(Some(line), "bearish_momentum", SignalTag::Bearish),
                Some(_) => reading(Some(line), "flat", SignalTag::Neutral),
                None => reading(Some(line), "signal_pending", SignalTag::Neutral),
            };
            r.components.insert("signal".into(), latest(&result.signal_line));
            r.components.insert("histogram".into(), hist);
            r
        }
        IndicatorSpec::Bollinger { period, std_dev } => {
            let bb = bollinger_bands(closes, period, std_dev);
            let Some(mid) = latest(&bb.middle) else {
                return IndicatorReading::undefined();
            };
            let percent_b = latest(&bb.percent_b);
            let mut r = match percent_b {
                Some(pb) if pb > 1.0 => reading(Some(mid), "above_upper_band", SignalTag::Bearish),
                Some(pb) if pb < 0.0 => reading(Some(mid), "below_lower_band", SignalTag::Bullish),
                Some(_) => reading(Some(mid), "within_bands", SignalTag::Neutral),
                None => reading(Some(mid), "flat_bands", SignalTag::Neutral),
            };
            r.components.insert("upper".into(), latest(&bb.upper));
            r.components.insert("lower".into(), latest(&bb.lower));
            r.components.insert("percent_b".into(), percent_b);
            r
        }
        IndicatorSpec::Stochastic { k_period, d_period } => {
            let result = stochastic(bars, k_period, d_period);
            let Some(k) = latest(&result.k) else {
                return IndicatorReading::undefined();
            };
            let mut r = if k > 80.0 {
                reading(Some(k), "overbought", SignalTag::Bearish)
            } else if k < 20.0 {
                reading(Some(k), "oversold", SignalTag::Bullish)
            } else {
                reading(Some(k), "neutral", SignalTag::Neutral)
            };
            r.components.insert("d".into(), latest(&result.d));
            r
        }
        IndicatorSpec::WilliamsR { period } => {
            let Some(value) = latest(&williams_r(bars, period)) else {
                return IndicatorReading::undefined();
            };
            if value > -20.0 {
                reading(Some(value), "overbought", SignalTag::Bearish)
            } else if value < -80.0 {
                reading(Some(value), "oversold", SignalTag::Bullish)
            } else {
                reading(Some(value), "neutral", SignalTag::Neutral)
            }
        }
        IndicatorSpec::Adx { period } => {
            let result = adx(bars, period);
            let Some(value) = latest(&result.adx) else {
                return IndicatorReading::undefined();
            };
            let plus = latest(&result.plus_di);
            let minus = latest(&result.minus_di);
            let mut r = match (plus, minus) {
                (Some(p), Some(m)) if value > 25.0 && p > m => {
                    reading(Some(value), "strong_uptrend", SignalTag::Bullish)
                }
                (Some(p), Some(m)) if value > 25.0 && m > p => {
                    reading(Some(value), "strong_downtrend", SignalTag::Bearish)
                }
                _ if value > 25.0 => reading(Some(value), "strong_trend", SignalTag::Neutral),
                _ => reading(Some(value), "weak_trend", SignalTag::Neutral),
            };
            r.components.insert("plus_di".into(), plus);
            r.components.insert("minus_di".into(), minus);
            r
        }
        IndicatorSpec::Sma { period } => average_reading(latest(&sma(closes, period)), close),
        IndicatorSpec::Ema { period } => average_reading(latest(&ema(closes, period)), close),
    }
}

fn average_reading(value: Option<f64>, close: f64) -> IndicatorReading {
    match value {
        None => IndicatorReading::undefined(),
        Some(v) if close > v => reading(Some(v), "price_above", SignalTag::Bullish),
        Some(v) if close < v => reading(Some(v), "price_below", SignalTag::Bearish),
        Some(v) => reading(Some(v), "price_at", SignalTag::Neutral),
    }
}

/// Price relative to SMA20 and SMA50.
pub fn trend_state(closes: &[f64]) -> Option<TrendState> {
    let price = *closes.last()?;
    let s20 = latest(&sma(closes, 20))?;
    let s50 = latest(&sma(closes, 50));

    let state = match s50 {
        Some(s50) if price > s20 && s20 > s50 => TrendState::StrongUptrend,
        Some(s50) if price < s20 && s20 < s50 => TrendState::StrongDowntrend,
        _ if price > s20 * 1.01 => TrendState::Uptrend,
        _ if price < s20 * 0.99 => TrendState::Downtrend,
        _ => TrendState::Sideways,
    };
    Some(state)
}

/// Latest volume against the trailing average: above 1.5x is high, below 0.5x low.
pub fn volume_state(bars: &[Bar]) -> Option<VolumeState> {
    if bars.len() < 2 {
        return None;
    }
    let start = bars.len().saturating_sub(VOLUME_LOOKBACK);
    let window: Vec<f64> = bars[start..].iter().map(|b| b.volume).collect();
    let avg = stats::mean(&window);
    if avg <= 0.0 {
        return None;
    }
    let ratio = bars[bars.len() - 1].volume / avg;
    Some(if ratio > 1.5 {
        VolumeState::High
    } else if ratio < 0.5 {
        VolumeState::Low
    } else {
        VolumeState::Normal
    })
}

/// Vote weight of an indicator in the technical score.
pub fn indicator_weight(name: &str) -> f64 {
    if name.starts_with("rsi_") || name.starts_with("macd_") || name.starts_with("adx_") {
        2.0
    } else if let Some(period) = name.strip_prefix("sma_").and_then(|p| p.parse::<usize>().ok()) {
        if period >= 50 {
            1.5
        } else {
            1.0
        }
    } else {
        1.0
    }
}

/// Human-readable form of a reading key: `rsi_14` becomes `RSI(14)`,
/// `macd_12_26_9` becomes `MACD(12,26,9)`. Unknown keys pass through.
pub fn display_name(name: &str) -> String {
    const LABELS: [(&str, &str); 8] = [
        ("williams_r_", "Williams %R"),
        ("macd_", "MACD"),
        ("stoch_", "Stochastic"),
        ("rsi_", "RSI"),
        ("adx_", "ADX"),
        ("sma_", "SMA"),
        ("ema_", "EMA"),
        ("bb_", "Bollinger"),
    ];
    LABELS
        .iter()
        .find_map(|(prefix, label)| {
            name.strip_prefix(prefix)
                .map(|params| format!("{}({})", label, params.replace('_', ",")))
        })
        .unwrap_or_else(|| name.to_string())
}

/// Each defined reading's share of the technical score, in points around 50.
/// The contributions sum to `technical_score - 50`.
pub fn signal_contributions(set: &IndicatorSet) -> Vec<(String, f64)> {
    let defined: Vec<(&String, &IndicatorReading)> =
        set.readings.iter().filter(|(_, r)| r.is_defined()).collect();
    let total_weight: f64 = defined.iter().map(|(name, _)| indicator_weight(name)).sum();
    if total_weight <= 0.0 {
        return vec![];
    }
    defined
        .into_iter()
        .map(|(name, r)| {
            let share = indicator_weight(name) * r.signal.sign() / total_weight * 50.0;
            (name.clone(), share)
        })
        .collect()
}

/// 0-100 technical view: 50 plus the weighted vote of the defined readings.
/// `None` when no indicator produced a value.
pub fn technical_score(set: &IndicatorSet) -> Option<f64> {
    if !set.has_data() {
        return None;
    }
    let score = 50.0 + signal_contributions(set).iter().map(|(_, c)| c).sum::<f64>();
    Some(score.clamp(0.0, 100.0))
}
