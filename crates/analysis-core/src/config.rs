use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::AnalysisError;

/// One indicator the engine should compute, with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorSpec {
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { period: usize, std_dev: f64 },
    Stochastic { k_period: usize, d_period: usize },
    WilliamsR { period: usize },
    Adx { period: usize },
    Sma { period: usize },
    Ema { period: usize },
}

impl IndicatorSpec {
    /// Key under which the reading is stored, e.g. `rsi_14` or `macd_12_26_9`.
    pub fn name(&self) -> String {
        match self {
            IndicatorSpec::Rsi { period } => format!("rsi_{}", period),
            IndicatorSpec::Macd { fast, slow, signal } => format!("macd_{}_{}_{}", fast, slow, signal),
            IndicatorSpec::Bollinger { period, std_dev } => format!("bb_{}_{}", period, std_dev),
            IndicatorSpec::Stochastic { k_period, d_period } => format!("stoch_{}_{}", k_period, d_period),
            IndicatorSpec::WilliamsR { period } => format!("williams_r_{}", period),
            IndicatorSpec::Adx { period } => format!("adx_{}", period),
            IndicatorSpec::Sma { period } => format!("sma_{}", period),
            IndicatorSpec::Ema { period } => format!("ema_{}", period),
        }
    }

    /// Periods that must be non-zero for the indicator to be computable.
    fn periods(&self) -> Vec<usize> {
        match *self {
            IndicatorSpec::Rsi { period }
            | IndicatorSpec::WilliamsR { period }
            | IndicatorSpec::Adx { period }
            | IndicatorSpec::Sma { period }
            | IndicatorSpec::Ema { period }
            | IndicatorSpec::Bollinger { period, .. } => vec![period],
            IndicatorSpec::Macd { fast, slow, signal } => vec![fast, slow, signal],
            IndicatorSpec::Stochastic { k_period, d_period } => vec![k_period, d_period],
        }
    }

    pub fn default_set() -> Vec<IndicatorSpec> {
        vec![
            IndicatorSpec::Rsi { period: 14 },
            IndicatorSpec::Macd { fast: 12, slow: 26, signal: 9 },
            IndicatorSpec::Bollinger { period: 20, std_dev: 2.0 },
            IndicatorSpec::Stochastic { k_period: 14, d_period: 3 },
            IndicatorSpec::WilliamsR { period: 14 },
            IndicatorSpec::Adx { period: 14 },
            IndicatorSpec::Sma { period: 20 },
            IndicatorSpec::Sma { period: 50 },
            IndicatorSpec::Ema { period: 12 },
            IndicatorSpec::Ema { period: 26 },
        ]
    }
}

impl FromStr for IndicatorSpec {
    type Err = AnalysisError;

    /// Parses `rsi:14`, `macd:12:26:9`, `bb:20:2`, `stoch:14:3`, `williams_r:14`,
    /// `adx:14`, `sma:50`, `ema:12`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || AnalysisError::Configuration(format!("invalid indicator spec '{}'", s));
        let parts: Vec<&str> = s.trim().split(':').collect();
        let int = |i: usize| -> Result<usize, AnalysisError> {
            parts.get(i).and_then(|p| p.parse().ok()).ok_or_else(bad)
        };

        let spec = match parts[0].to_lowercase().as_str() {
            "rsi" => IndicatorSpec::Rsi { period: int(1)? },
            "macd" => IndicatorSpec::Macd { fast: int(1)?, slow: int(2)?, signal: int(3)? },
            "bb" | "bollinger" => IndicatorSpec::Bollinger {
                period: int(1)?,
                std_dev: parts.get(2).and_then(|p| p.parse().ok()).ok_or_else(bad)?,
            },
            "stoch" | "stochastic" => IndicatorSpec::Stochastic { k_period: int(1)?, d_period: int(2)? },
            "williams_r" | "willr" => IndicatorSpec::WilliamsR { period: int(1)? },
            "adx" => IndicatorSpec::Adx { period: int(1)? },
            "sma" => IndicatorSpec::Sma { period: int(1)? },
            "ema" => IndicatorSpec::Ema { period: int(1)? },
            _ => return Err(bad()),
        };
        Ok(spec)
    }
}

/// Weights of the three views in the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub technical: f64,
    pub fundamental: f64,
    pub sentiment: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            technical: 0.40,
            fundamental: 0.35,
            sentiment: 0.25,
        }
    }
}

/// Weights of the fundamental dimensions in the overall fundamental score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundamentalWeights {
    pub valuation: f64,
    pub profitability: f64,
    pub financial_health: f64,
    pub dividend_quality: f64,
}

impl Default for FundamentalWeights {
    fn default() -> Self {
        Self {
            valuation: 1.0,
            profitability: 1.0,
            financial_health: 1.0,
            dividend_quality: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentConfig {
    /// Samples newer than this keep full weight.
    pub recency_window_hours: f64,
    /// Lowest weight an old sample can decay to.
    pub decay_floor: f64,
    pub positive_threshold: f64,
    pub negative_threshold: f64,
    /// Word-overlap ratio above which two headlines from one source are duplicates.
    pub same_source_similarity: f64,
    /// Overlap ratio above which headlines from different sources are duplicates.
    pub cross_source_similarity: f64,
    pub max_themes: usize,
    /// Below this many samples the implication reports limited coverage.
    pub min_samples: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            recency_window_hours: 72.0,
            decay_floor: 0.2,
            positive_threshold: 0.1,
            negative_threshold: -0.1,
            same_source_similarity: 0.7,
            cross_source_similarity: 0.9,
            max_themes: 5,
            min_samples: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringThresholds {
    pub buy: f64,
    pub sell: f64,
    /// A sub-score at or above this leans bullish.
    pub lean_bullish: f64,
    /// A sub-score at or below this leans bearish.
    pub lean_bearish: f64,
    pub max_expected_move: f64,
    /// Used when realized volatility is unknown.
    pub default_volatility: f64,
    /// Horizon in years the expected move is scaled to.
    pub horizon_years: f64,
    pub target_horizon: String,
    pub max_rationale_factors: usize,
    /// Bars of history considered complete for confidence purposes.
    pub full_history_bars: usize,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            buy: 65.0,
            sell: 35.0,
            lean_bullish: 55.0,
            lean_bearish: 45.0,
            max_expected_move: 0.40,
            default_volatility: 0.30,
            horizon_years: 0.5,
            target_horizon: "3-6 months".to_string(),
            max_rationale_factors: 6,
            full_history_bars: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Annualized volatility below this is LOW.
    pub volatility_low: f64,
    /// Annualized volatility at or above this is HIGH.
    pub volatility_high: f64,
    pub beta_low: f64,
    pub beta_high: f64,
    /// Share of the volatility tier in the combined tier; beta takes the rest.
    pub volatility_weight: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            volatility_low: 0.25,
            volatility_high: 0.45,
            beta_low: 0.8,
            beta_high: 1.3,
            volatility_weight: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupportResistanceConfig {
    /// Bars on each side a pivot must dominate.
    pub window: usize,
    /// Levels closer than this (percent of price) are merged.
    pub min_separation_pct: f64,
    pub max_levels: usize,
}

impl Default for SupportResistanceConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_separation_pct: 1.5,
            max_levels: 6,
        }
    }
}

/// Every tunable of the engine, passed explicitly at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub ai_timeout_ms: u64,
    pub indicator_set: Vec<IndicatorSpec>,
    pub score_weights: ScoreWeights,
    pub recency_decay_half_life_hours: f64,
    pub sentiment: SentimentConfig,
    pub fundamental_weights: FundamentalWeights,
    pub scoring: ScoringThresholds,
    pub risk: RiskThresholds,
    pub support_resistance: SupportResistanceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ai_timeout_ms: 8_000,
            indicator_set: IndicatorSpec::default_set(),
            score_weights: ScoreWeights::default(),
            recency_decay_half_life_hours: 48.0,
            sentiment: SentimentConfig::default(),
            fundamental_weights: FundamentalWeights::default(),
            scoring: ScoringThresholds::default(),
            risk: RiskThresholds::default(),
            support_resistance: SupportResistanceConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, current: T) -> Result<T, AnalysisError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AnalysisError::Configuration(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(current),
    }
}

impl EngineConfig {
    /// Defaults overlaid with `INVESTIQ_*` environment variables.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let mut config = Self::default();

        config.ai_timeout_ms = env_parse("INVESTIQ_AI_TIMEOUT_MS", config.ai_timeout_ms)?;
        config.score_weights.technical = env_parse("INVESTIQ_WEIGHT_TECHNICAL", config.score_weights.technical)?;
        config.score_weights.fundamental =
            env_parse("INVESTIQ_WEIGHT_FUNDAMENTAL", config.score_weights.fundamental)?;
        config.score_weights.sentiment = env_parse("INVESTIQ_WEIGHT_SENTIMENT", config.score_weights.sentiment)?;
        config.recency_decay_half_life_hours =
            env_parse("INVESTIQ_DECAY_HALF_LIFE_HOURS", config.recency_decay_half_life_hours)?;
        config.sentiment.recency_window_hours =
            env_parse("INVESTIQ_RECENCY_WINDOW_HOURS", config.sentiment.recency_window_hours)?;
        config.scoring.buy = env_parse("INVESTIQ_BUY_THRESHOLD", config.scoring.buy)?;
        config.scoring.sell = env_parse("INVESTIQ_SELL_THRESHOLD", config.scoring.sell)?;

        if let Ok(list) = env::var("INVESTIQ_INDICATORS") {
            config.indicator_set = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse)
                .collect::<Result<Vec<_>, _>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let w = &self.score_weights;
        if [w.technical, w.fundamental, w.sentiment].iter().any(|v| *v < 0.0 || !v.is_finite()) {
            return Err(AnalysisError::Configuration("score weights must be non-negative".into()));
        }
        if w.technical + w.fundamental + w.sentiment <= 0.0 {
            return Err(AnalysisError::Configuration("score weights must not all be zero".into()));
        }

        let f = &self.fundamental_weights;
        let fw = [f.valuation, f.profitability, f.financial_health, f.dividend_quality];
        if fw.iter().any(|v| *v < 0.0) || fw.iter().sum::<f64>() <= 0.0 {
            return Err(AnalysisError::Configuration(
                "fundamental weights must be non-negative and not all zero".into(),
            ));
        }

        if self.scoring.sell >= self.scoring.buy {
            return Err(AnalysisError::Configuration(format!(
                "sell threshold {} must be below buy threshold {}",
                self.scoring.sell, self.scoring.buy
            )));
        }
        if self.scoring.lean_bearish >= self.scoring.lean_bullish {
            return Err(AnalysisError::Configuration("lean thresholds are inverted".into()));
        }
        if self.risk.volatility_low >= self.risk.volatility_high || self.risk.beta_low >= self.risk.beta_high {
            return Err(AnalysisError::Configuration("risk tier thresholds are inverted".into()));
        }
        if self.sentiment.negative_threshold >= self.sentiment.positive_threshold {
            return Err(AnalysisError::Configuration("sentiment label thresholds are inverted".into()));
        }
        if !(0.0..=1.0).contains(&self.sentiment.decay_floor) || self.sentiment.decay_floor == 0.0 {
            return Err(AnalysisError::Configuration("decay floor must be in (0, 1]".into()));
        }
        if self.recency_decay_half_life_hours <= 0.0 {
            return Err(AnalysisError::Configuration("decay half-life must be positive".into()));
        }
        if self.ai_timeout_ms == 0 {
            return Err(AnalysisError::Configuration("ai_timeout_ms must be positive".into()));
        }
        if self.support_resistance.window == 0 {
            return Err(AnalysisError::Configuration("support/resistance window must be positive".into()));
        }
        if let Some(spec) = self.indicator_set.iter().find(|s| s.periods().contains(&0)) {
            return Err(AnalysisError::Configuration(format!("{} has a zero period", spec.name())));
        }
        Ok(())
    }
}
