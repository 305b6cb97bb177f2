use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Exchange region an instrument is listed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Market {
    #[default]
    US,
    IN,
    CN,
    EU,
    HK,
    JP,
    CA,
    AU,
}

impl Market {
    pub fn currency_code(&self) -> &'static str {
        match self {
            Market::US => "USD",
            Market::IN => "INR",
            Market::CN => "CNY",
            Market::EU => "EUR",
            Market::HK => "HKD",
            Market::JP => "JPY",
            Market::CA => "CAD",
            Market::AU => "AUD",
        }
    }

    pub fn currency_symbol(&self) -> &'static str {
        match self {
            Market::US => "$",
            Market::IN => "₹",
            Market::CN | Market::JP => "¥",
            Market::EU => "€",
            Market::HK => "HK$",
            Market::CA => "C$",
            Market::AU => "A$",
        }
    }

    /// Format a price in the market's currency. Yen has no minor unit.
    pub fn format_price(&self, price: f64) -> String {
        match self {
            Market::JP => format!("{}{:.0}", self.currency_symbol(), price),
            _ => format!("{}{:.2}", self.currency_symbol(), price),
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "US" => Some(Market::US),
            "IN" => Some(Market::IN),
            "CN" => Some(Market::CN),
            "EU" => Some(Market::EU),
            "HK" => Some(Market::HK),
            "JP" => Some(Market::JP),
            "CA" => Some(Market::CA),
            "AU" => Some(Market::AU),
            _ => None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Identity and listing context of an instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    pub symbol: String,
    #[serde(default)]
    pub market: Market,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

impl InstrumentMeta {
    pub fn new(symbol: impl Into<String>, market: Market) -> Self {
        Self {
            symbol: symbol.into(),
            market,
            name: None,
            sector: None,
        }
    }

    /// Stable identifier used in verdicts and comparisons, e.g. `7203.JP`.
    pub fn instrument_id(&self) -> String {
        format!("{}.{}", self.symbol.trim().to_uppercase(), self.market)
    }
}

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A bar with a non-finite or non-positive price is a gap, not data.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
            && self.high >= self.low
            && self.volume.is_finite()
    }
}

/// Ordered price history for one instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    /// Builds a series, sorting by timestamp and dropping repeated timestamps
    /// so the strictly-increasing invariant holds.
    pub fn new(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self { bars }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Bars usable by indicator math, in order.
    pub fn valid_bars(&self) -> Vec<Bar> {
        self.bars.iter().filter(|b| b.is_valid()).cloned().collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().filter(|b| b.is_valid()).map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.iter().rev().find(|b| b.is_valid()).map(|b| b.close)
    }

    /// Bars with timestamps inside `[from, to]`.
    pub fn window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> PriceSeries {
        PriceSeries {
            bars: self
                .bars
                .iter()
                .filter(|b| b.timestamp >= from && b.timestamp <= to)
                .cloned()
                .collect(),
        }
    }
}

/// Direction an individual indicator leans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalTag {
    Bullish,
    Bearish,
    Neutral,
}

impl SignalTag {
    pub fn sign(&self) -> f64 {
        match self {
            SignalTag::Bullish => 1.0,
            SignalTag::Bearish => -1.0,
            SignalTag::Neutral => 0.0,
        }
    }
}

/// Current reading of one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    /// Primary value, `None` until the indicator's window is filled.
    pub value: Option<f64>,
    /// Secondary lines (MACD signal, Bollinger bands, +DI/-DI, ...).
    #[serde(default)]
    pub components: BTreeMap<String, Option<f64>>,
    /// Qualitative state, e.g. `overbought`, `above_upper_band`.
    pub state: String,
    pub signal: SignalTag,
}

impl IndicatorReading {
    pub fn undefined() -> Self {
        Self {
            value: None,
            components: BTreeMap::new(),
            state: "insufficient_data".to_string(),
            signal: SignalTag::Neutral,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    pub fn component(&self, name: &str) -> Option<f64> {
        self.components.get(name).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    StrongUptrend,
    Uptrend,
    Sideways,
    Downtrend,
    StrongDowntrend,
}

impl TrendState {
    pub fn label(&self) -> &'static str {
        match self {
            TrendState::StrongUptrend => "Strong Uptrend",
            TrendState::Uptrend => "Uptrend",
            TrendState::Sideways => "Sideways",
            TrendState::Downtrend => "Downtrend",
            TrendState::StrongDowntrend => "Strong Downtrend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    High,
    Normal,
    Low,
}

/// Everything the Indicator Engine derives from one PriceSeries snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub readings: BTreeMap<String, IndicatorReading>,
    /// Support/resistance levels, nearest to the last close first.
    pub levels: Vec<f64>,
    pub last_close: Option<f64>,
    /// Annualized standard deviation of close-to-close returns.
    pub realized_volatility: Option<f64>,
    pub trend: Option<TrendState>,
    pub volume_state: Option<VolumeState>,
    /// Valid bars the set was computed from.
    pub bars_used: usize,
}

impl IndicatorSet {
    pub fn empty() -> Self {
        Self {
            readings: BTreeMap::new(),
            levels: Vec::new(),
            last_close: None,
            realized_volatility: None,
            trend: None,
            volume_state: None,
            bars_used: 0,
        }
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorReading> {
        self.readings.get(name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.readings.get(name).and_then(|r| r.value)
    }

    pub fn defined_count(&self) -> usize {
        self.readings.values().filter(|r| r.is_defined()).count()
    }

    /// Share of requested indicators that produced a value.
    pub fn coverage(&self) -> f64 {
        if self.readings.is_empty() {
            return 0.0;
        }
        self.defined_count() as f64 / self.readings.len() as f64
    }

    pub fn has_data(&self) -> bool {
        self.defined_count() > 0
    }
}

/// Raw fundamental metrics. Percent-valued fields use percentage points
/// (ROE of 15% is `15.0`); ratio fields are plain ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalProfile {
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub ps_ratio: Option<f64>,
    pub peg_ratio: Option<f64>,
    /// Enterprise value over EBITDA
    pub ev_to_ebitda: Option<f64>,
    /// Return on equity, percent
    pub roe: Option<f64>,
    /// Return on assets, percent
    pub roa: Option<f64>,
    /// Net profit margin, percent
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub gross_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub current_ratio: Option<f64>,
    pub quick_ratio: Option<f64>,
    /// Dividend yield, percent
    pub dividend_yield: Option<f64>,
    /// Payout ratio, percent of earnings
    pub payout_ratio: Option<f64>,
    pub beta: Option<f64>,
}

impl FundamentalProfile {
    /// Named view over the scored metrics, in a fixed order.
    pub fn metrics(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("pe_ratio", self.pe_ratio),
            ("forward_pe", self.forward_pe),
            ("pb_ratio", self.pb_ratio),
            ("ps_ratio", self.ps_ratio),
            ("peg_ratio", self.peg_ratio),
            ("ev_to_ebitda", self.ev_to_ebitda),
            ("roe", self.roe),
            ("roa", self.roa),
            ("profit_margin", self.profit_margin),
            ("operating_margin", self.operating_margin),
            ("gross_margin", self.gross_margin),
            ("debt_to_equity", self.debt_to_equity),
            ("current_ratio", self.current_ratio),
            ("quick_ratio", self.quick_ratio),
            ("dividend_yield", self.dividend_yield),
            ("payout_ratio", self.payout_ratio),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.metrics().iter().all(|(_, v)| v.is_none()) && self.beta.is_none()
    }
}

/// Normalized 0-100 fundamental scores. A `None` dimension had no metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalScores {
    pub valuation: Option<f64>,
    pub profitability: Option<f64>,
    pub financial_health: Option<f64>,
    pub dividend_quality: Option<f64>,
    pub overall: Option<f64>,
    /// Per-metric sub-scores for the metrics that were present.
    pub metric_scores: BTreeMap<String, f64>,
    pub missing_metrics: Vec<String>,
    /// Present metrics / scored metrics.
    pub coverage: f64,
}

impl FundamentalScores {
    pub fn dimensions(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("valuation", self.valuation),
            ("profitability", self.profitability),
            ("financial_health", self.financial_health),
            ("dividend_quality", self.dividend_quality),
        ]
    }
}

/// A news item as delivered by a news provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub source: String,
    pub headline: String,
    #[serde(default)]
    pub body: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Provider-supplied polarity; scored locally when absent.
    #[serde(default)]
    pub polarity: Option<f64>,
    #[serde(default)]
    pub subjectivity: Option<f64>,
}

/// One scored, deduplicated news item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSample {
    pub source: String,
    pub headline: String,
    pub published_at: DateTime<Utc>,
    pub polarity: f64,
    pub subjectivity: f64,
    pub extracted_theme: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeCount {
    pub theme: String,
    pub count: usize,
    pub average_published_at: DateTime<Utc>,
}

/// Aggregate view over a set of sentiment samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    /// Recency-weighted mean polarity in [-1, 1]; 0 when there are no samples.
    pub mean_polarity: f64,
    /// Unweighted mean of |polarity|.
    pub magnitude: f64,
    pub distribution: SentimentDistribution,
    pub top_themes: Vec<ThemeCount>,
    pub label: SentimentLabel,
    pub trading_implication: String,
    pub sample_count: usize,
    /// Items removed as duplicates before aggregation.
    pub duplicates_removed: usize,
    /// Items skipped for having no headline.
    #[serde(default)]
    pub blank_skipped: usize,
    pub samples: Vec<SentimentSample>,
}

impl SentimentSummary {
    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }

    pub fn percent(&self, bucket: usize) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        bucket as f64 / self.sample_count as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "buy" | "strong buy" | "strong_buy" => Some(Direction::Buy),
            "sell" | "strong sell" | "strong_sell" => Some(Direction::Sell),
            "hold" => Some(Direction::Hold),
            _ => None,
        }
    }
}

/// Risk tier. Ordering is LOW < MEDIUM < HIGH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => RiskTier::Low,
            1 => RiskTier::Medium,
            _ => RiskTier::High,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            RiskTier::Low => 0,
            RiskTier::Medium => 1,
            RiskTier::High => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(RiskTier::Low),
            "medium" | "moderate" => Some(RiskTier::Medium),
            "high" => Some(RiskTier::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub low: f64,
    pub high: f64,
}

impl PriceBand {
    pub fn around(center: f64, width: f64) -> Self {
        Self {
            low: center * (1.0 - width),
            high: center * (1.0 + width),
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low > 0.0 && self.low <= self.high
    }
}

/// A signed contribution to the composite score, in composite points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub label: String,
    pub weight: f64,
}

/// 0-100 sub-scores of the three upstream views
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub technical: Option<f64>,
    pub fundamental: Option<f64>,
    pub sentiment: Option<f64>,
}

impl SubScores {
    pub fn present(&self) -> usize {
        [self.technical, self.fundamental, self.sentiment]
            .iter()
            .filter(|s| s.is_some())
            .count()
    }
}

/// The fused recommendation for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub instrument_id: String,
    pub direction: Direction,
    pub confidence: f64,
    pub risk: RiskTier,
    pub composite_score: f64,
    pub sub_scores: SubScores,
    pub current_price: Option<f64>,
    pub target_price: Option<f64>,
    pub target_horizon: String,
    pub entry_price_band: Option<PriceBand>,
    pub exit_price_band: Option<PriceBand>,
    pub stop_loss: Option<f64>,
    /// Ordered by absolute weight, largest first.
    pub rationale: Vec<Factor>,
    /// Expected gain to the target over the loss to the stop.
    #[serde(default)]
    pub risk_reward: Option<f64>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    /// One-paragraph narrative of the call.
    #[serde(default)]
    pub summary: String,
}

/// Return/risk statistics over the comparison window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Percent change from first to last close
    pub total_return: Option<f64>,
    /// Annualized volatility, percent
    pub volatility: Option<f64>,
    /// Mean daily return / stdev of daily returns
    pub sharpe_ratio: Option<f64>,
    /// Largest peak-to-trough decline, percent (<= 0)
    pub max_drawdown: Option<f64>,
    /// Last close within the window's low-high range, percent
    pub price_position: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedInstrument {
    pub instrument_id: String,
    pub verdict: Verdict,
    pub composite_score: f64,
    /// 1-based
    pub rank: usize,
    pub metrics: PerformanceMetrics,
}

/// `left - right` for every tracked metric; `None` when either side is missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseDelta {
    pub left: String,
    pub right: String,
    pub deltas: BTreeMap<String, Option<f64>>,
}

/// Closed time range the comparison metrics are computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateWindow {
    /// The `days` calendar days ending at `to`.
    pub fn trailing(to: DateTime<Utc>, days: u32) -> Self {
        Self {
            from: to - chrono::Duration::days(i64::from(days)),
            to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub ranked: Vec<RankedInstrument>,
    pub deltas: Vec<PairwiseDelta>,
    pub best_choice: String,
    /// Why the best choice came out on top.
    #[serde(default)]
    pub reasons: Vec<String>,
    /// `None` when metrics span each instrument's full history.
    #[serde(default)]
    pub window: Option<DateWindow>,
}
