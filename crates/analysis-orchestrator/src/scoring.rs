use analysis_core::{
    AnalysisError, Direction, EngineConfig, Factor, FundamentalProfile, FundamentalScores, IndicatorSet,
    InstrumentMeta, Market, PriceBand, RiskThresholds, RiskTier, ScoreWeights, ScoringThresholds, SentimentLabel,
    SentimentSummary, SubScores, TrendState, Verdict,
};
use async_trait::async_trait;
use fundamental_analysis::FundamentalsNormalizer;
use serde::{Deserialize, Serialize};
use sentiment_analysis::sentiment_score;
use technical_analysis::{display_name, signal_contributions, technical_score};

/// Cap on each of the risk and opportunity lists.
const MAX_NOTES: usize = 4;

/// Everything a scoring strategy sees about one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringInput {
    pub instrument: InstrumentMeta,
    pub indicators: IndicatorSet,
    pub profile: FundamentalProfile,
    pub fundamentals: FundamentalScores,
    pub sentiment: SentimentSummary,
}

impl ScoringInput {
    pub fn sub_scores(&self) -> SubScores {
        SubScores {
            technical: technical_score(&self.indicators),
            fundamental: self.fundamentals.overall,
            sentiment: sentiment_score(&self.sentiment),
        }
    }
}

/// Turns the three upstream views into a Verdict
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn score(&self, input: &ScoringInput) -> Result<Verdict, AnalysisError>;
}

/// Deterministic weighted-sum scorer. Also the fallback for the AI path.
#[derive(Clone)]
pub struct RuleBasedScorer {
    weights: ScoreWeights,
    thresholds: ScoringThresholds,
    risk: RiskThresholds,
    normalizer_weights: analysis_core::FundamentalWeights,
}

impl RuleBasedScorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            weights: config.score_weights,
            thresholds: config.scoring.clone(),
            risk: config.risk,
            normalizer_weights: config.fundamental_weights,
        }
    }

    pub fn thresholds(&self) -> &ScoringThresholds {
        &self.thresholds
    }

    /// View weights renormalized over the present sub-scores, in
    /// technical/fundamental/sentiment order. Present views whose configured
    /// weights are all zero share the weight equally. `None` only when no
    /// view is present.
    fn effective_weights(&self, sub: &SubScores) -> Option<[Option<f64>; 3]> {
        let mut raw = [
            sub.technical.map(|_| self.weights.technical.max(0.0)),
            sub.fundamental.map(|_| self.weights.fundamental.max(0.0)),
            sub.sentiment.map(|_| self.weights.sentiment.max(0.0)),
        ];
        if raw.iter().all(Option::is_none) {
            return None;
        }
        let mut total: f64 = raw.iter().flatten().sum();
        if total <= 0.0 {
            raw = raw.map(|w| w.map(|_| 1.0));
            total = raw.iter().flatten().sum();
        }
        Some(raw.map(|w| w.map(|w| w / total)))
    }

    /// Weighted mean of the present sub-scores; `None` when all are missing.
    pub fn composite(&self, sub: &SubScores) -> Option<f64> {
        let weights = self.effective_weights(sub)?;
        let scores = [sub.technical, sub.fundamental, sub.sentiment];
        let composite = scores
            .iter()
            .zip(weights)
            .filter_map(|(s, w)| Some((*s)? * w?))
            .sum::<f64>();
        Some(composite.clamp(0.0, 100.0))
    }

    pub fn direction(&self, composite: f64) -> Direction {
        if composite >= self.thresholds.buy {
            Direction::Buy
        } else if composite <= self.thresholds.sell {
            Direction::Sell
        } else {
            Direction::Hold
        }
    }

    fn lean(&self, score: f64) -> i8 {
        if score >= self.thresholds.lean_bullish {
            1
        } else if score <= self.thresholds.lean_bearish {
            -1
        } else {
            0
        }
    }

    /// Rises with the weight of views agreeing with the composite's side,
    /// falls with the weight opposing it, and scales with data completeness.
    pub fn confidence(&self, sub: &SubScores, composite: f64, completeness: f64) -> f64 {
        let Some(weights) = self.effective_weights(sub) else {
            return 0.05;
        };
        let side = self.lean(composite).signum();
        let side = if side == 0 && (composite - 50.0).abs() > f64::EPSILON {
            if composite > 50.0 { 1 } else { -1 }
        } else {
            side
        };

        let mut agreement = 0.0;
        let mut conflict = 0.0;
        for (score, w) in [sub.technical, sub.fundamental, sub.sentiment].iter().zip(weights) {
            let (Some(s), Some(w)) = (score, w) else { continue };
            let lean = self.lean(*s);
            if lean == side {
                agreement += w;
            } else if lean != 0 {
                conflict += w;
            }
        }

        let conviction = (composite - 50.0).abs() / 50.0;
        let base = 0.35 + 0.4 * agreement - 0.25 * conflict + 0.25 * conviction;
        (base * (0.5 + 0.5 * completeness.clamp(0.0, 1.0))).clamp(0.05, 0.95)
    }

    /// Share of the possible inputs that were actually available.
    pub fn completeness(&self, input: &ScoringInput, sub: &SubScores) -> f64 {
        let views = sub.present() as f64 / 3.0;
        let history = (input.indicators.bars_used as f64 / self.thresholds.full_history_bars.max(1) as f64).min(1.0);
        let fundamentals = input.fundamentals.coverage;
        (views + history + fundamentals) / 3.0
    }

    fn tier_of(value: f64, low: f64, high: f64, inclusive_high: bool) -> u8 {
        if value < low {
            0
        } else if value < high || (inclusive_high && value == high) {
            1
        } else {
            2
        }
    }

    /// Volatility tier blended with the beta tier; MEDIUM when neither is known.
    pub fn risk_tier(&self, volatility: Option<f64>, beta: Option<f64>) -> RiskTier {
        let r = &self.risk;
        let vol_tier = volatility
            .filter(|v| v.is_finite())
            .map(|v| Self::tier_of(v, r.volatility_low, r.volatility_high, false));
        let beta_tier = beta
            .filter(|b| b.is_finite())
            .map(|b| Self::tier_of(b.abs(), r.beta_low, r.beta_high, true));

        match (vol_tier, beta_tier) {
            (Some(v), Some(b)) => {
                let blended = r.volatility_weight * v as f64 + (1.0 - r.volatility_weight) * b as f64;
                RiskTier::from_level(blended.round() as u8)
            }
            (Some(v), None) => RiskTier::from_level(v),
            (None, Some(b)) => RiskTier::from_level(b),
            (None, None) => RiskTier::Medium,
        }
    }

    /// Fractional price move implied by the composite over the target horizon.
    pub fn expected_move(&self, composite: f64, volatility: Option<f64>) -> f64 {
        let t = &self.thresholds;
        let vol = volatility.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(t.default_volatility);
        let raw = (composite - 50.0) / 50.0 * vol * t.horizon_years.sqrt();
        raw.clamp(-t.max_expected_move, t.max_expected_move)
    }

    /// Relative half-width of the entry/exit bands: about a week of volatility.
    pub fn band_width(&self, volatility: Option<f64>) -> f64 {
        let vol = volatility
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(self.thresholds.default_volatility);
        (vol * (5.0_f64 / 252.0).sqrt()).clamp(0.01, 0.10)
    }

    /// Signed composite-point contributions. Before truncation they sum to
    /// `composite - 50`.
    pub fn rationale(&self, input: &ScoringInput, sub: &SubScores) -> Vec<Factor> {
        let Some([w_tech, w_fund, w_sent]) = self.effective_weights(sub) else {
            return vec![];
        };
        let mut factors = Vec::new();

        if let Some(w) = w_tech {
            for (name, contribution) in signal_contributions(&input.indicators) {
                let state = input
                    .indicators
                    .get(&name)
                    .map(|r| r.state.clone())
                    .unwrap_or_default();
                factors.push(Factor {
                    label: format!("{} {}", display_name(&name), state.replace('_', " ")),
                    weight: w * contribution,
                });
            }
        }

        if let Some(w) = w_fund {
            let normalizer = FundamentalsNormalizer::with_weights(self.normalizer_weights);
            for (dimension, contribution) in normalizer.dimension_contributions(&input.fundamentals) {
                let score = input
                    .fundamentals
                    .dimensions()
                    .iter()
                    .find(|(d, _)| *d == dimension)
                    .and_then(|(_, s)| *s)
                    .unwrap_or(50.0);
                factors.push(Factor {
                    label: format!("Fundamental {} {:.0}/100", dimension.replace('_', " "), score),
                    weight: w * contribution,
                });
            }
        }

        if let (Some(w), Some(s)) = (w_sent, sub.sentiment) {
            factors.push(Factor {
                label: format!(
                    "News sentiment {} across {} items",
                    format!("{:?}", input.sentiment.label).to_lowercase(),
                    input.sentiment.sample_count
                ),
                weight: w * (s - 50.0),
            });
        }

        factors.retain(|f| f.weight.abs() > 1e-9);
        factors.sort_by(|a, b| {
            b.weight
                .abs()
                .partial_cmp(&a.weight.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        factors.truncate(self.thresholds.max_rationale_factors);
        factors
    }

    /// Plain-language risks and opportunities behind a call. Rationale
    /// factors pulling with the composite's side are opportunities, those
    /// pulling against it are risks.
    pub fn risk_notes(
        &self,
        input: &ScoringInput,
        sub: &SubScores,
        composite: f64,
        rationale: &[Factor],
        risk: RiskTier,
    ) -> (Vec<String>, Vec<String>) {
        let side = if composite >= 50.0 { 1.0 } else { -1.0 };
        let market = input.instrument.market;
        let mut risks = Vec::new();
        let mut opportunities = Vec::new();

        if let Some(vol) = input.indicators.realized_volatility {
            risks.push(format!(
                "Annualized volatility of {:.1}% puts the call in the {} risk tier",
                vol * 100.0,
                format!("{:?}", risk).to_lowercase()
            ));
        }
        if let Some(beta) = input.profile.beta.filter(|b| b.abs() > self.risk.beta_high) {
            risks.push(format!("Beta of {:.2} amplifies market swings", beta));
        }
        let missing: Vec<&str> = [
            ("technical", sub.technical),
            ("fundamental", sub.fundamental),
            ("sentiment", sub.sentiment),
        ]
        .iter()
        .filter(|(_, s)| s.is_none())
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            risks.push(format!(
                "No {} data; the call rests on {} of 3 views",
                missing.join(" or "),
                sub.present()
            ));
        }

        if let Some(price) = input.indicators.last_close {
            let level = if side > 0.0 {
                input.indicators.levels.iter().find(|l| **l < price).map(|l| ("Support", *l))
            } else {
                input.indicators.levels.iter().find(|l| **l > price).map(|l| ("Resistance", *l))
            };
            if let Some((kind, l)) = level {
                opportunities.push(format!("{} near {} frames the entry", kind, market.format_price(l)));
            }
        }

        let sentiment_agrees = matches!(
            (input.sentiment.label, side > 0.0),
            (SentimentLabel::Positive, true) | (SentimentLabel::Negative, false)
        );
        if let (true, Some(theme)) = (sentiment_agrees, input.sentiment.top_themes.first()) {
            opportunities.push(format!("News flow led by {} stories", theme.theme.replace('_', " ")));
        }

        for factor in rationale {
            if factor.weight * side < 0.0 {
                risks.push(format!("{} works against the call", factor.label));
            } else {
                opportunities.push(format!("{} supports the call", factor.label));
            }
        }

        risks.truncate(MAX_NOTES);
        opportunities.truncate(MAX_NOTES);
        (risks, opportunities)
    }

    /// Pure scoring; the same input always yields the same Verdict.
    pub fn score_sync(&self, input: &ScoringInput) -> Result<Verdict, AnalysisError> {
        let sub = input.sub_scores();
        let composite = self.composite(&sub).ok_or_else(|| {
            AnalysisError::InsufficientData(format!(
                "no technical, fundamental or sentiment data for {}",
                input.instrument.instrument_id()
            ))
        })?;

        let direction = self.direction(composite);
        let completeness = self.completeness(input, &sub);
        let confidence = self.confidence(&sub, composite, completeness);
        let volatility = input.indicators.realized_volatility;
        let risk = self.risk_tier(volatility, input.profile.beta);

        let current_price = input.indicators.last_close;
        let width = self.band_width(volatility);
        let target_price = current_price.map(|p| p * (1.0 + self.expected_move(composite, volatility)));
        let entry_price_band = current_price.map(|p| PriceBand::around(p, width));
        let exit_price_band = target_price.map(|t| PriceBand::around(t, width));
        let stop_loss = current_price.map(|p| match direction {
            Direction::Sell => p * (1.0 + 2.0 * width),
            Direction::Buy | Direction::Hold => p * (1.0 - 2.0 * width),
        });

        let rationale = self.rationale(input, &sub);
        let (risk_factors, opportunities) = self.risk_notes(input, &sub, composite, &rationale, risk);

        let mut verdict = Verdict {
            instrument_id: input.instrument.instrument_id(),
            direction,
            confidence,
            risk,
            composite_score: composite,
            sub_scores: sub,
            current_price,
            target_price,
            target_horizon: self.thresholds.target_horizon.clone(),
            entry_price_band,
            exit_price_band,
            stop_loss,
            rationale,
            risk_reward: risk_reward(current_price, target_price, stop_loss),
            risk_factors,
            opportunities,
            summary: String::new(),
        };
        verdict.summary = narrative(&verdict, input.instrument.market, input.indicators.trend);
        Ok(verdict)
    }
}

/// Distance to the target over distance to the stop. Negative when the
/// target sits on the stop's side of the price.
pub fn risk_reward(current: Option<f64>, target: Option<f64>, stop: Option<f64>) -> Option<f64> {
    let (price, target, stop) = (current?, target?, stop?);
    let risk = price - stop;
    if risk.abs() < f64::EPSILON {
        return None;
    }
    Some((target - price) / risk)
}

/// One-paragraph account of a verdict, prices in the market's currency.
pub fn narrative(verdict: &Verdict, market: Market, trend: Option<TrendState>) -> String {
    let score = |s: Option<f64>| s.map(|v| format!("{:.0}", v)).unwrap_or_else(|| "n/a".to_string());
    let price = verdict
        .current_price
        .map(|p| market.format_price(p))
        .unwrap_or_else(|| "an unknown price".to_string());

    let mut parts = vec![
        format!(
            "{}: {} at {} with {:.0}% confidence and {} risk.",
            verdict.instrument_id,
            format!("{:?}", verdict.direction).to_uppercase(),
            price,
            verdict.confidence * 100.0,
            format!("{:?}", verdict.risk).to_lowercase()
        ),
        format!(
            "Composite score {:.1}/100 (technical {}, fundamental {}, sentiment {}).",
            verdict.composite_score,
            score(verdict.sub_scores.technical),
            score(verdict.sub_scores.fundamental),
            score(verdict.sub_scores.sentiment)
        ),
    ];
    if let Some(trend) = trend {
        parts.push(format!("Trend: {}.", trend.label()));
    }
    if let (Some(p), Some(t)) = (verdict.current_price, verdict.target_price) {
        parts.push(format!(
            "Target {} ({:+.1}%) over {}.",
            market.format_price(t),
            (t / p - 1.0) * 100.0,
            verdict.target_horizon
        ));
    }
    if let Some(stop) = verdict.stop_loss {
        match verdict.risk_reward {
            Some(rr) => parts.push(format!("Stop loss {}, risk-reward {:.2}:1.", market.format_price(stop), rr)),
            None => parts.push(format!("Stop loss {}.", market.format_price(stop))),
        }
    }
    if let Some(top) = verdict.rationale.first() {
        parts.push(format!("Main driver: {}.", top.label));
    }
    parts.join(" ")
}

#[async_trait]
impl ScoringStrategy for RuleBasedScorer {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn score(&self, input: &ScoringInput) -> Result<Verdict, AnalysisError> {
        self.score_sync(input)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use analysis_core::{IndicatorReading, Market, SentimentDistribution, SentimentLabel, SignalTag};
    use std::collections::BTreeMap;

    fn scorer() -> RuleBasedScorer {
        RuleBasedScorer::new(&EngineConfig::default())
    }

    pub(crate) fn empty_sentiment() -> SentimentSummary {
        SentimentSummary {
            mean_polarity: 0.0,
            magnitude: 0.0,
            distribution: SentimentDistribution::default(),
            top_themes: vec![],
            label: SentimentLabel::Neutral,
            trading_implication: String::new(),
            sample_count: 0,
            duplicates_removed: 0,
            blank_skipped: 0,
            samples: vec![],
        }
    }

    pub(crate) fn sample_input() -> ScoringInput {
        let mut readings = BTreeMap::new();
        readings.insert(
            "rsi_14".to_string(),
            IndicatorReading {
                value: Some(25.0),
                components: BTreeMap::new(),
                state: "oversold".into(),
                signal: SignalTag::Bullish,
            },
        );
        readings.insert(
            "sma_50".to_string(),
            IndicatorReading {
                value: Some(95.0),
                components: BTreeMap::new(),
                state: "price_above".into(),
                signal: SignalTag::Bullish,
            },
        );
        readings.insert("adx_14".to_string(), IndicatorReading::undefined());

        let indicators = IndicatorSet {
            readings,
            levels: vec![98.0, 104.0],
            last_close: Some(100.0),
            realized_volatility: Some(0.20),
            trend: None,
            volume_state: None,
            bars_used: 120,
        };

        let profile = FundamentalProfile {
            pe_ratio: Some(12.0),
            roe: Some(18.0),
            debt_to_equity: Some(0.5),
            beta: Some(0.9),
            ..Default::default()
        };
        let normalizer = FundamentalsNormalizer::new(&EngineConfig::default());
        let fundamentals = normalizer.normalize(&profile, Market::US, None);

        let mut sentiment = empty_sentiment();
        sentiment.mean_polarity = 0.3;
        sentiment.sample_count = 6;
        sentiment.label = SentimentLabel::Positive;

        ScoringInput {
            instrument: InstrumentMeta::new("ACME", Market::US),
            indicators,
            profile,
            fundamentals,
            sentiment,
        }
    }

    #[test]
    fn test_composite_renormalizes_missing_views() {
        let s = scorer();
        let sub = SubScores { technical: Some(80.0), fundamental: None, sentiment: Some(40.0) };
        // 0.4 / 0.65 * 80 + 0.25 / 0.65 * 40
        let expected = (0.4 * 80.0 + 0.25 * 40.0) / 0.65;
        assert!((s.composite(&sub).unwrap() - expected).abs() < 1e-9);
        assert!(s.composite(&SubScores::default()).is_none());
    }

    #[test]
    fn test_zero_weight_on_only_view_still_scores() {
        let mut config = EngineConfig::default();
        config.score_weights.sentiment = 0.0;
        let s = RuleBasedScorer::new(&config);

        let only_sentiment = SubScores { technical: None, fundamental: None, sentiment: Some(65.0) };
        assert!((s.composite(&only_sentiment).unwrap() - 65.0).abs() < 1e-9);

        let mut input = sample_input();
        input.indicators = IndicatorSet::empty();
        input.fundamentals = FundamentalScores::default();
        let verdict = s.score_sync(&input).unwrap();
        assert!((verdict.composite_score - 65.0).abs() < 1e-9);

        // With other views present the zero weight still excludes sentiment
        let mixed = SubScores { technical: Some(80.0), fundamental: None, sentiment: Some(20.0) };
        assert!((s.composite(&mixed).unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_direction_thresholds() {
        let s = scorer();
        assert_eq!(s.direction(65.0), Direction::Buy);
        assert_eq!(s.direction(64.9), Direction::Hold);
        assert_eq!(s.direction(35.0), Direction::Sell);
    }

    #[test]
    fn test_agreement_beats_disagreement_at_same_composite() {
        let s = scorer();
        let agree = SubScores { technical: Some(70.0), fundamental: Some(70.0), sentiment: Some(70.0) };
        let disagree = SubScores { technical: Some(90.0), fundamental: Some(530.0 / 7.0), sentiment: Some(30.0) };

        let c1 = s.composite(&agree).unwrap();
        let c2 = s.composite(&disagree).unwrap();
        assert!((c1 - 70.0).abs() < 1e-9);
        assert!((c2 - 70.0).abs() < 1e-9);
        assert_eq!(s.direction(c1), Direction::Buy);
        assert_eq!(s.direction(c2), Direction::Buy);

        let conf_agree = s.confidence(&agree, c1, 1.0);
        let conf_disagree = s.confidence(&disagree, c2, 1.0);
        assert!(conf_agree > conf_disagree);
        assert!((0.0..=1.0).contains(&conf_agree));
    }

    #[test]
    fn test_confidence_scales_with_completeness() {
        let s = scorer();
        let sub = SubScores { technical: Some(70.0), fundamental: Some(70.0), sentiment: Some(70.0) };
        assert!(s.confidence(&sub, 70.0, 1.0) > s.confidence(&sub, 70.0, 0.3));
    }

    #[test]
    fn test_risk_tiers() {
        let s = scorer();
        assert_eq!(s.risk_tier(Some(0.15), Some(0.7)), RiskTier::Low);
        assert_eq!(s.risk_tier(Some(0.60), Some(1.6)), RiskTier::High);
        assert_eq!(s.risk_tier(Some(0.30), None), RiskTier::Medium);
        assert_eq!(s.risk_tier(None, None), RiskTier::Medium);
        // 0.7 * 0 + 0.3 * 2 rounds to 1
        assert_eq!(s.risk_tier(Some(0.10), Some(2.0)), RiskTier::Medium);
    }

    #[test]
    fn test_expected_move_is_capped() {
        let s = scorer();
        assert_eq!(s.expected_move(50.0, Some(0.3)), 0.0);
        assert_eq!(s.expected_move(100.0, Some(5.0)), 0.40);
        assert_eq!(s.expected_move(0.0, Some(5.0)), -0.40);
        assert!(s.expected_move(70.0, None) > 0.0);
    }

    #[test]
    fn test_verdict_shape() {
        let s = scorer();
        let verdict = s.score_sync(&sample_input()).unwrap();

        assert_eq!(verdict.instrument_id, "ACME.US");
        assert!((0.0..=1.0).contains(&verdict.confidence));
        assert!(verdict.composite_score > 50.0);
        assert_eq!(verdict.current_price, Some(100.0));
        let target = verdict.target_price.unwrap();
        assert!(target > 100.0 && target <= 140.0);
        assert!(verdict.entry_price_band.unwrap().is_ordered());
        assert!(verdict.exit_price_band.unwrap().is_ordered());
        assert!(verdict.stop_loss.unwrap() < verdict.entry_price_band.unwrap().low);
        assert_eq!(verdict.target_horizon, "3-6 months");
        assert_eq!(verdict.risk, RiskTier::Low);

        assert!(!verdict.rationale.is_empty());
        for pair in verdict.rationale.windows(2) {
            assert!(pair[0].weight.abs() >= pair[1].weight.abs());
        }
    }

    #[test]
    fn test_rationale_labels_are_readable() {
        let mut config = EngineConfig::default();
        config.scoring.max_rationale_factors = 100;
        let verdict = RuleBasedScorer::new(&config).score_sync(&sample_input()).unwrap();
        let labels: Vec<&str> = verdict.rationale.iter().map(|f| f.label.as_str()).collect();
        assert!(labels.contains(&"RSI(14) oversold"));
        assert!(labels.contains(&"SMA(50) price above"));
        assert!(labels.iter().any(|l| l.starts_with("News sentiment positive")));
        assert!(labels.iter().all(|l| !l.contains('_')));
    }

    #[test]
    fn test_narrative_fields() {
        let verdict = scorer().score_sync(&sample_input()).unwrap();

        let rr = verdict.risk_reward.unwrap();
        let (p, t, stop) = (100.0, verdict.target_price.unwrap(), verdict.stop_loss.unwrap());
        assert!((rr - (t - p) / (p - stop)).abs() < 1e-9);
        assert!(rr > 0.0);

        assert!(verdict.summary.starts_with("ACME.US: "));
        assert!(verdict.summary.contains("at $100.00 with"));
        assert!(verdict.summary.contains("risk-reward"));
        assert_eq!(verdict.opportunities[0], "Support near $98.00 frames the entry");
        assert!(verdict.opportunities.iter().any(|o| o.ends_with("supports the call")));
        assert!(verdict.risk_factors.iter().any(|r| r.contains("volatility of 20.0%")));
        assert!(verdict.risk_factors.len() <= 4 && verdict.opportunities.len() <= 4);
    }

    #[test]
    fn test_risk_reward() {
        assert_eq!(risk_reward(Some(100.0), Some(110.0), Some(95.0)), Some(2.0));
        // Short side: stop above, target below
        assert_eq!(risk_reward(Some(100.0), Some(90.0), Some(105.0)), Some(2.0));
        assert_eq!(risk_reward(Some(100.0), Some(110.0), Some(100.0)), None);
        assert_eq!(risk_reward(None, Some(110.0), Some(95.0)), None);
    }

    #[test]
    fn test_rationale_sums_to_composite_offset() {
        let mut config = EngineConfig::default();
        config.scoring.max_rationale_factors = 100;
        let s = RuleBasedScorer::new(&config);
        let input = sample_input();
        let verdict = s.score_sync(&input).unwrap();
        let total: f64 = verdict.rationale.iter().map(|f| f.weight).sum();
        assert!((total - (verdict.composite_score - 50.0)).abs() < 1e-6);
    }

    #[test]
    fn test_scoring_is_idempotent() {
        let s = scorer();
        let input = sample_input();
        assert_eq!(s.score_sync(&input).unwrap(), s.score_sync(&input).unwrap());
    }

    #[test]
    fn test_all_views_missing_is_insufficient_data() {
        let s = scorer();
        let input = ScoringInput {
            instrument: InstrumentMeta::new("EMPTY", Market::US),
            indicators: IndicatorSet::empty(),
            profile: FundamentalProfile::default(),
            fundamentals: FundamentalScores::default(),
            sentiment: empty_sentiment(),
        };
        assert!(matches!(s.score_sync(&input), Err(AnalysisError::InsufficientData(_))));
    }

    #[test]
    fn test_sell_stop_sits_above_price() {
        let s = scorer();
        let mut input = sample_input();
        for r in input.indicators.readings.values_mut() {
            if r.is_defined() {
                r.signal = SignalTag::Bearish;
            }
        }
        input.fundamentals = FundamentalScores::default();
        input.sentiment.mean_polarity = -0.8;
        let verdict = s.score_sync(&input).unwrap();
        assert_eq!(verdict.direction, Direction::Sell);
        assert!(verdict.stop_loss.unwrap() > 100.0);
        assert!(verdict.target_price.unwrap() < 100.0);
    }
}
