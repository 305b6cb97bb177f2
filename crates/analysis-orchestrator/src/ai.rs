use analysis_core::{AnalysisError, Direction, Factor, PriceBand, RiskTier, Verdict};
use async_trait::async_trait;
use ml_client::{AdvisorRequest, AdvisorResponse, MLError, ReasoningService, ScoreSnapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::scoring::{narrative, risk_reward, RuleBasedScorer, ScoringInput, ScoringStrategy};

/// Asks an external reasoning service for the verdict and falls back to the
/// rule-based scorer on any failure.
pub struct AiAssistedScorer {
    service: Arc<dyn ReasoningService>,
    fallback: RuleBasedScorer,
    timeout: Duration,
    model: Option<String>,
}

impl AiAssistedScorer {
    pub fn new(service: Arc<dyn ReasoningService>, fallback: RuleBasedScorer, timeout: Duration) -> Self {
        Self {
            service,
            fallback,
            timeout,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    fn build_request(&self, input: &ScoringInput, baseline: &Verdict) -> AdvisorRequest {
        let indicators: BTreeMap<String, Option<f64>> = input
            .indicators
            .readings
            .iter()
            .map(|(name, r)| (name.clone(), r.value))
            .collect();
        let fundamentals: BTreeMap<String, f64> = input
            .profile
            .metrics()
            .into_iter()
            .filter_map(|(name, v)| v.map(|v| (name.to_string(), v)))
            .collect();

        AdvisorRequest {
            model: self.model.clone(),
            instrument_id: baseline.instrument_id.clone(),
            market: input.instrument.market.to_string(),
            currency: input.instrument.market.currency_code().to_string(),
            current_price: baseline.current_price,
            scores: ScoreSnapshot {
                technical: baseline.sub_scores.technical,
                fundamental: baseline.sub_scores.fundamental,
                sentiment: baseline.sub_scores.sentiment,
            },
            indicators,
            fundamentals,
            sentiment_label: format!("{:?}", input.sentiment.label),
            sentiment_mean: input.sentiment.mean_polarity,
            themes: input.sentiment.top_themes.iter().map(|t| t.theme.clone()).collect(),
            realized_volatility: input.indicators.realized_volatility,
            prompt: build_prompt(input, baseline),
        }
    }

    async fn ask(&self, request: &AdvisorRequest) -> Result<AdvisorResponse, MLError> {
        match tokio::time::timeout(self.timeout, self.service.advise(request)).await {
            Ok(result) => result,
            Err(_) => Err(MLError::Timeout),
        }
    }
}

/// Plain-text brief for the reasoning service. Prices are shown in the
/// instrument's local currency.
pub fn build_prompt(input: &ScoringInput, baseline: &Verdict) -> String {
    let market = input.instrument.market;
    let fmt_score = |s: Option<f64>| s.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "n/a".to_string());
    let price = baseline
        .current_price
        .map(|p| market.format_price(p))
        .unwrap_or_else(|| "n/a".to_string());

    let mut lines = vec![
        format!(
            "Instrument {} ({}) listed in {} trading in {}.",
            baseline.instrument_id,
            input.instrument.name.as_deref().unwrap_or("unnamed"),
            market,
            market.currency_code()
        ),
        format!("Current price: {}.", price),
        format!(
            "Scores (0-100): technical {}, fundamental {}, sentiment {}.",
            fmt_score(baseline.sub_scores.technical),
            fmt_score(baseline.sub_scores.fundamental),
            fmt_score(baseline.sub_scores.sentiment)
        ),
    ];
    if let Some(trend) = input.indicators.trend {
        lines.push(format!("Trend: {}.", trend.label()));
    }
    if let Some(vol) = input.indicators.realized_volatility {
        lines.push(format!("Annualized volatility: {:.1}%.", vol * 100.0));
    }
    for (name, reading) in &input.indicators.readings {
        if let Some(v) = reading.value {
            lines.push(format!("- {}: {:.2} ({})", name, v, reading.state));
        }
    }
    if !input.indicators.levels.is_empty() {
        let levels: Vec<String> = input.indicators.levels.iter().map(|l| market.format_price(*l)).collect();
        lines.push(format!("Support/resistance: {}.", levels.join(", ")));
    }
    lines.push(format!(
        "News: {:?} (mean polarity {:.2}, {} items). {}",
        input.sentiment.label,
        input.sentiment.mean_polarity,
        input.sentiment.sample_count,
        input.sentiment.trading_implication
    ));
    lines.push(
        "Respond with JSON only: {\"direction\": \"BUY|SELL|HOLD\", \"confidence\": 0-1, \
         \"risk\": \"LOW|MEDIUM|HIGH\", \"composite_score\": 0-100, \"target_price\": number, \
         \"target_horizon\": string, \"entry_price_band\": {\"low\", \"high\"}, \
         \"exit_price_band\": {\"low\", \"high\"}, \"stop_loss\": number, \
         \"rationale\": [{\"label\": string, \"weight\": number}], \"risk_reward\": number, \
         \"risk_factors\": [string], \"opportunities\": [string], \"summary\": string}"
            .to_string(),
    );
    lines.join("\n")
}

/// Maps a validated service answer onto the Verdict shape. Fields the
/// service left out are taken from the rule-based baseline so both paths
/// produce equally complete verdicts.
fn merge_response(response: AdvisorResponse, baseline: Verdict, input: &ScoringInput) -> Result<Verdict, MLError> {
    let direction = Direction::parse(&response.direction)
        .ok_or_else(|| MLError::InvalidResponse(format!("unknown direction '{}'", response.direction)))?;
    let risk = RiskTier::parse(&response.risk)
        .ok_or_else(|| MLError::InvalidResponse(format!("unknown risk '{}'", response.risk)))?;

    let band = |b: Option<ml_client::AdvisorBand>| b.map(|b| PriceBand { low: b.low, high: b.high });
    let rationale: Vec<Factor> = if response.rationale.is_empty() {
        baseline.rationale
    } else {
        response
            .rationale
            .into_iter()
            .map(|f| Factor {
                label: f.label,
                weight: f.weight,
            })
            .collect()
    };

    let non_empty = |items: Vec<String>, fallback: Vec<String>| {
        let items: Vec<String> = items.into_iter().filter(|s| !s.trim().is_empty()).collect();
        if items.is_empty() {
            fallback
        } else {
            items
        }
    };
    let summary = response.summary.filter(|s| !s.trim().is_empty());

    let mut verdict = Verdict {
        instrument_id: baseline.instrument_id,
        direction,
        confidence: response.confidence,
        risk,
        composite_score: response.composite_score.unwrap_or(baseline.composite_score),
        sub_scores: baseline.sub_scores,
        current_price: baseline.current_price,
        target_price: response.target_price.or(baseline.target_price),
        target_horizon: response.target_horizon.unwrap_or(baseline.target_horizon),
        entry_price_band: band(response.entry_price_band).or(baseline.entry_price_band),
        exit_price_band: band(response.exit_price_band).or(baseline.exit_price_band),
        stop_loss: response.stop_loss.or(baseline.stop_loss),
        rationale,
        risk_reward: None,
        risk_factors: non_empty(response.risk_factors, baseline.risk_factors),
        opportunities: non_empty(response.opportunities, baseline.opportunities),
        summary: String::new(),
    };
    verdict.risk_reward = response
        .risk_reward
        .or_else(|| risk_reward(verdict.current_price, verdict.target_price, verdict.stop_loss));
    verdict.summary = match summary {
        Some(s) => s,
        None => narrative(&verdict, input.instrument.market, input.indicators.trend),
    };
    Ok(verdict)
}

#[async_trait]
impl ScoringStrategy for AiAssistedScorer {
    fn name(&self) -> &'static str {
        "ai_assisted"
    }

    async fn score(&self, input: &ScoringInput) -> Result<Verdict, AnalysisError> {
        // Rule-based verdict doubles as the fallback and as the source of
        // sub-scores for the prompt. Insufficient data is not a service
        // failure and propagates as-is.
        let baseline = self.fallback.score_sync(input)?;
        let request = self.build_request(input, &baseline);

        let outcome = match self.ask(&request).await {
            Ok(response) => merge_response(response, baseline.clone(), input),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(verdict) => {
                tracing::info!(
                    instrument = %verdict.instrument_id,
                    backend = self.service.backend_name(),
                    "AI-assisted verdict: {:?} ({:.2})",
                    verdict.direction,
                    verdict.confidence
                );
                Ok(verdict)
            }
            Err(e) => {
                let failure = AnalysisError::ExternalServiceFailure(e.to_string());
                tracing::warn!(
                    instrument = %baseline.instrument_id,
                    "{}; falling back to rule-based verdict",
                    failure
                );
                Ok(baseline)
            }
        }
    }
}
