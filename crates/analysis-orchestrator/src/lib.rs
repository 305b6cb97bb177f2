use analysis_core::{
    AnalysisError, EngineConfig, FundamentalProfile, FundamentalScores, FundamentalsProvider, IndicatorSet,
    InstrumentMeta, NewsItem, NewsProvider, PriceHistoryProvider, PriceSeries, SentimentSummary, Verdict,
    ComparisonResult, DateWindow,
};
use chrono::{DateTime, Utc};
use fundamental_analysis::FundamentalsNormalizer;
use futures_util::future::join_all;
use sentiment_analysis::SentimentAggregator;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use technical_analysis::IndicatorEngine;

pub mod ai;
pub mod comparison;
pub mod scoring;

pub use ai::AiAssistedScorer;
pub use comparison::{performance_metrics, ComparisonRanker, MAX_COMPARE, MIN_COMPARE};
pub use scoring::{RuleBasedScorer, ScoringInput, ScoringStrategy};

/// Full per-instrument output: the three views plus the verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentAnalysis {
    pub instrument: InstrumentMeta,
    pub indicators: IndicatorSet,
    pub fundamentals: FundamentalScores,
    pub sentiment: SentimentSummary,
    pub verdict: Verdict,
    #[serde(skip)]
    pub series: PriceSeries,
}

/// Runs the indicator, fundamentals and sentiment views for an instrument
/// and hands them to the configured scoring strategy.
pub struct AnalysisOrchestrator {
    config: EngineConfig,
    prices: Arc<dyn PriceHistoryProvider>,
    fundamentals: Arc<dyn FundamentalsProvider>,
    news: Vec<Arc<dyn NewsProvider>>,
    indicator_engine: IndicatorEngine,
    normalizer: FundamentalsNormalizer,
    aggregator: SentimentAggregator,
    strategy: Arc<dyn ScoringStrategy>,
    ranker: ComparisonRanker,
    /// Fixed "now" for recency decay; wall clock when unset.
    as_of: Option<DateTime<Utc>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        config: EngineConfig,
        prices: Arc<dyn PriceHistoryProvider>,
        fundamentals: Arc<dyn FundamentalsProvider>,
    ) -> Self {
        Self {
            indicator_engine: IndicatorEngine::new(&config),
            normalizer: FundamentalsNormalizer::new(&config),
            aggregator: SentimentAggregator::new(&config),
            strategy: Arc::new(RuleBasedScorer::new(&config)),
            ranker: ComparisonRanker::new(),
            news: Vec::new(),
            as_of: None,
            prices,
            fundamentals,
            config,
        }
    }

    pub fn with_news_provider(mut self, provider: Arc<dyn NewsProvider>) -> Self {
        self.news.push(provider);
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    async fn fetch_series(&self, instrument: &InstrumentMeta) -> PriceSeries {
        match self.prices.price_history(instrument).await {
            Ok(series) => {
                tracing::debug!(provider = self.prices.name(), bars = series.len(), "Fetched price history");
                series
            }
            Err(e) => {
                tracing::warn!("Price history unavailable for {}: {}", instrument.instrument_id(), e);
                PriceSeries::default()
            }
        }
    }

    async fn fetch_profile(&self, instrument: &InstrumentMeta) -> FundamentalProfile {
        match self.fundamentals.fundamentals(instrument).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Fundamentals unavailable for {}: {}", instrument.instrument_id(), e);
                FundamentalProfile::default()
            }
        }
    }

    /// Merges every news provider; a failing provider contributes nothing.
    async fn fetch_news(&self, instrument: &InstrumentMeta) -> Vec<NewsItem> {
        let results = join_all(self.news.iter().map(|p| async move { (p.name().to_string(), p.news(instrument).await) })).await;

        let mut merged = Vec::new();
        for (name, result) in results {
            match result {
                Ok(items) => {
                    tracing::debug!(provider = %name, items = items.len(), "Fetched news");
                    merged.extend(items);
                }
                Err(e) => tracing::warn!(provider = %name, "News provider failed for {}: {}", instrument.instrument_id(), e),
            }
        }
        merged
    }

    /// Full pipeline for one instrument.
    pub async fn analyze(&self, instrument: &InstrumentMeta) -> Result<InstrumentAnalysis, AnalysisError> {
        if instrument.symbol.trim().is_empty() {
            return Err(AnalysisError::InvalidRequest("instrument symbol is empty".to_string()));
        }
        let id = instrument.instrument_id();
        let now = self.as_of.unwrap_or_else(Utc::now);
        tracing::info!("Starting analysis for {} ({})", id, self.strategy.name());

        // The three views are independent of each other
        let ((series, indicators), (profile, fundamentals), sentiment) = tokio::join!(
            async {
                let series = self.fetch_series(instrument).await;
                let indicators = self.indicator_engine.compute(&series);
                (series, indicators)
            },
            async {
                let profile = self.fetch_profile(instrument).await;
                let scores = self.normalizer.normalize(&profile, instrument.market, instrument.sector.as_deref());
                (profile, scores)
            },
            async {
                let items = self.fetch_news(instrument).await;
                self.aggregator.aggregate(&items, now)
            },
        );

        if !indicators.has_data() {
            tracing::warn!("No usable price history for {} ({} bars)", id, series.len());
        }
        tracing::info!(
            "Views for {}: {}/{} indicators, fundamentals coverage {:.0}%, {} news samples",
            id,
            indicators.defined_count(),
            indicators.readings.len(),
            fundamentals.coverage * 100.0,
            sentiment.sample_count
        );

        let input = ScoringInput {
            instrument: instrument.clone(),
            indicators,
            profile,
            fundamentals,
            sentiment,
        };
        let verdict = self.strategy.score(&input).await?;
        tracing::info!(
            "Verdict for {}: {:?} composite {:.1} confidence {:.2} risk {:?}",
            id,
            verdict.direction,
            verdict.composite_score,
            verdict.confidence,
            verdict.risk
        );

        Ok(InstrumentAnalysis {
            instrument: input.instrument,
            indicators: input.indicators,
            fundamentals: input.fundamentals,
            sentiment: input.sentiment,
            verdict,
            series,
        })
    }

    /// Analyzes 2-3 instruments concurrently and ranks them. Instruments
    /// that cannot be scored are dropped; fewer than two survivors is an
    /// invalid comparison.
    ///
    /// With `lookback_days`, performance metrics cover only the trailing
    /// days ending at the reference time, or at the latest bar when no
    /// reference time is set. Verdicts always use the full history.
    pub async fn compare(
        &self,
        instruments: &[InstrumentMeta],
        lookback_days: Option<u32>,
    ) -> Result<ComparisonResult, AnalysisError> {
        if !(MIN_COMPARE..=MAX_COMPARE).contains(&instruments.len()) {
            return Err(AnalysisError::InvalidComparisonRequest(format!(
                "need {} to {} instruments, got {}",
                MIN_COMPARE,
                MAX_COMPARE,
                instruments.len()
            )));
        }
        let mut seen = HashSet::new();
        for instrument in instruments {
            if instrument.symbol.trim().is_empty() {
                return Err(AnalysisError::InvalidComparisonRequest("instrument symbol is empty".to_string()));
            }
            if !seen.insert(instrument.instrument_id()) {
                return Err(AnalysisError::InvalidComparisonRequest(format!(
                    "{} listed more than once",
                    instrument.instrument_id()
                )));
            }
        }

        let results = join_all(instruments.iter().map(|i| self.analyze(i))).await;

        let mut entries = Vec::with_capacity(results.len());
        for (instrument, result) in instruments.iter().zip(results) {
            match result {
                Ok(analysis) => entries.push((analysis.verdict, analysis.series)),
                Err(e) => tracing::warn!("Dropping {} from comparison: {}", instrument.instrument_id(), e),
            }
        }
        if entries.len() < MIN_COMPARE {
            return Err(AnalysisError::InvalidComparisonRequest(format!(
                "only {} of {} instruments could be scored",
                entries.len(),
                instruments.len()
            )));
        }

        let window = lookback_days.and_then(|days| {
            let end = self.as_of.or_else(|| {
                entries
                    .iter()
                    .filter_map(|(_, series)| series.bars.last().map(|b| b.timestamp))
                    .max()
            })?;
            Some(DateWindow::trailing(end, days))
        });
        if let Some(w) = window {
            tracing::debug!("Comparison window {} to {}", w.from, w.to);
        }

        let result = self.ranker.rank(entries, window)?;
        tracing::info!("Comparison best choice: {}", result.best_choice);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, Market, SentimentLabel};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn trending_series(start_price: f64, daily: f64, days: usize) -> PriceSeries {
        let start = as_of() - Duration::days(days as i64);
        PriceSeries::new(
            (0..days)
                .map(|i| {
                    let close = start_price * (1.0 + daily).powi(i as i32) + if i % 2 == 0 { 0.3 } else { -0.3 };
                    Bar {
                        timestamp: start + Duration::days(i as i64),
                        open: close,
                        high: close + 1.0,
                        low: close - 1.0,
                        close,
                        volume: 1_000_000.0,
                    }
                })
                .collect(),
        )
    }

    #[derive(Default)]
    struct MemoryPrices(HashMap<String, PriceSeries>);

    #[async_trait]
    impl PriceHistoryProvider for MemoryPrices {
        fn name(&self) -> &str {
            "memory"
        }

        async fn price_history(&self, instrument: &InstrumentMeta) -> Result<PriceSeries, AnalysisError> {
            self.0
                .get(&instrument.instrument_id())
                .cloned()
                .ok_or_else(|| AnalysisError::DataUnavailable(instrument.instrument_id()))
        }
    }

    #[derive(Default)]
    struct MemoryFundamentals(HashMap<String, FundamentalProfile>);

    #[async_trait]
    impl FundamentalsProvider for MemoryFundamentals {
        fn name(&self) -> &str {
            "memory"
        }

        async fn fundamentals(&self, instrument: &InstrumentMeta) -> Result<FundamentalProfile, AnalysisError> {
            self.0
                .get(&instrument.instrument_id())
                .cloned()
                .ok_or_else(|| AnalysisError::DataUnavailable(instrument.instrument_id()))
        }
    }

    struct FixedNews(Vec<NewsItem>);

    #[async_trait]
    impl NewsProvider for FixedNews {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn news(&self, _instrument: &InstrumentMeta) -> Result<Vec<NewsItem>, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenNews;

    #[async_trait]
    impl NewsProvider for BrokenNews {
        fn name(&self) -> &str {
            "broken"
        }

        async fn news(&self, _instrument: &InstrumentMeta) -> Result<Vec<NewsItem>, AnalysisError> {
            Err(AnalysisError::ExternalServiceFailure("feed offline".into()))
        }
    }

    fn news(source: &str, headline: &str, hours_ago: i64, polarity: f64) -> NewsItem {
        NewsItem {
            source: source.to_string(),
            headline: headline.to_string(),
            body: None,
            published_at: as_of() - Duration::hours(hours_ago),
            polarity: Some(polarity),
            subjectivity: Some(0.5),
        }
    }

    fn orchestrator() -> AnalysisOrchestrator {
        let mut prices = MemoryPrices::default();
        prices.0.insert("UP.US".into(), trending_series(50.0, 0.01, 120));
        prices.0.insert("DOWN.US".into(), trending_series(200.0, -0.01, 120));
        prices.0.insert("7203.JP".into(), trending_series(2500.0, 0.002, 120));

        let mut fundamentals = MemoryFundamentals::default();
        fundamentals.0.insert(
            "UP.US".into(),
            FundamentalProfile {
                pe_ratio: Some(14.0),
                roe: Some(22.0),
                debt_to_equity: Some(0.4),
                ..Default::default()
            },
        );

        AnalysisOrchestrator::new(EngineConfig::default(), Arc::new(prices), Arc::new(fundamentals))
            .with_news_provider(Arc::new(FixedNews(vec![
                news("Reuters", "Acme beats earnings estimates on record growth", 2, 0.8),
                news("Bloomberg", "Analysts upgrade Acme after strong quarter", 5, 0.6),
                news("WSJ", "Acme expands product line into Asia", 10, 0.4),
            ])))
            .with_news_provider(Arc::new(BrokenNews))
            .with_as_of(as_of())
    }

    #[tokio::test]
    async fn test_analyze_merges_views() {
        let orch = orchestrator();
        let analysis = orch.analyze(&InstrumentMeta::new("UP", Market::US)).await.unwrap();

        assert_eq!(analysis.verdict.instrument_id, "UP.US");
        assert!(analysis.indicators.has_data());
        assert!(analysis.fundamentals.overall.is_some());
        // The broken provider is tolerated
        assert_eq!(analysis.sentiment.sample_count, 3);
        assert_eq!(analysis.sentiment.label, SentimentLabel::Positive);
        assert_eq!(analysis.verdict.sub_scores.present(), 3);
        assert!(analysis.verdict.target_price.is_some());
    }

    #[tokio::test]
    async fn test_analysis_serializes_without_series() {
        let orch = orchestrator();
        let analysis = orch.analyze(&InstrumentMeta::new("7203", Market::JP)).await.unwrap();
        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("series").is_none());
        assert_eq!(json["verdict"]["instrument_id"], "7203.JP");
        assert!(json["verdict"]["direction"].is_string());
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent() {
        let orch = orchestrator();
        let meta = InstrumentMeta::new("UP", Market::US);
        let first = orch.analyze(&meta).await.unwrap();
        let second = orch.analyze(&meta).await.unwrap();
        assert_eq!(first.verdict, second.verdict);
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_symbol() {
        let orch = orchestrator();
        let err = orch.analyze(&InstrumentMeta::new("  ", Market::US)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_analyze_without_any_data_is_insufficient() {
        let orch = AnalysisOrchestrator::new(
            EngineConfig::default(),
            Arc::new(MemoryPrices::default()),
            Arc::new(MemoryFundamentals::default()),
        )
        .with_as_of(as_of());
        let err = orch.analyze(&InstrumentMeta::new("GHOST", Market::EU)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_compare_ranks_independently_of_order() {
        let orch = orchestrator();
        let up = InstrumentMeta::new("UP", Market::US);
        let down = InstrumentMeta::new("DOWN", Market::US);

        let forward = orch.compare(&[up.clone(), down.clone()], None).await.unwrap();
        let reverse = orch.compare(&[down, up], None).await.unwrap();

        assert_eq!(forward.best_choice, reverse.best_choice);
        assert_eq!(forward.ranked.len(), 2);
        assert_eq!(forward.deltas.len(), 1);
        let ids: Vec<_> = forward.ranked.iter().map(|r| r.instrument_id.clone()).collect();
        let rev_ids: Vec<_> = reverse.ranked.iter().map(|r| r.instrument_id.clone()).collect();
        assert_eq!(ids, rev_ids);
    }

    #[tokio::test]
    async fn test_compare_window_trims_metrics_not_verdicts() {
        let orch = orchestrator();
        let pair = [InstrumentMeta::new("UP", Market::US), InstrumentMeta::new("DOWN", Market::US)];

        let full = orch.compare(&pair, None).await.unwrap();
        let recent = orch.compare(&pair, Some(10)).await.unwrap();

        assert_eq!(full.window, None);
        assert_eq!(recent.window, Some(DateWindow::trailing(as_of(), 10)));
        assert_eq!(full.best_choice, recent.best_choice);

        let up = |r: &ComparisonResult| {
            r.ranked
                .iter()
                .find(|e| e.instrument_id == "UP.US")
                .and_then(|e| e.metrics.total_return)
                .unwrap()
        };
        // 1% a day compounds to well over 100% across 120 days but stays
        // near 10% across the last ten
        assert!(up(&full) > 100.0);
        assert!(up(&recent) > 0.0 && up(&recent) < 15.0);
        let up_entry = |r: &ComparisonResult| r.ranked.iter().find(|e| e.instrument_id == "UP.US").cloned().unwrap();
        assert_eq!(up_entry(&full).verdict, up_entry(&recent).verdict);
    }

    #[tokio::test]
    async fn test_compare_request_validation() {
        let orch = orchestrator();
        let up = InstrumentMeta::new("UP", Market::US);

        let single = orch.compare(&[up.clone()], None).await;
        assert!(matches!(single, Err(AnalysisError::InvalidComparisonRequest(_))));

        let four = vec![
            up.clone(),
            InstrumentMeta::new("DOWN", Market::US),
            InstrumentMeta::new("7203", Market::JP),
            InstrumentMeta::new("X", Market::US),
        ];
        assert!(matches!(
            orch.compare(&four, None).await,
            Err(AnalysisError::InvalidComparisonRequest(_))
        ));

        let dup = orch.compare(&[up.clone(), InstrumentMeta::new("up", Market::US)], None).await;
        assert!(matches!(dup, Err(AnalysisError::InvalidComparisonRequest(_))));
    }

    #[tokio::test]
    async fn test_compare_drops_unscorable_instrument() {
        let orch = AnalysisOrchestrator::new(
            EngineConfig::default(),
            Arc::new({
                let mut p = MemoryPrices::default();
                p.0.insert("UP.US".into(), trending_series(50.0, 0.01, 120));
                p.0.insert("DOWN.US".into(), trending_series(200.0, -0.01, 120));
                p
            }),
            Arc::new(MemoryFundamentals::default()),
        )
        .with_as_of(as_of());

        let result = orch
            .compare(&[
                InstrumentMeta::new("UP", Market::US),
                InstrumentMeta::new("DOWN", Market::US),
                InstrumentMeta::new("GHOST", Market::US),
            ], None)
            .await
            .unwrap();
        assert_eq!(result.ranked.len(), 2);

        let too_few = orch
            .compare(&[InstrumentMeta::new("UP", Market::US), InstrumentMeta::new("GHOST", Market::US)], None)
            .await;
        assert!(matches!(too_few, Err(AnalysisError::InvalidComparisonRequest(_))));
    }
}
