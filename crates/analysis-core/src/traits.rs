use async_trait::async_trait;
use crate::{AnalysisError, FundamentalProfile, InstrumentMeta, NewsItem, PriceSeries};

/// Source of historical OHLCV bars
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn price_history(&self, instrument: &InstrumentMeta) -> Result<PriceSeries, AnalysisError>;
}

/// Source of raw fundamental metrics
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fundamentals(&self, instrument: &InstrumentMeta) -> Result<FundamentalProfile, AnalysisError>;
}

/// Source of news items for an instrument
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn news(&self, instrument: &InstrumentMeta) -> Result<Vec<NewsItem>, AnalysisError>;
}
