//! JSON market snapshot: bars, fundamentals and news for a handful of
//! instruments, served through the provider traits.

use analysis_core::{
    AnalysisError, Bar, FundamentalProfile, FundamentalsProvider, InstrumentMeta, Market, NewsItem, NewsProvider,
    PriceHistoryProvider, PriceSeries,
};
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentData {
    #[serde(flatten)]
    pub meta: InstrumentMeta,
    #[serde(default)]
    pub bars: Vec<Bar>,
    #[serde(default)]
    pub fundamentals: FundamentalProfile,
    #[serde(default)]
    pub news: Vec<NewsItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Reference time for news recency; wall clock when absent.
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    pub instruments: Vec<InstrumentData>,
}

impl Snapshot {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing snapshot {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(raw)?;
        Ok(snapshot)
    }

    fn find(&self, instrument: &InstrumentMeta) -> Option<&InstrumentData> {
        let id = instrument.instrument_id();
        self.instruments.iter().find(|d| d.meta.instrument_id() == id)
    }

    /// Resolves `SYMBOL` or `SYMBOL.MARKET` against the snapshot. A bare
    /// symbol must be unambiguous.
    pub fn resolve(&self, arg: &str) -> anyhow::Result<InstrumentMeta> {
        let arg = arg.trim();
        if arg.is_empty() {
            bail!("empty instrument symbol");
        }

        if let Some((symbol, market)) = arg.rsplit_once('.') {
            if let Some(market) = Market::parse(market) {
                let wanted = InstrumentMeta::new(symbol, market);
                return match self.find(&wanted) {
                    Some(data) => Ok(data.meta.clone()),
                    None => Ok(wanted),
                };
            }
        }

        let matches: Vec<&InstrumentData> = self
            .instruments
            .iter()
            .filter(|d| d.meta.symbol.eq_ignore_ascii_case(arg))
            .collect();
        match matches.as_slice() {
            [] => Ok(InstrumentMeta::new(arg, Market::default())),
            [one] => Ok(one.meta.clone()),
            many => bail!(
                "{} is listed in {} markets; use SYMBOL.MARKET",
                arg,
                many.len()
            ),
        }
    }
}

#[async_trait]
impl PriceHistoryProvider for Snapshot {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn price_history(&self, instrument: &InstrumentMeta) -> Result<PriceSeries, AnalysisError> {
        self.find(instrument)
            .map(|d| PriceSeries::new(d.bars.clone()))
            .ok_or_else(|| AnalysisError::DataUnavailable(format!("no bars for {}", instrument.instrument_id())))
    }
}

#[async_trait]
impl FundamentalsProvider for Snapshot {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn fundamentals(&self, instrument: &InstrumentMeta) -> Result<FundamentalProfile, AnalysisError> {
        self.find(instrument)
            .map(|d| d.fundamentals.clone())
            .ok_or_else(|| {
                AnalysisError::DataUnavailable(format!("no fundamentals for {}", instrument.instrument_id()))
            })
    }
}

#[async_trait]
impl NewsProvider for Snapshot {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn news(&self, instrument: &InstrumentMeta) -> Result<Vec<NewsItem>, AnalysisError> {
        Ok(self.find(instrument).map(|d| d.news.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "as_of": "2024-06-01T00:00:00Z",
        "instruments": [
            {
                "symbol": "7203",
                "market": "JP",
                "name": "Toyota Motor",
                "sector": "Automotive",
                "bars": [
                    {"timestamp": "2024-05-30T00:00:00Z", "open": 3400, "high": 3450, "low": 3380, "close": 3420, "volume": 1200000},
                    {"timestamp": "2024-05-29T00:00:00Z", "open": 3390, "high": 3420, "low": 3370, "close": 3400, "volume": 1100000}
                ],
                "fundamentals": {"pe_ratio": 9.5, "roe": 12.0},
                "news": [
                    {"source": "Nikkei", "headline": "Toyota raises guidance", "published_at": "2024-05-31T08:00:00Z"}
                ]
            },
            {"symbol": "SAP", "market": "EU"},
            {"symbol": "SAP", "market": "US"}
        ]
    }"#;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = Snapshot::parse(SAMPLE).unwrap();
        assert_eq!(snapshot.instruments.len(), 3);
        let toyota = &snapshot.instruments[0];
        assert_eq!(toyota.meta.market, Market::JP);
        assert_eq!(toyota.meta.sector.as_deref(), Some("Automotive"));
        assert_eq!(toyota.fundamentals.pe_ratio, Some(9.5));
        assert_eq!(toyota.news[0].polarity, None);
        assert!(snapshot.instruments[1].bars.is_empty());
    }

    #[test]
    fn test_resolve() {
        let snapshot = Snapshot::parse(SAMPLE).unwrap();
        let toyota = snapshot.resolve("7203").unwrap();
        assert_eq!(toyota.instrument_id(), "7203.JP");
        assert_eq!(toyota.name.as_deref(), Some("Toyota Motor"));

        assert_eq!(snapshot.resolve("sap.eu").unwrap().instrument_id(), "SAP.EU");
        assert!(snapshot.resolve("SAP").is_err());
        assert!(snapshot.resolve(" ").is_err());
        // Unknown symbols fall through to the providers, which report no data
        assert_eq!(snapshot.resolve("MSFT").unwrap().instrument_id(), "MSFT.US");
    }

    #[tokio::test]
    async fn test_providers_sort_bars_and_report_missing() {
        let snapshot = Snapshot::parse(SAMPLE).unwrap();
        let toyota = snapshot.resolve("7203.JP").unwrap();

        let series = snapshot.price_history(&toyota).await.unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last_close(), Some(3420.0));

        let missing = InstrumentMeta::new("NOPE", Market::US);
        assert!(matches!(
            snapshot.price_history(&missing).await,
            Err(AnalysisError::DataUnavailable(_))
        ));
        assert!(snapshot.news(&missing).await.unwrap().is_empty());
    }
}
