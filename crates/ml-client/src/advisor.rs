use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{MLError, MLResult};
use crate::AdvisorConfig;

/// Sub-scores as sent to the reasoning service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub technical: Option<f64>,
    pub fundamental: Option<f64>,
    pub sentiment: Option<f64>,
}

/// Structured summary of one instrument handed to the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRequest {
    pub model: Option<String>,
    pub instrument_id: String,
    pub market: String,
    pub currency: String,
    pub current_price: Option<f64>,
    pub scores: ScoreSnapshot,
    pub indicators: BTreeMap<String, Option<f64>>,
    pub fundamentals: BTreeMap<String, f64>,
    pub sentiment_label: String,
    pub sentiment_mean: f64,
    pub themes: Vec<String>,
    pub realized_volatility: Option<f64>,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvisorBand {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorFactor {
    pub label: String,
    pub weight: f64,
}

/// Verdict-shaped answer from the reasoning service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorResponse {
    pub direction: String,
    pub confidence: f64,
    pub risk: String,
    #[serde(default)]
    pub composite_score: Option<f64>,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub target_horizon: Option<String>,
    #[serde(default)]
    pub entry_price_band: Option<AdvisorBand>,
    #[serde(default)]
    pub exit_price_band: Option<AdvisorBand>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub rationale: Vec<AdvisorFactor>,
    #[serde(default)]
    pub risk_reward: Option<f64>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl AdvisorResponse {
    /// Range checks on a parsed answer. Anything outside the contract is
    /// rejected rather than clamped.
    pub fn validate(&self) -> MLResult<()> {
        let invalid = |msg: String| Err(MLError::InvalidResponse(msg));

        if !matches!(
            self.direction.trim().to_lowercase().as_str(),
            "buy" | "sell" | "hold" | "strong buy" | "strong sell" | "strong_buy" | "strong_sell"
        ) {
            return invalid(format!("unknown direction '{}'", self.direction));
        }
        if !matches!(self.risk.trim().to_lowercase().as_str(), "low" | "medium" | "moderate" | "high") {
            return invalid(format!("unknown risk '{}'", self.risk));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return invalid(format!("confidence {} outside [0, 1]", self.confidence));
        }
        if let Some(score) = self.composite_score {
            if !score.is_finite() || !(0.0..=100.0).contains(&score) {
                return invalid(format!("composite score {} outside [0, 100]", score));
            }
        }
        for (name, price) in [("target_price", self.target_price), ("stop_loss", self.stop_loss)] {
            if let Some(p) = price {
                if !p.is_finite() || p <= 0.0 {
                    return invalid(format!("{} must be positive, got {}", name, p));
                }
            }
        }
        for (name, band) in [("entry_price_band", self.entry_price_band), ("exit_price_band", self.exit_price_band)] {
            if let Some(b) = band {
                if !(b.low.is_finite() && b.high.is_finite() && b.low > 0.0 && b.low <= b.high) {
                    return invalid(format!("{} is not an ordered positive range", name));
                }
            }
        }
        if let Some(rr) = self.risk_reward.filter(|rr| !rr.is_finite()) {
            return invalid(format!("risk-reward {} is not finite", rr));
        }
        if self.rationale.iter().any(|f| !f.weight.is_finite()) {
            return invalid("rationale weight is not finite".to_string());
        }
        Ok(())
    }
}

/// Strips a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag, whether on its own line or glued to the body
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses a service payload into a validated response. Accepts the bare
/// JSON object, a fenced block, or an envelope whose `output`/`text` field
/// holds either of those.
pub fn parse_advisor_payload(payload: &str) -> MLResult<AdvisorResponse> {
    let cleaned = strip_code_fences(payload);
    let value: serde_json::Value = serde_json::from_str(cleaned)?;

    let value = match value.get("output").or_else(|| value.get("text")).and_then(|v| v.as_str()) {
        Some(inner) => serde_json::from_str(strip_code_fences(inner))?,
        None => value,
    };

    let response: AdvisorResponse = serde_json::from_value(value)?;
    response.validate()?;
    Ok(response)
}

/// External reasoning service producing Verdict-shaped answers
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn advise(&self, request: &AdvisorRequest) -> MLResult<AdvisorResponse>;

    fn backend_name(&self) -> &'static str;
}

/// HTTP reasoning service client
#[derive(Clone)]
pub struct HttpReasoningService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl HttpReasoningService {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: None,
        })
    }

    pub fn from_config(config: &AdvisorConfig) -> MLResult<Self> {
        let url = config.url.clone().ok_or(MLError::NotConfigured)?;
        let mut service = Self::new(url, config.timeout)?;
        service.api_key = config.api_key.clone();
        service.model = config.model.clone();
        Ok(service)
    }
}

#[async_trait]
impl ReasoningService for HttpReasoningService {
    async fn advise(&self, request: &AdvisorRequest) -> MLResult<AdvisorResponse> {
        let mut request = request.clone();
        if request.model.is_none() {
            request.model = self.model.clone();
        }

        let mut builder = self.client.post(format!("{}/advise", self.base_url)).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                MLError::Timeout
            } else {
                MLError::RequestFailed(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(MLError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        tracing::debug!(bytes = body.len(), instrument = %request.instrument_id, "Reasoning service replied");
        parse_advisor_payload(&body)
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
