pub mod advisor;
pub mod error;

pub use advisor::{
    parse_advisor_payload, AdvisorBand, AdvisorFactor, AdvisorRequest, AdvisorResponse, HttpReasoningService,
    ReasoningService, ScoreSnapshot,
};
pub use error::{MLError, MLResult};

use std::time::Duration;

/// Configuration for the AI reasoning service
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// Base URL; `None` disables the AI-assisted path.
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout: Duration,
}

impl AdvisorConfig {
    pub fn from_env(timeout: Duration) -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            url: non_empty("AI_ADVISOR_URL"),
            api_key: non_empty("AI_ADVISOR_API_KEY"),
            model: non_empty("AI_ADVISOR_MODEL"),
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}
