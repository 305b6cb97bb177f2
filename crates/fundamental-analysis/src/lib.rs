use analysis_core::{EngineConfig, FundamentalProfile, FundamentalScores, FundamentalWeights, Market};
use std::collections::BTreeMap;

/// Valuation bands for lower-is-better multiples: at or below `floor` scores
/// 100, at or above `ceiling` scores 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub floor: f64,
    pub ceiling: f64,
}

const fn band(floor: f64, ceiling: f64) -> Band {
    Band { floor, ceiling }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationNorms {
    pub pe: Band,
    pub pb: Band,
    pub ps: Band,
    pub peg: Band,
    pub ev_ebitda: Band,
}

const US_NORMS: ValuationNorms = ValuationNorms {
    pe: band(8.0, 40.0),
    pb: band(1.0, 8.0),
    ps: band(1.0, 12.0),
    peg: band(0.5, 3.0),
    ev_ebitda: band(6.0, 25.0),
};

/// Local valuation norms. Markets without their own P/B band use the US one.
pub fn valuation_norms(market: Market) -> ValuationNorms {
    match market {
        Market::US => US_NORMS,
        Market::JP => ValuationNorms { pe: band(8.0, 30.0), pb: band(0.6, 4.0), ..US_NORMS },
        Market::IN => ValuationNorms { pe: band(10.0, 50.0), pb: band(1.5, 10.0), ..US_NORMS },
        Market::CN => ValuationNorms { pe: band(8.0, 35.0), ..US_NORMS },
        Market::EU => ValuationNorms { pe: band(7.0, 30.0), pb: band(0.8, 5.0), ..US_NORMS },
        Market::HK => ValuationNorms {
            pe: band(5.0, 25.0),
            pb: band(0.5, 3.0),
            ev_ebitda: band(4.0, 18.0),
            ..US_NORMS
        },
        Market::CA => ValuationNorms { pe: band(8.0, 32.0), ..US_NORMS },
        Market::AU => ValuationNorms { pe: band(9.0, 35.0), ..US_NORMS },
    }
}

/// Growth sectors carry richer multiples; regulated sectors trade cheaper.
pub fn sector_multiplier(sector: Option<&str>) -> f64 {
    let Some(sector) = sector else { return 1.0 };
    let s = sector.to_lowercase();
    if s.contains("tech") || s.contains("software") || s.contains("semiconductor") {
        1.3
    } else if s.contains("utilit") || s.contains("financ") || s.contains("bank") {
        0.8
    } else {
        1.0
    }
}

/// Linear lower-is-better mapping. Non-positive multiples (losses, negative
/// book) score 0.
fn lower_is_better(value: f64, floor: f64, ceiling: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    if value <= floor {
        100.0
    } else if value >= ceiling {
        0.0
    } else {
        100.0 * (ceiling - value) / (ceiling - floor)
    }
}

/// Higher-is-better with diminishing returns, 0 at `zero_at`.
fn saturating(value: f64, zero_at: f64, scale: f64) -> f64 {
    if value <= zero_at {
        return 0.0;
    }
    100.0 * (1.0 - (-(value - zero_at) / scale).exp())
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Maps raw fundamental metrics onto 0-100 dimension scores.
pub struct FundamentalsNormalizer {
    weights: FundamentalWeights,
}

impl FundamentalsNormalizer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            weights: config.fundamental_weights,
        }
    }

    pub fn with_weights(weights: FundamentalWeights) -> Self {
        Self { weights }
    }

    /// Score one metric. `None` for metrics that are not scored (beta).
    pub fn score_metric(&self, name: &str, value: f64, market: Market, sector: Option<&str>) -> Option<f64> {
        let norms = valuation_norms(market);
        let mult = sector_multiplier(sector);
        let valuation = |b: Band| lower_is_better(value, b.floor, b.ceiling * mult);

        let score = match name {
            "pe_ratio" | "forward_pe" => valuation(norms.pe),
            "pb_ratio" => valuation(norms.pb),
            "ps_ratio" => valuation(norms.ps),
            "peg_ratio" => valuation(norms.peg),
            "ev_to_ebitda" => valuation(norms.ev_ebitda),
            "roe" => saturating(value, 0.0, 15.0),
            "roa" => saturating(value, 0.0, 6.0),
            "profit_margin" => saturating(value, 0.0, 12.0),
            "operating_margin" => saturating(value, 0.0, 15.0),
            "gross_margin" => saturating(value, 0.0, 35.0),
            "debt_to_equity" => {
                if value < 0.0 {
                    0.0
                } else {
                    lower_is_better(value.max(f64::MIN_POSITIVE), 0.3, 3.0)
                }
            }
            "current_ratio" => saturating(value, 0.5, 0.8),
            "quick_ratio" => saturating(value, 0.3, 0.7),
            "dividend_yield" => saturating(value, 0.0, 2.5),
            "payout_ratio" => lower_is_better(value.max(f64::MIN_POSITIVE), 30.0, 100.0),
            _ => return None,
        };
        Some(score.clamp(0.0, 100.0))
    }

    /// Missing metrics are excluded from every average; a dimension with no
    /// present metric is `None` and drops out of the overall score.
    pub fn normalize(&self, profile: &FundamentalProfile, market: Market, sector: Option<&str>) -> FundamentalScores {
        let mut metric_scores = BTreeMap::new();
        let mut missing_metrics = Vec::new();
        let metrics = profile.metrics();
        let total = metrics.len();

        for (name, value) in metrics {
            match value.filter(|v| v.is_finite()) {
                Some(v) => {
                    if let Some(score) = self.score_metric(name, v, market, sector) {
                        metric_scores.insert(name.to_string(), score);
                    }
                }
                None => missing_metrics.push(name.to_string()),
            }
        }

        let dimension = |names: &[&str]| {
            let present: Vec<f64> = names.iter().filter_map(|n| metric_scores.get(*n).copied()).collect();
            mean_of(&present)
        };

        let mut scores = FundamentalScores {
            valuation: dimension(&["pe_ratio", "forward_pe", "pb_ratio", "ps_ratio", "peg_ratio", "ev_to_ebitda"]),
            profitability: dimension(&["roe", "roa", "profit_margin", "operating_margin", "gross_margin"]),
            financial_health: dimension(&["debt_to_equity", "current_ratio", "quick_ratio"]),
            dividend_quality: dimension(&["dividend_yield", "payout_ratio"]),
            overall: None,
            coverage: metric_scores.len() as f64 / total as f64,
            metric_scores,
            missing_metrics,
        };
        scores.overall = self.overall(&scores);
        scores
    }

    fn dimension_weights(&self) -> [f64; 4] {
        let w = &self.weights;
        [w.valuation, w.profitability, w.financial_health, w.dividend_quality]
    }

    fn overall(&self, scores: &FundamentalScores) -> Option<f64> {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for ((_, score), w) in scores.dimensions().iter().zip(self.dimension_weights()) {
            if let Some(s) = score {
                weighted += s * w;
                total_weight += w;
            }
        }
        if total_weight > 0.0 {
            Some(weighted / total_weight)
        } else {
            None
        }
    }

    /// Each present dimension's pull on the overall score, in points around 50.
    /// The values sum to `overall - 50`.
    pub fn dimension_contributions(&self, scores: &FundamentalScores) -> Vec<(&'static str, f64)> {
        let present: Vec<(&'static str, f64, f64)> = scores
            .dimensions()
            .iter()
            .zip(self.dimension_weights())
            .filter_map(|((name, score), w)| score.map(|s| (*name, s, w)))
            .filter(|(_, _, w)| *w > 0.0)
            .collect();
        let total_weight: f64 = present.iter().map(|(_, _, w)| w).sum();
        if total_weight <= 0.0 {
            return vec![];
        }
        present
            .into_iter()
            .map(|(name, s, w)| (name, w * (s - 50.0) / total_weight))
            .collect()
    }
}
