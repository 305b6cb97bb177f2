use analysis_core::stats::{self, TRADING_DAYS};
use analysis_core::{
    AnalysisError, ComparisonResult, DateWindow, PairwiseDelta, PerformanceMetrics, PriceSeries, RankedInstrument,
    Verdict,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const MIN_COMPARE: usize = 2;
pub const MAX_COMPARE: usize = 3;
const MAX_REASONS: usize = 4;

/// Return/risk statistics from the valid closes of a series.
pub fn performance_metrics(series: &PriceSeries) -> PerformanceMetrics {
    let closes = series.closes();
    if closes.is_empty() {
        return PerformanceMetrics::default();
    }

    let total_return = match (closes.first(), closes.last()) {
        (Some(&first), Some(&last)) if closes.len() >= 2 && first > 0.0 => Some((last / first - 1.0) * 100.0),
        _ => None,
    };

    let returns = stats::simple_returns(&closes);
    let sharpe_ratio = if returns.len() >= 2 {
        let sd = stats::std_dev(&returns);
        (sd > 0.0).then(|| stats::mean(&returns) / sd)
    } else {
        None
    };
    let volatility = (returns.len() >= 2).then(|| stats::std_dev(&returns) * TRADING_DAYS.sqrt() * 100.0);

    let max_drawdown = if closes.len() >= 2 {
        stats::max_drawdown(&closes).map(|d| d * 100.0)
    } else {
        None
    };

    let low = closes.iter().copied().fold(f64::INFINITY, f64::min);
    let high = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let price_position = closes
        .last()
        .filter(|_| high - low > 0.0)
        .map(|last| (last - low) / (high - low) * 100.0);

    PerformanceMetrics {
        total_return,
        volatility,
        sharpe_ratio,
        max_drawdown,
        price_position,
    }
}

/// Composite desc, confidence desc, risk asc, then instrument id so the
/// order never depends on input order.
fn ranking_order(a: &Verdict, b: &Verdict) -> Ordering {
    b.composite_score
        .partial_cmp(&a.composite_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
        .then_with(|| a.risk.cmp(&b.risk))
        .then_with(|| a.instrument_id.cmp(&b.instrument_id))
}

fn metric_table(entry: &RankedInstrument) -> [(&'static str, Option<f64>); 7] {
    let m = &entry.metrics;
    [
        ("composite_score", Some(entry.composite_score)),
        ("confidence", Some(entry.verdict.confidence)),
        ("total_return", m.total_return),
        ("volatility", m.volatility),
        ("sharpe_ratio", m.sharpe_ratio),
        ("max_drawdown", m.max_drawdown),
        ("price_position", m.price_position),
    ]
}

fn delta(left: &RankedInstrument, right: &RankedInstrument) -> PairwiseDelta {
    let deltas: BTreeMap<String, Option<f64>> = metric_table(left)
        .into_iter()
        .zip(metric_table(right))
        .map(|((name, l), (_, r))| {
            let d = match (l, r) {
                (Some(l), Some(r)) => Some(l - r),
                _ => None,
            };
            (name.to_string(), d)
        })
        .collect();

    PairwiseDelta {
        left: left.instrument_id.clone(),
        right: right.instrument_id.clone(),
        deltas,
    }
}

/// Why the leader beat the field, strongest evidence first.
fn best_choice_reasons(ranked: &[RankedInstrument]) -> Vec<String> {
    let Some(best) = ranked.first() else {
        return vec![];
    };
    let m = &best.metrics;
    let mut reasons = vec![format!(
        "Highest composite score ({:.1}/100) with {:.0}% confidence",
        best.composite_score,
        best.verdict.confidence * 100.0
    )];

    match (m.total_return, m.sharpe_ratio) {
        (Some(r), _) if r > 0.0 => reasons.push(format!("Total return of {:.1}% over the period", r)),
        (_, Some(sharpe)) => reasons.push(format!("Sharpe ratio of {:.2}", sharpe)),
        _ => {}
    }
    if let Some(dd) = m.max_drawdown {
        reasons.push(format!("Maximum drawdown held to {:.1}%", dd.abs()));
    }

    if let Some(second) = ranked.get(1) {
        let n = &second.metrics;
        let outperformance = match (m.total_return, n.total_return) {
            (Some(a), Some(b)) if a > b => Some(a - b),
            _ => None,
        };
        let calmer = match (m.volatility, n.volatility) {
            (Some(a), Some(b)) if a < b => Some(b - a),
            _ => None,
        };
        if let Some(gap) = outperformance {
            reasons.push(format!("Outperformed {} by {:.1} points", second.instrument_id, gap));
        } else if let Some(gap) = calmer {
            reasons.push(format!("{:.1} points less volatile than {}", gap, second.instrument_id));
        } else if best.verdict.risk < second.verdict.risk {
            reasons.push(format!(
                "Lower risk tier than {} ({:?} vs {:?})",
                second.instrument_id, best.verdict.risk, second.verdict.risk
            ));
        }
    }

    reasons.truncate(MAX_REASONS);
    reasons
}

/// Ranks 2-3 analyzed instruments and reports pairwise metric deltas.
#[derive(Debug, Clone, Default)]
pub struct ComparisonRanker;

impl ComparisonRanker {
    pub fn new() -> Self {
        Self
    }

    /// Performance metrics cover only the bars inside `window` when one is
    /// given; verdicts are used as-is.
    pub fn rank(
        &self,
        entries: Vec<(Verdict, PriceSeries)>,
        window: Option<DateWindow>,
    ) -> Result<ComparisonResult, AnalysisError> {
        if !(MIN_COMPARE..=MAX_COMPARE).contains(&entries.len()) {
            return Err(AnalysisError::InvalidComparisonRequest(format!(
                "need {} to {} instruments, got {}",
                MIN_COMPARE,
                MAX_COMPARE,
                entries.len()
            )));
        }

        let mut scored: Vec<(Verdict, PerformanceMetrics)> = entries
            .into_iter()
            .map(|(verdict, series)| {
                let metrics = match window {
                    Some(w) => performance_metrics(&series.window(w.from, w.to)),
                    None => performance_metrics(&series),
                };
                (verdict, metrics)
            })
            .collect();
        scored.sort_by(|(a, _), (b, _)| ranking_order(a, b));

        let ranked: Vec<RankedInstrument> = scored
            .into_iter()
            .enumerate()
            .map(|(i, (verdict, metrics))| RankedInstrument {
                instrument_id: verdict.instrument_id.clone(),
                composite_score: verdict.composite_score,
                verdict,
                rank: i + 1,
                metrics,
            })
            .collect();

        let mut deltas = Vec::new();
        for i in 0..ranked.len() {
            for j in i + 1..ranked.len() {
                deltas.push(delta(&ranked[i], &ranked[j]));
            }
        }

        let best_choice = ranked
            .first()
            .map(|r| r.instrument_id.clone())
            .ok_or_else(|| AnalysisError::InvalidComparisonRequest("nothing to rank".to_string()))?;

        Ok(ComparisonResult {
            reasons: best_choice_reasons(&ranked),
            ranked,
            deltas,
            best_choice,
            window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, Direction, RiskTier, SubScores};
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        PriceSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1_000.0,
                })
                .collect(),
        )
    }

    fn verdict(id: &str, composite: f64, confidence: f64, risk: RiskTier) -> Verdict {
        Verdict {
            instrument_id: id.to_string(),
            direction: Direction::Buy,
            confidence,
            risk,
            composite_score: composite,
            sub_scores: SubScores::default(),
            current_price: Some(100.0),
            target_price: None,
            target_horizon: "3-6 months".to_string(),
            entry_price_band: None,
            exit_price_band: None,
            stop_loss: None,
            rationale: vec![],
            risk_reward: None,
            risk_factors: vec![],
            opportunities: vec![],
            summary: String::new(),
        }
    }

    #[test]
    fn test_performance_metrics() {
        let m = performance_metrics(&series(&[100.0, 110.0, 99.0, 105.0]));
        assert!((m.total_return.unwrap() - 5.0).abs() < 1e-9);
        assert!((m.max_drawdown.unwrap() - (-10.0)).abs() < 1e-9);
        assert!((m.price_position.unwrap() - (6.0 / 11.0 * 100.0)).abs() < 1e-9);
        assert!(m.volatility.unwrap() > 0.0);
        assert!(m.sharpe_ratio.is_some());
    }

    #[test]
    fn test_flat_series_has_no_sharpe_or_position() {
        let m = performance_metrics(&series(&[50.0; 10]));
        assert_eq!(m.total_return, Some(0.0));
        assert_eq!(m.sharpe_ratio, None);
        assert_eq!(m.price_position, None);
        assert_eq!(m.max_drawdown, Some(0.0));
    }

    #[test]
    fn test_empty_series_metrics() {
        assert_eq!(performance_metrics(&PriceSeries::default()), PerformanceMetrics::default());
    }

    #[test]
    fn test_ties_broken_by_risk_regardless_of_order() {
        let ranker = ComparisonRanker::new();
        let a = verdict("AAA.US", 80.0, 0.9, RiskTier::Low);
        let b = verdict("BBB.US", 80.0, 0.9, RiskTier::Medium);

        for entries in [
            vec![(a.clone(), series(&[1.0, 2.0])), (b.clone(), series(&[1.0, 2.0]))],
            vec![(b.clone(), series(&[1.0, 2.0])), (a.clone(), series(&[1.0, 2.0]))],
        ] {
            let result = ranker.rank(entries, None).unwrap();
            assert_eq!(result.best_choice, "AAA.US");
            assert_eq!(result.ranked[0].rank, 1);
            assert_eq!(result.ranked[1].instrument_id, "BBB.US");
            assert_eq!(result.ranked[1].rank, 2);
        }
    }

    #[test]
    fn test_ranks_by_composite_then_confidence() {
        let ranker = ComparisonRanker::new();
        let result = ranker
            .rank(vec![
                (verdict("LOW.US", 40.0, 0.9, RiskTier::Low), series(&[10.0, 11.0])),
                (verdict("TOP.US", 70.0, 0.5, RiskTier::High), series(&[10.0, 9.0])),
                (verdict("MID.US", 40.0, 0.95, RiskTier::High), series(&[10.0, 10.5])),
            ], None)
            .unwrap();

        let order: Vec<&str> = result.ranked.iter().map(|r| r.instrument_id.as_str()).collect();
        assert_eq!(order, vec!["TOP.US", "MID.US", "LOW.US"]);
        assert_eq!(result.deltas.len(), 3);

        let first = &result.deltas[0];
        assert_eq!(first.left, "TOP.US");
        assert_eq!(first.right, "MID.US");
        assert!((first.deltas["composite_score"].unwrap() - 30.0).abs() < 1e-9);
        assert!((first.deltas["total_return"].unwrap() - (-15.0)).abs() < 1e-9);
        // Two-bar series have a single return, so volatility is undefined on both sides
        assert_eq!(first.deltas["volatility"], None);
    }

    #[test]
    fn test_reasons_explain_the_leader() {
        let ranker = ComparisonRanker::new();
        let result = ranker
            .rank(
                vec![
                    (verdict("AAA.US", 72.0, 0.8, RiskTier::Low), series(&[100.0, 90.0, 120.0])),
                    (verdict("BBB.US", 60.0, 0.6, RiskTier::Low), series(&[100.0, 101.0, 105.0])),
                ],
                None,
            )
            .unwrap();

        assert_eq!(result.best_choice, "AAA.US");
        assert_eq!(
            result.reasons,
            vec![
                "Highest composite score (72.0/100) with 80% confidence".to_string(),
                "Total return of 20.0% over the period".to_string(),
                "Maximum drawdown held to 10.0%".to_string(),
                "Outperformed BBB.US by 15.0 points".to_string(),
            ]
        );
        assert_eq!(result.window, None);
    }

    #[test]
    fn test_window_limits_metrics() {
        let ranker = ComparisonRanker::new();
        // Falls 50% over the first five days, then climbs 10% over the last five
        let closes = [200.0, 180.0, 160.0, 140.0, 120.0, 100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let entries = || {
            vec![
                (verdict("AAA.US", 70.0, 0.8, RiskTier::Low), series(&closes)),
                (verdict("BBB.US", 60.0, 0.8, RiskTier::Low), series(&[10.0; 11])),
            ]
        };
        let full = ranker.rank(entries(), None).unwrap();
        assert!((full.ranked[0].metrics.total_return.unwrap() - (-45.0)).abs() < 1e-9);

        let end = Utc.with_ymd_and_hms(2024, 1, 12, 0, 0, 0).unwrap();
        let window = DateWindow::trailing(end, 5);
        let recent = ranker.rank(entries(), Some(window)).unwrap();
        let metrics = &recent.ranked[0].metrics;
        assert!((metrics.total_return.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(metrics.max_drawdown, Some(0.0));
        assert_eq!(recent.window, Some(window));
        // Ranking still follows the verdicts
        assert_eq!(recent.best_choice, "AAA.US");
    }

    #[test]
    fn test_rejects_wrong_counts() {
        let ranker = ComparisonRanker::new();
        let one = vec![(verdict("A.US", 50.0, 0.5, RiskTier::Low), series(&[1.0, 2.0]))];
        assert!(matches!(
            ranker.rank(one, None),
            Err(AnalysisError::InvalidComparisonRequest(_))
        ));

        let four: Vec<_> = ["A.US", "B.US", "C.US", "D.US"]
            .iter()
            .map(|id| (verdict(id, 50.0, 0.5, RiskTier::Low), series(&[1.0, 2.0])))
            .collect();
        assert!(matches!(
            ranker.rank(four, None),
            Err(AnalysisError::InvalidComparisonRequest(_))
        ));
    }
}
