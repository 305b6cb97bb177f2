use analysis_core::{
    EngineConfig, NewsItem, SentimentConfig, SentimentDistribution, SentimentLabel, SentimentSample,
    SentimentSummary, ThemeCount,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

pub mod lexicon;
pub mod themes;

pub use themes::{classify, NewsTheme};

/// Turns raw news items into a deduplicated, recency-weighted sentiment view.
pub struct SentimentAggregator {
    config: SentimentConfig,
    half_life_hours: f64,
}

impl SentimentAggregator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.sentiment.clone(),
            half_life_hours: config.recency_decay_half_life_hours,
        }
    }

    /// Weight of a sample `age_hours` old. Full weight inside the recency
    /// window, then a linear fall that reaches 0.5 one half-life later and
    /// stops at the floor.
    pub fn decay_weight(&self, age_hours: f64) -> f64 {
        let window = self.config.recency_window_hours;
        if age_hours <= window {
            return 1.0;
        }
        let decayed = 1.0 - 0.5 * (age_hours - window) / self.half_life_hours;
        decayed.max(self.config.decay_floor)
    }

    /// Drops near-identical headlines, keeping the newest copy. Stories from
    /// one source merge at a lower overlap than syndicated copies across sources.
    pub fn deduplicate<'a>(&self, items: &'a [NewsItem]) -> Vec<&'a NewsItem> {
        let mut ordered: Vec<&NewsItem> = items.iter().filter(|i| !i.headline.trim().is_empty()).collect();
        ordered.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.headline.cmp(&b.headline))
        });

        let mut kept: Vec<(&NewsItem, HashSet<String>)> = Vec::new();
        for item in ordered {
            let words: HashSet<String> = lexicon::tokenize(&item.headline).into_iter().collect();
            let duplicate = kept.iter().any(|(other, other_words)| {
                let overlap = headline_overlap(&words, other_words);
                if other.source.eq_ignore_ascii_case(&item.source) {
                    overlap > self.config.same_source_similarity
                } else {
                    overlap > self.config.cross_source_similarity
                }
            });
            if !duplicate {
                kept.push((item, words));
            }
        }
        kept.into_iter().map(|(item, _)| item).collect()
    }

    fn to_sample(&self, item: &NewsItem) -> SentimentSample {
        let (lex_polarity, lex_subjectivity) = lexicon::score_text(&item.headline, item.body.as_deref());
        let polarity = item.polarity.filter(|p| p.is_finite()).unwrap_or(lex_polarity);
        let subjectivity = item.subjectivity.filter(|s| s.is_finite()).unwrap_or(lex_subjectivity);

        SentimentSample {
            source: item.source.clone(),
            headline: item.headline.clone(),
            published_at: item.published_at,
            polarity: polarity.clamp(-1.0, 1.0),
            subjectivity: subjectivity.clamp(0.0, 1.0),
            extracted_theme: classify(&item.headline, item.body.as_deref()).as_str().to_string(),
        }
    }

    /// Aggregate news as of `now`. Passing the clock in keeps the result a
    /// pure function of its inputs.
    pub fn aggregate(&self, items: &[NewsItem], now: DateTime<Utc>) -> SentimentSummary {
        let blank_skipped = items.iter().filter(|i| i.headline.trim().is_empty()).count();
        let unique = self.deduplicate(items);
        let duplicates_removed = items.len() - blank_skipped - unique.len();
        if duplicates_removed > 0 {
            tracing::debug!(removed = duplicates_removed, kept = unique.len(), "Deduplicated news items");
        }

        let samples: Vec<SentimentSample> = unique.into_iter().map(|i| self.to_sample(i)).collect();

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        let mut distribution = SentimentDistribution::default();
        for s in &samples {
            let age_hours = (now - s.published_at).num_minutes() as f64 / 60.0;
            let w = self.decay_weight(age_hours);
            weighted += s.polarity * w;
            total_weight += w;

            if s.polarity > self.config.positive_threshold {
                distribution.positive += 1;
            } else if s.polarity < self.config.negative_threshold {
                distribution.negative += 1;
            } else {
                distribution.neutral += 1;
            }
        }

        let mean_polarity = if total_weight > 0.0 { weighted / total_weight } else { 0.0 };
        let magnitude = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.polarity.abs()).sum::<f64>() / samples.len() as f64
        };

        let label = if mean_polarity > self.config.positive_threshold {
            SentimentLabel::Positive
        } else if mean_polarity < self.config.negative_threshold {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        let top_themes = rank_themes(&samples, self.config.max_themes);
        let dominant = top_themes.first().map(|t| t.theme.as_str());
        let trading_implication = trading_implication(label, samples.len(), dominant, self.config.min_samples);

        SentimentSummary {
            mean_polarity,
            magnitude,
            distribution,
            top_themes,
            label,
            trading_implication,
            sample_count: samples.len(),
            duplicates_removed,
            blank_skipped,
            samples,
        }
    }
}

/// Shared words over the larger word set.
fn headline_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / larger as f64
}

/// Themes by count, ties broken by the more recent average publication time.
fn rank_themes(samples: &[SentimentSample], max_themes: usize) -> Vec<ThemeCount> {
    let mut groups: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
    for s in samples {
        groups.entry(s.extracted_theme.as_str()).or_default().push(s.published_at.timestamp());
    }

    let mut themes: Vec<ThemeCount> = groups
        .into_iter()
        .filter_map(|(theme, stamps)| {
            let avg = stamps.iter().sum::<i64>() / stamps.len() as i64;
            Some(ThemeCount {
                theme: theme.to_string(),
                count: stamps.len(),
                average_published_at: DateTime::from_timestamp(avg, 0)?,
            })
        })
        .collect();

    themes.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.average_published_at.cmp(&a.average_published_at))
            .then_with(|| a.theme.cmp(&b.theme))
    });
    themes.truncate(max_themes);
    themes
}

/// One-line reading of the sentiment, keyed by label, coverage and the
/// dominant theme.
pub fn trading_implication(label: SentimentLabel, sample_count: usize, theme: Option<&str>, min_samples: usize) -> String {
    if sample_count == 0 {
        return "No recent news coverage; sentiment does not inform this view.".to_string();
    }
    if sample_count < min_samples {
        let tone = match label {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        };
        return format!("Limited news coverage; treat the {} tone as low conviction.", tone);
    }

    let text = match (label, theme.unwrap_or("market")) {
        (SentimentLabel::Positive, "earnings") => "Positive earnings coverage supports upside momentum.",
        (SentimentLabel::Positive, "analyst_action") => "Analyst actions lean supportive; watch for follow-through buying.",
        (SentimentLabel::Positive, "mergers_acquisitions") => "Deal-related optimism may lift the price near term.",
        (SentimentLabel::Positive, "product") => "Product news is well received; momentum may build.",
        (SentimentLabel::Positive, _) => "Broadly positive news flow supports a constructive bias.",
        (SentimentLabel::Negative, "earnings") => "Negative earnings coverage raises downside risk into the next report.",
        (SentimentLabel::Negative, "legal") | (SentimentLabel::Negative, "regulatory") => {
            "Legal or regulatory headlines add event risk; size positions cautiously."
        }
        (SentimentLabel::Negative, "analyst_action") => "Analyst downgrades weigh on the stock; wait for stabilization.",
        (SentimentLabel::Negative, _) => "Negative news flow argues for caution on new long positions.",
        (SentimentLabel::Neutral, _) => "Mixed or neutral news flow; rely on technical and fundamental signals.",
    };
    text.to_string()
}

/// 0-100 sentiment view; `None` without samples.
pub fn sentiment_score(summary: &SentimentSummary) -> Option<f64> {
    if !summary.has_data() {
        return None;
    }
    Some((50.0 + 50.0 * summary.mean_polarity).clamp(0.0, 100.0))
}
