//! Word-list polarity scoring for news items that arrive unscored.

use std::collections::HashSet;
use std::sync::OnceLock;

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without",
];

const NEGATION_WINDOW: usize = 3;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "surge", "surges", "gain", "gains", "profit", "growth", "beat", "beats",
    "upgrade", "outperform", "strong", "positive", "rise", "rises", "increase",
    "breakthrough", "innovation", "success", "exceed", "exceeds", "momentum",
    "buy", "recommend", "optimistic", "record", "high", "advance",
    "dividend", "buyback", "repurchase", "accretive", "upside",
    "recovery", "rebound", "expansion", "robust", "accelerating",
    "overweight", "raised", "raises", "upgraded", "reiterated", "outpacing", "tailwind",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "declines", "loss", "losses", "fall", "falls", "plunge", "plunges", "crash", "miss", "misses",
    "downgrade", "underperform", "weak", "negative", "drop", "drops", "decrease",
    "concern", "concerns", "risk", "fail", "disappoint", "disappointing", "slump", "sell",
    "warning", "pessimistic", "low", "retreat", "fear", "fears", "trouble",
    "dilution", "dilutive", "headwind", "lawsuit", "litigation",
    "recall", "investigation", "subpoena", "default", "bankruptcy",
    "restructuring", "layoff", "layoffs", "downside", "overvalued", "bubble",
    "underweight", "lowered", "cuts", "suspended",
];

struct Lexicon {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

fn lexicon() -> &'static Lexicon {
    static LEXICON: OnceLock<Lexicon> = OnceLock::new();
    LEXICON.get_or_init(|| Lexicon {
        positive: POSITIVE_WORDS.iter().copied().collect(),
        negative: NEGATIVE_WORDS.iter().copied().collect(),
        negation: NEGATION_WORDS.iter().copied().collect(),
    })
}

/// Lowercased tokens with surrounding punctuation stripped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '.' || c == '!' || c == '?' || c == ':')
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Net opinion count of a text and how many opinion words it held.
fn raw_score(text: &str) -> (f64, usize, usize) {
    let lex = lexicon();
    let words = tokenize(text);

    let negation_positions: Vec<usize> = words
        .iter()
        .enumerate()
        .filter(|(_, w)| lex.negation.contains(w.as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut score = 0i32;
    let mut opinion_words = 0usize;
    for (i, word) in words.iter().enumerate() {
        let is_positive = lex.positive.contains(word.as_str());
        let is_negative = lex.negative.contains(word.as_str());
        if !is_positive && !is_negative {
            continue;
        }
        opinion_words += 1;

        let negated = negation_positions
            .iter()
            .any(|&neg_pos| neg_pos < i && (i - neg_pos) <= NEGATION_WINDOW);

        if is_positive {
            score += if negated { -1 } else { 1 };
        } else {
            score += if negated { 1 } else { -1 };
        }
    }
    (score as f64, opinion_words, words.len())
}

/// Polarity in [-1, 1] and subjectivity in [0, 1]. The headline counts double.
pub fn score_text(headline: &str, body: Option<&str>) -> (f64, f64) {
    let (h_score, h_opinion, h_words) = raw_score(headline);
    let (b_score, b_opinion, b_words) = body.map(raw_score).unwrap_or((0.0, 0, 0));

    let polarity = ((h_score * 2.0 + b_score) / 3.0).tanh();
    let words = (h_words + b_words).max(1);
    let subjectivity = ((h_opinion + b_opinion) as f64 / words as f64 * 5.0).min(1.0);
    (polarity, subjectivity)
}
