use serde::{Deserialize, Serialize};

use crate::lexicon::tokenize;

/// Keyword cluster a news item is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsTheme {
    Earnings,
    MergersAcquisitions,
    Regulatory,
    AnalystAction,
    Management,
    Product,
    Legal,
    Macro,
    Growth,
    Decline,
    Market,
}

impl NewsTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsTheme::Earnings => "earnings",
            NewsTheme::MergersAcquisitions => "mergers_acquisitions",
            NewsTheme::Regulatory => "regulatory",
            NewsTheme::AnalystAction => "analyst_action",
            NewsTheme::Management => "management",
            NewsTheme::Product => "product",
            NewsTheme::Legal => "legal",
            NewsTheme::Macro => "macro",
            NewsTheme::Growth => "growth",
            NewsTheme::Decline => "decline",
            NewsTheme::Market => "market",
        }
    }
}

/// One keyword matched against whole tokens. `word*` matches any token
/// starting with `word`; a bare word also matches its plural. Multi-word
/// keywords must appear as consecutive tokens.
fn keyword_matches(tokens: &[String], keyword: &str) -> bool {
    let parts: Vec<&str> = keyword.split_whitespace().collect();
    if parts.is_empty() || parts.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(parts.len())
        .any(|window| window.iter().zip(&parts).all(|(token, part)| token_matches(token, part)))
}

fn token_matches(token: &str, part: &str) -> bool {
    match part.strip_suffix('*') {
        Some(prefix) => token.starts_with(prefix),
        None => {
            token == part
                || token.strip_suffix('s').is_some_and(|t| t == part)
                || token.strip_suffix("es").is_some_and(|t| t == part)
        }
    }
}

/// First matching cluster wins; event types are checked before the generic
/// growth/decline clusters.
pub fn classify(headline: &str, body: Option<&str>) -> NewsTheme {
    let tokens = tokenize(&format!("{} {}", headline, body.unwrap_or("")));
    let has = |keyword: &str| keyword_matches(&tokens, keyword);
    let any = |keywords: &[&str]| keywords.iter().any(|k| has(k));

    if any(&["earnings", "quarterly", "guidance", "eps"])
        || has("revenue*") && any(&["beat*", "miss*", "report*"])
        || has("profit*") && has("quarter*")
    {
        NewsTheme::Earnings
    } else if any(&["acqui*", "merger*", "buyout*", "takeover*", "spinoff*", "spin-off*"]) {
        NewsTheme::MergersAcquisitions
    } else if any(&["fda", "sec", "regulat*", "approval*", "antitrust", "compliance"]) {
        NewsTheme::Regulatory
    } else if any(&["upgrade*", "downgrade*", "price target*", "initiat*", "analyst*", "rating*"]) {
        NewsTheme::AnalystAction
    } else if any(&["ceo", "cfo", "board", "executive*", "resign*", "appoint*"]) {
        NewsTheme::Management
    } else if any(&["launch*", "product*", "recall*", "patent*", "innovation*"]) {
        NewsTheme::Product
    } else if any(&["lawsuit*", "litigation", "settlement*", "sued", "sue", "court*", "indictment*"]) {
        NewsTheme::Legal
    } else if any(&["fed", "federal reserve", "interest rate*", "inflation", "gdp", "unemployment"]) {
        NewsTheme::Macro
    } else if any(&["growth", "expan*", "surge*", "record*", "rally", "rallies", "gain*"]) {
        NewsTheme::Growth
    } else if any(&["decline*", "fall*", "fell", "drop*", "slump*", "plunge*", "loss*"]) {
        NewsTheme::Decline
    } else {
        NewsTheme::Market
    }
}
