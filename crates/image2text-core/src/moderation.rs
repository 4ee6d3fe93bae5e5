//! Pattern-based toxicity scoring for generated captions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ModerationConfig;

/// Score added per matched term.
const MATCH_WEIGHT: f64 = 0.15;
/// Totals strictly above this get the multi-term penalty.
const PENALTY_THRESHOLD: f64 = 0.3;
/// One-time penalty for multiple toxic terms.
const PENALTY: f64 = 0.2;

/// A family of toxic terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToxicCategory {
    ViolenceHate,
    DeathSelfHarm,
    Discrimination,
    Explicit,
}

static PATTERNS: Lazy<[(ToxicCategory, Regex); 4]> = Lazy::new(|| {
    let family = |pattern: &str| Regex::new(pattern).expect("invalid moderation regex");
    [
        (
            ToxicCategory::ViolenceHate,
            family(r"\b(hate|violence|kill|attack|terror|abuse|hurt|harm)\b"),
        ),
        (
            ToxicCategory::DeathSelfHarm,
            family(r"\b(die|death|dead|murder|suicide)\b"),
        ),
        (
            ToxicCategory::Discrimination,
            family(r"\b(racist|sexist|homophobic|transphobic)\b"),
        ),
        (
            ToxicCategory::Explicit,
            family(r"\b(nude|naked|porn|sexual|xxx)\b"),
        ),
    ]
});

/// Toxicity assessment of one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    /// Score in [0, 1]
    pub toxicity_score: f32,
    /// Total matched terms across all families
    pub matches: usize,
    /// Matched-term counts for the families that matched, in family order
    pub categories: Vec<(ToxicCategory, usize)>,
    pub flagged: bool,
}

/// Scores text against the fixed toxic-term families.
#[derive(Debug, Clone, Default)]
pub struct ContentModerator {
    config: ModerationConfig,
}

impl ContentModerator {
    pub fn new(config: ModerationConfig) -> Self {
        Self { config }
    }

    pub fn moderate(&self, text: &str) -> ModerationVerdict {
        let lowered = text.to_lowercase();

        let categories: Vec<(ToxicCategory, usize)> = PATTERNS
            .iter()
            .map(|(category, re)| (*category, re.find_iter(&lowered).count()))
            .filter(|(_, count)| *count > 0)
            .collect();
        let matches: usize = categories.iter().map(|(_, c)| c).sum();

        // Accumulate per family, the same way the total is built up term by term.
        let mut score = categories
            .iter()
            .fold(0.0f64, |acc, (_, count)| acc + *count as f64 * MATCH_WEIGHT);
        if score > PENALTY_THRESHOLD {
            score += PENALTY;
        }
        let toxicity_score = score.min(1.0) as f32;
        let flagged = toxicity_score > self.config.flag_threshold;

        tracing::debug!("Toxicity score: {toxicity_score} ({matches} matches)");
        if flagged {
            tracing::warn!("Caption flagged as potentially toxic ({toxicity_score:.2})");
        }

        ModerationVerdict {
            toxicity_score,
            matches,
            categories,
            flagged,
        }
    }
}
