//! Keyword and meta-description extraction from captions.
//!
//! Keywords are frequency-ranked words from the caption with stop words
//! removed and a small marketing vocabulary boosted. Ties keep the order in
//! which words first appear, so the output is fully deterministic.
//!
//! If the configured token pattern cannot be used, extraction falls back to a
//! simpler path: built-in tokenization, a reduced stop list, no boosting and a
//! 15-word meta description.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SeoConfig;
use crate::error::PipelineError;
use crate::math::cosine_similarity;
use crate::models::TextEmbedder;

const STOP_WORDS: &[&str] = &[
    "with", "this", "that", "there", "their", "about", "would", "could", "should", "which", "what",
    "when", "where", "who", "whom", "have", "has", "had", "been", "being", "will", "shall", "may",
    "might", "must", "can", "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for",
    "of", "by", "as", "is", "are", "was",
];

const FALLBACK_STOP_WORDS: &[&str] = &[
    "with", "this", "that", "there", "their", "about", "would", "could",
];

const BOOST_WORDS: &[&str] = &[
    "professional",
    "quality",
    "high",
    "best",
    "premium",
    "luxury",
    "modern",
    "contemporary",
    "beautiful",
    "stunning",
    "amazing",
    "excellent",
    "perfect",
    "ideal",
    "ultimate",
    "complete",
];

const FALLBACK_WORD_LIMIT: usize = 15;
const ELLIPSIS: &str = "...";

static BUILTIN_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z]{4,}\b").expect("invalid token regex"));

/// Keywords and meta description derived from one caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub keywords: Vec<String>,
    pub meta_description: String,
    /// Cosine similarity between caption and meta description embeddings,
    /// when a similarity model is loaded
    pub relevance: Option<f32>,
    /// Whether the reduced fallback path produced this result
    pub fallback: bool,
}

/// Derives [`SeoMetadata`] from captions.
#[derive(Clone)]
pub struct SeoExtractor {
    config: SeoConfig,
    token_pattern: Result<Regex, String>,
    stop_words: HashSet<String>,
    boost_words: HashSet<String>,
    similarity: Option<Arc<dyn TextEmbedder>>,
}

impl SeoExtractor {
    pub fn new(config: SeoConfig, similarity: Option<Arc<dyn TextEmbedder>>) -> Self {
        let token_pattern = Regex::new(&config.token_pattern).map_err(|e| e.to_string());
        if let Err(e) = &token_pattern {
            tracing::warn!("SEO token pattern is invalid, fallback extraction will be used: {e}");
        }

        let stop_words = STOP_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(config.extra_stop_words.iter().map(|w| w.to_lowercase()))
            .collect();
        let boost_words = BOOST_WORDS
            .iter()
            .map(|w| w.to_string())
            .chain(config.extra_boost_words.iter().map(|w| w.to_lowercase()))
            .collect();

        Self {
            config,
            token_pattern,
            stop_words,
            boost_words,
            similarity,
        }
    }

    /// Configured keyword count.
    pub fn max_keywords(&self) -> usize {
        self.config.max_keywords
    }

    /// Extract up to `max_keywords` keywords and a meta description. Never fails.
    pub fn extract(&self, caption: &str, max_keywords: usize) -> SeoMetadata {
        let (keywords, meta_description, fallback) = match self.primary(caption, max_keywords) {
            Ok((keywords, meta)) => (keywords, meta, false),
            Err(e) => {
                tracing::error!("SEO metadata generation error: {e}");
                let (keywords, meta) = fallback(caption, max_keywords, self.config.meta_max_chars);
                (keywords, meta, true)
            }
        };
        tracing::debug!("SEO keywords: {keywords:?}");

        let relevance = self.relevance(caption, &meta_description);
        SeoMetadata {
            keywords,
            meta_description,
            relevance,
            fallback,
        }
    }

    fn primary(
        &self,
        caption: &str,
        max_keywords: usize,
    ) -> Result<(Vec<String>, String), PipelineError> {
        let pattern = self
            .token_pattern
            .as_ref()
            .map_err(|e| PipelineError::Seo {
                message: format!("invalid token pattern: {e}"),
            })?;

        let lowered = caption.to_lowercase();
        let words = pattern
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| !self.stop_words.contains(*w));

        let mut counts = count_in_order(words);
        for (word, score) in counts.iter_mut() {
            if self.boost_words.contains(word.as_str()) {
                *score *= self.config.boost_factor;
            }
        }

        let keywords = top_keywords(counts, max_keywords);
        let meta = cap_chars(
            meta_description(caption, self.config.meta_word_limit),
            self.config.meta_max_chars,
        );
        Ok((keywords, meta))
    }

    fn relevance(&self, caption: &str, meta: &str) -> Option<f32> {
        let embedder = self.similarity.as_ref()?;
        if caption.trim().is_empty() || meta.trim().is_empty() {
            return None;
        }
        let embed = |text: &str| {
            embedder
                .embed(text)
                .map_err(|e| tracing::warn!("SEO relevance scoring failed: {e}"))
                .ok()
        };
        Some(cosine_similarity(&embed(caption)?, &embed(meta)?))
    }
}

/// Reduced extraction used when the primary path cannot run.
fn fallback(caption: &str, max_keywords: usize, max_chars: usize) -> (Vec<String>, String) {
    let lowered = caption.to_lowercase();
    let words = BUILTIN_TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| !FALLBACK_STOP_WORDS.contains(w));
    let keywords = top_keywords(count_in_order(words), max_keywords);

    let words: Vec<&str> = caption.split_whitespace().collect();
    let meta = if words.len() > FALLBACK_WORD_LIMIT {
        format!("{}{ELLIPSIS}", words[..FALLBACK_WORD_LIMIT].join(" "))
    } else {
        caption.to_string()
    };
    (keywords, cap_chars(meta, max_chars))
}

/// Word frequencies in first-encounter order.
fn count_in_order<'a>(words: impl Iterator<Item = &'a str>) -> Vec<(String, f64)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, f64)> = Vec::new();
    for word in words {
        match index.get(word) {
            Some(&i) => counts[i].1 += 1.0,
            None => {
                index.insert(word, counts.len());
                counts.push((word.to_string(), 1.0));
            }
        }
    }
    counts
}

/// Highest scores first; the sort is stable so ties keep first-encounter order.
fn top_keywords(mut counts: Vec<(String, f64)>, max_keywords: usize) -> Vec<String> {
    counts.sort_by(|a, b| b.1.total_cmp(&a.1));
    counts
        .into_iter()
        .take(max_keywords)
        .map(|(word, _)| word)
        .collect()
}

fn meta_description(caption: &str, word_limit: usize) -> String {
    let words: Vec<&str> = caption.split_whitespace().collect();
    if words.len() <= word_limit {
        return caption.to_string();
    }
    let truncated = words[..word_limit].join(" ");
    match truncated.rfind('.') {
        Some(pos) => truncated[..=pos].to_string(),
        None => format!("{truncated}{ELLIPSIS}"),
    }
}

/// Cap to `max_chars` characters, ending in "..." when cut.
fn cap_chars(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut capped: String = text.chars().take(keep).collect();
    capped.push_str(ELLIPSIS);
    capped
}
