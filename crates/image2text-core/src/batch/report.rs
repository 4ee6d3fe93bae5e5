//! Per-image records and the aggregated batch report.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Report columns, in output order.
pub const COLUMNS: [&str; 6] = [
    "File",
    "Caption",
    "Keywords",
    "Meta Description",
    "NSFW Score",
    "Status",
];

/// Caption text recorded for images stopped by the safety gate.
pub const BLOCKED_CAPTION: &str = "[BLOCKED] NSFW content detected";

/// NSFW score cell when the check did not run.
pub const SCORE_NOT_AVAILABLE: &str = "N/A";

/// Outcome of processing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Success,
    BlockedNsfw,
    Error(String),
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::BlockedNsfw => f.write_str("Blocked - NSFW"),
            Self::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "Success" => Ok(Self::Success),
            "Blocked - NSFW" => Ok(Self::BlockedNsfw),
            other => other
                .strip_prefix("Error: ")
                .map(|message| Self::Error(message.to_string()))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown status {other:?}"))),
        }
    }
}

/// One row of the batch report. Built through the constructors and read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemRecord {
    #[serde(rename = "File")]
    file: String,
    #[serde(rename = "Caption")]
    caption: String,
    #[serde(rename = "Keywords")]
    keywords: String,
    #[serde(rename = "Meta Description")]
    meta_description: String,
    #[serde(rename = "NSFW Score")]
    nsfw_score: String,
    #[serde(rename = "Status")]
    status: ItemStatus,
}

impl BatchItemRecord {
    /// A processed image. `nsfw_score` is `None` when the check was disabled.
    pub fn success(
        file: impl Into<String>,
        caption: impl Into<String>,
        keywords: &[String],
        meta_description: impl Into<String>,
        nsfw_score: Option<f32>,
    ) -> Self {
        Self {
            file: file.into(),
            caption: caption.into(),
            keywords: keywords.join(", "),
            meta_description: meta_description.into(),
            nsfw_score: format_score(nsfw_score),
            status: ItemStatus::Success,
        }
    }

    /// An image stopped by the safety gate.
    pub fn blocked(file: impl Into<String>, nsfw_score: f32) -> Self {
        Self {
            file: file.into(),
            caption: BLOCKED_CAPTION.to_string(),
            keywords: String::new(),
            meta_description: String::new(),
            nsfw_score: format_score(Some(nsfw_score)),
            status: ItemStatus::BlockedNsfw,
        }
    }

    /// An image that could not be processed.
    pub fn error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            caption: String::new(),
            keywords: String::new(),
            meta_description: String::new(),
            nsfw_score: SCORE_NOT_AVAILABLE.to_string(),
            status: ItemStatus::Error(message.into()),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    pub fn meta_description(&self) -> &str {
        &self.meta_description
    }

    pub fn nsfw_score(&self) -> &str {
        &self.nsfw_score
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    /// Cells in [`COLUMNS`] order.
    pub fn to_row(&self) -> [String; 6] {
        [
            self.file.clone(),
            self.caption.clone(),
            self.keywords.clone(),
            self.meta_description.clone(),
            self.nsfw_score.clone(),
            self.status.to_string(),
        ]
    }
}

/// Percentage with one decimal, e.g. 0.953 → "95.3%".
fn format_score(score: Option<f32>) -> String {
    match score {
        Some(s) => format!("{:.1}%", s * 100.0),
        None => SCORE_NOT_AVAILABLE.to_string(),
    }
}

/// All records of one batch run plus summary counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// One record per image, in archive walk order
    pub records: Vec<BatchItemRecord>,
    pub succeeded: usize,
    pub nsfw_blocked: usize,
    pub failed: usize,
    /// Successful captions the moderator flagged
    pub toxic_flagged: usize,
    pub elapsed_secs: f64,
}

impl BatchReport {
    /// Build a report and tally the status counts.
    pub fn new(records: Vec<BatchItemRecord>, toxic_flagged: usize, elapsed_secs: f64) -> Self {
        let count = |f: fn(&ItemStatus) -> bool| records.iter().filter(|r| f(&r.status)).count();
        let succeeded = count(|s| *s == ItemStatus::Success);
        let nsfw_blocked = count(|s| *s == ItemStatus::BlockedNsfw);
        let failed = count(|s| matches!(s, ItemStatus::Error(_)));
        Self {
            records,
            succeeded,
            nsfw_blocked,
            failed,
            toxic_flagged,
            elapsed_secs,
        }
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Images per second over the whole run.
    pub fn rate(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.total() as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}
