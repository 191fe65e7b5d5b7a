use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a category mapping
pub type MappingId = String;

/// Learning rate for the `success_rate` moving average.
pub const SUCCESS_RATE_ALPHA: f64 = 0.1;

/// Priority assigned to authored mappings.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Priority assigned to mappings promoted by the auto-learner.
pub const AUTO_LEARNED_PRIORITY: i32 = 5;

/// Kind of rule a mapping represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MappingType {
    #[default]
    Category,
    Merchant,
    Rule,
    Alias,
    Pattern,
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::Merchant => write!(f, "merchant"),
            Self::Rule => write!(f, "rule"),
            Self::Alias => write!(f, "alias"),
            Self::Pattern => write!(f, "pattern"),
        }
    }
}

impl FromStr for MappingType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "merchant" => Ok(Self::Merchant),
            "rule" => Ok(Self::Rule),
            "alias" => Ok(Self::Alias),
            "pattern" => Ok(Self::Pattern),
            other => Err(format!("Unknown mapping type: {other}")),
        }
    }
}

/// Where a mapping came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    #[default]
    Manual,
    AutoLearned,
    ModelSuggestion,
    UserCorrection,
    AdminReview,
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::AutoLearned => write!(f, "auto_learned"),
            Self::ModelSuggestion => write!(f, "model_suggestion"),
            Self::UserCorrection => write!(f, "user_correction"),
            Self::AdminReview => write!(f, "admin_review"),
        }
    }
}

impl FromStr for MappingSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto_learned" | "auto-learned" => Ok(Self::AutoLearned),
            "model_suggestion" | "llm_suggestion" => Ok(Self::ModelSuggestion),
            "user_correction" => Ok(Self::UserCorrection),
            "admin_review" => Ok(Self::AdminReview),
            other => Err(format!("Unknown mapping source: {other}")),
        }
    }
}

/// Lifecycle status shared by mappings and candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    #[default]
    Active,
    PendingReview,
    Deprecated,
    Rejected,
}

impl MappingStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::PendingReview => write!(f, "pending_review"),
            Self::Deprecated => write!(f, "deprecated"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for MappingStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "pending_review" | "pending" => Ok(Self::PendingReview),
            "deprecated" => Ok(Self::Deprecated),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("Unknown mapping status: {other}")),
        }
    }
}

/// How a piece of text matched a mapping in the candidate stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Key,
    Alias,
    Pattern,
}

impl MatchKind {
    /// Multiplier applied to the mapping's stored confidence.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Key => 1.0,
            Self::Alias => 0.9,
            Self::Pattern => 0.8,
        }
    }
}

/// A learned or authored rule that maps normalized text to a spending category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub id: MappingId,
    /// Canonical lookup key (normalized)
    pub key: String,
    pub mapping_type: MappingType,
    pub language: String,
    pub target_category: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Regular expressions tested case-insensitively against the original text
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Higher wins ties
    pub priority: i32,
    pub confidence: f64,
    pub source: MappingSource,
    pub status: MappingStatus,
    pub usage_count: i64,
    /// Exponential moving average of successful uses
    pub success_rate: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl CategoryMapping {
    /// Creates an active manual mapping with default priority and telemetry.
    ///
    /// The key is lowercased and trimmed; confidence is clamped to `0.0..=1.0`.
    pub fn new(
        key: impl AsRef<str>,
        language: impl Into<String>,
        target_category: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            key: key.as_ref().trim().to_lowercase(),
            mapping_type: MappingType::Category,
            language: language.into(),
            target_category: target_category.into(),
            aliases: Vec::new(),
            patterns: Vec::new(),
            priority: DEFAULT_PRIORITY,
            confidence: confidence.clamp(0.0, 1.0),
            source: MappingSource::Manual,
            status: MappingStatus::Active,
            usage_count: 0,
            success_rate: 0.0,
            last_used: None,
            version: 1,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for alias in aliases {
            self.push_alias(alias.as_ref());
        }
        self
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            if !pattern.is_empty() && !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
        self
    }

    pub fn with_source(mut self, source: MappingSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_created_by(mut self, created_by: Option<String>) -> Self {
        self.created_by = created_by;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Adds an alias if it is not already present. Returns true when added.
    pub fn add_alias(&mut self, alias: &str) -> bool {
        let added = self.push_alias(alias);
        if added {
            self.increment_version(None);
        }
        added
    }

    fn push_alias(&mut self, alias: &str) -> bool {
        let alias = alias.trim().to_lowercase();
        if alias.is_empty() || self.aliases.contains(&alias) {
            return false;
        }
        self.aliases.push(alias);
        true
    }

    /// Records one use and folds the outcome into `success_rate`.
    ///
    /// The first recorded use seeds the average with the outcome itself.
    pub fn record_usage(&mut self, success: bool) {
        let outcome = if success { 1.0 } else { 0.0 };
        self.usage_count += 1;
        self.success_rate = if self.usage_count == 1 {
            outcome
        } else {
            (1.0 - SUCCESS_RATE_ALPHA) * self.success_rate + SUCCESS_RATE_ALPHA * outcome
        }
        .clamp(0.0, 1.0);
        let now = Utc::now();
        self.last_used = Some(now);
        self.updated_at = now;
    }

    pub fn increment_version(&mut self, updated_by: Option<String>) {
        self.version += 1;
        self.updated_at = Utc::now();
        self.updated_by = updated_by;
    }

    pub fn matches_key(&self, normalized: &str) -> bool {
        self.key == normalized
    }

    /// True when an alias equals the text or occurs in it as a whole-word phrase.
    pub fn matches_alias(&self, normalized: &str) -> bool {
        self.aliases
            .iter()
            .any(|alias| alias == normalized || contains_phrase(normalized, alias))
    }

    /// True when any pattern matches `original`. Invalid patterns are skipped.
    pub fn matches_pattern(&self, original: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => re.is_match(original),
                Err(err) => {
                    log::debug!(
                        "Skipping invalid pattern {:?} on mapping {}: {}",
                        pattern,
                        self.id,
                        err
                    );
                    false
                }
            }
        })
    }

    /// Scores a candidate-stage match: key, then alias, then pattern.
    ///
    /// Returns `None` when nothing matches. Confidence never exceeds 1.0.
    pub fn match_confidence(&self, normalized: &str, original: &str) -> Option<(MatchKind, f64)> {
        let kind = if self.matches_key(normalized) {
            MatchKind::Key
        } else if self.matches_alias(normalized) {
            MatchKind::Alias
        } else if self.matches_pattern(original) {
            MatchKind::Pattern
        } else {
            return None;
        };
        Some((kind, (self.confidence * kind.weight()).min(1.0)))
    }
}

/// Whole-word containment: `phrase` appears in `text` bounded by spaces or the ends.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let padded_text = format!(" {text} ");
    let padded_phrase = format!(" {phrase} ");
    padded_text.contains(&padded_phrase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coffee() -> CategoryMapping {
        CategoryMapping::new("Coffee ", "en", "Food & Dining", 0.9)
            .with_aliases(["Starbucks", "espresso bar"])
            .with_patterns(["^latte.*", "[unclosed"])
    }

    #[test]
    fn test_new_normalizes_key_and_clamps_confidence() {
        let mapping = CategoryMapping::new("  TAXI ", "en", "Transportation", 1.7);
        assert_eq!(mapping.key, "taxi");
        assert_eq!(mapping.confidence, 1.0);
        assert_eq!(mapping.status, MappingStatus::Active);
        assert_eq!(mapping.version, 1);
    }

    #[test]
    fn test_match_confidence_weights() {
        let mapping = coffee();
        let (kind, conf) = mapping.match_confidence("coffee", "coffee").unwrap();
        assert_eq!(kind, MatchKind::Key);
        assert!((conf - 0.9).abs() < 1e-9);

        let (kind, conf) = mapping
            .match_confidence("coffee at starbucks", "coffee at Starbucks")
            .unwrap();
        assert_eq!(kind, MatchKind::Alias);
        assert!((conf - 0.81).abs() < 1e-9);

        let (kind, conf) = mapping.match_confidence("latte grande", "Latte grande").unwrap();
        assert_eq!(kind, MatchKind::Pattern);
        assert!((conf - 0.72).abs() < 1e-9);

        assert!(mapping.match_confidence("tea", "tea").is_none());
    }

    #[test]
    fn test_alias_requires_whole_words() {
        let mapping = coffee();
        assert!(mapping.matches_alias("the espresso bar downtown"));
        assert!(!mapping.matches_alias("starbucksreserve"));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let mapping = CategoryMapping::new("x", "en", "Shopping", 0.5).with_patterns(["(", "shop"]);
        assert!(mapping.matches_pattern("Gift SHOP"));
        assert!(!mapping.matches_pattern("market"));
    }

    #[test]
    fn test_record_usage_moving_average() {
        let mut mapping = coffee();
        mapping.record_usage(true);
        assert_eq!(mapping.usage_count, 1);
        assert!((mapping.success_rate - 1.0).abs() < 1e-9);
        assert!(mapping.last_used.is_some());

        mapping.record_usage(true);
        assert!((mapping.success_rate - 1.0).abs() < 1e-9);

        mapping.record_usage(false);
        assert!((mapping.success_rate - 0.9).abs() < 1e-9);

        mapping.record_usage(true);
        assert!((mapping.success_rate - 0.91).abs() < 1e-9);
        assert_eq!(mapping.usage_count, 4);
    }

    #[test]
    fn test_add_alias_bumps_version_once() {
        let mut mapping = coffee();
        assert!(mapping.add_alias("Blue Bottle"));
        assert!(!mapping.add_alias("blue bottle "));
        assert_eq!(mapping.version, 2);
        assert!(mapping.aliases.contains(&"blue bottle".to_string()));
    }

    #[test]
    fn test_enum_display_parse() {
        assert_eq!(MappingSource::AutoLearned.to_string(), "auto_learned");
        assert_eq!(
            MappingStatus::from_str("PENDING_REVIEW").unwrap(),
            MappingStatus::PendingReview
        );
        assert_eq!(MappingType::from_str("merchant").unwrap(), MappingType::Merchant);
        assert!(MappingStatus::from_str("bogus").is_err());
    }
}
