use super::mapping::{MappingId, MatchKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category returned when nothing else resolves.
pub const DEFAULT_CATEGORY: &str = "Miscellaneous";

/// Which stage produced a `MappingResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    ExactMatch,
    AliasMatch,
    PatternMatch,
    FuzzyMatch,
    /// Entry loaded into the cache by a snapshot refresh
    Database,
    AutoLearned,
    Fallback,
    DefaultFallback,
    #[default]
    Unknown,
}

impl From<MatchKind> for ResultSource {
    fn from(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Key => Self::ExactMatch,
            MatchKind::Alias => Self::AliasMatch,
            MatchKind::Pattern => Self::PatternMatch,
        }
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ExactMatch => "exact_match",
            Self::AliasMatch => "alias_match",
            Self::PatternMatch => "pattern_match",
            Self::FuzzyMatch => "fuzzy_match",
            Self::Database => "database",
            Self::AutoLearned => "auto_learned",
            Self::Fallback => "fallback",
            Self::DefaultFallback => "default_fallback",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a classification request. Always constructible, even on total failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MappingResult {
    pub category: Option<String>,
    pub confidence: f64,
    pub source: ResultSource,
    pub mapping_id: Option<MappingId>,
    /// Set when the result came from the static fallback table
    pub fallback_used: bool,
    pub cached: bool,
}

impl MappingResult {
    /// A result with no category.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn matched(
        category: impl Into<String>,
        confidence: f64,
        source: ResultSource,
        mapping_id: Option<MappingId>,
    ) -> Self {
        Self {
            category: Some(category.into()),
            confidence: confidence.clamp(0.0, 1.0),
            source,
            mapping_id,
            fallback_used: false,
            cached: false,
        }
    }

    pub fn fallback(category: impl Into<String>, confidence: f64, source: ResultSource) -> Self {
        Self {
            fallback_used: true,
            ..Self::matched(category, confidence, source, None)
        }
    }

    pub fn is_successful(&self) -> bool {
        self.category.is_some() && self.confidence > 0.0
    }

    pub fn is_high_confidence(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}
