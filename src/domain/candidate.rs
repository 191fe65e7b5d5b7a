use super::mapping::MappingStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a mapping candidate
pub type CandidateId = String;

/// Who proposed a candidate's suggested category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Heuristic,
    Model,
    FuzzyMatch,
}

impl fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heuristic => write!(f, "heuristic"),
            Self::Model => write!(f, "model"),
            Self::FuzzyMatch => write!(f, "fuzzy_match"),
        }
    }
}

impl FromStr for SuggestionSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heuristic" | "pattern" => Ok(Self::Heuristic),
            "model" | "llm" => Ok(Self::Model),
            "fuzzy_match" => Ok(Self::FuzzyMatch),
            other => Err(format!("Unknown suggestion source: {other}")),
        }
    }
}

/// Category proposed for an unmapped input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: String,
    pub confidence: f64,
    pub source: SuggestionSource,
}

/// An observed-but-unresolved input awaiting classification.
///
/// Status moves `pending_review -> active` (approved or auto-learned) or
/// `pending_review -> rejected`; both targets are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingCandidate {
    pub id: CandidateId,
    pub original_text: String,
    pub normalized_text: String,
    pub language: String,
    pub suggested_category: Option<String>,
    pub suggested_confidence: f64,
    pub suggestion_source: Option<SuggestionSource>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    /// Number of unmapped occurrences seen, starting at 1
    pub attempt_count: i64,
    pub status: MappingStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Category the candidate was resolved to
    pub approved_mapping: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MappingCandidate {
    pub fn new(
        original_text: impl Into<String>,
        normalized_text: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            original_text: original_text.into(),
            normalized_text: normalized_text.into(),
            language: language.into(),
            suggested_category: None,
            suggested_confidence: 0.0,
            suggestion_source: None,
            user_id: None,
            session_id: None,
            attempt_count: 1,
            status: MappingStatus::PendingReview,
            reviewed_by: None,
            reviewed_at: None,
            approved_mapping: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_context(mut self, user_id: Option<String>, session_id: Option<String>) -> Self {
        self.user_id = user_id;
        self.session_id = session_id;
        self
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggested_category = Some(suggestion.category);
        self.suggested_confidence = suggestion.confidence.clamp(0.0, 1.0);
        self.suggestion_source = Some(suggestion.source);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == MappingStatus::PendingReview
    }

    pub fn increment_attempts(&mut self) {
        self.attempt_count += 1;
        self.updated_at = Utc::now();
    }

    /// Whether the candidate has been seen often enough, with a strong enough
    /// suggestion, to be promoted without review.
    pub fn ready_for_auto_learn(&self, threshold: i64, min_confidence: f64) -> bool {
        self.is_pending()
            && self.suggested_category.is_some()
            && self.attempt_count >= threshold
            && self.suggested_confidence > min_confidence
    }

    /// Checks whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: MappingStatus) -> bool {
        matches!(
            (self.status, next),
            (MappingStatus::PendingReview, MappingStatus::Active)
                | (MappingStatus::PendingReview, MappingStatus::Rejected)
        )
    }

    pub fn approve(&mut self, category: impl Into<String>, reviewed_by: Option<String>) {
        let now = Utc::now();
        self.status = MappingStatus::Active;
        self.approved_mapping = Some(category.into());
        self.reviewed_by = reviewed_by;
        self.reviewed_at = Some(now);
        self.updated_at = now;
    }

    pub fn reject(&mut self, reason: impl Into<String>, reviewed_by: Option<String>) {
        let now = Utc::now();
        self.status = MappingStatus::Rejected;
        self.rejection_reason = Some(reason.into());
        self.reviewed_by = reviewed_by;
        self.reviewed_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heuristic(confidence: f64) -> Suggestion {
        Suggestion {
            category: "Food & Dining".into(),
            confidence,
            source: SuggestionSource::Heuristic,
        }
    }

    #[test]
    fn test_new_candidate_is_pending_with_one_attempt() {
        let candidate = MappingCandidate::new("Coffee!", "coffee", "en");
        assert!(candidate.is_pending());
        assert_eq!(candidate.attempt_count, 1);
        assert!(candidate.suggested_category.is_none());
    }

    #[test]
    fn test_auto_learn_readiness() {
        let mut candidate = MappingCandidate::new("x", "x", "en").with_suggestion(heuristic(0.6));
        assert!(!candidate.ready_for_auto_learn(3, 0.5));
        candidate.increment_attempts();
        candidate.increment_attempts();
        assert!(candidate.ready_for_auto_learn(3, 0.5));

        let mut weak = MappingCandidate::new("y", "y", "en").with_suggestion(heuristic(0.5));
        weak.attempt_count = 10;
        assert!(!weak.ready_for_auto_learn(3, 0.5));

        let mut unsuggested = MappingCandidate::new("z", "z", "en");
        unsuggested.attempt_count = 10;
        assert!(!unsuggested.ready_for_auto_learn(3, 0.5));
    }

    #[test]
    fn test_terminal_states() {
        let mut candidate = MappingCandidate::new("x", "x", "en");
        assert!(candidate.can_transition_to(MappingStatus::Active));
        candidate.reject("noise", Some("alice".into()));
        assert_eq!(candidate.status, MappingStatus::Rejected);
        assert!(!candidate.can_transition_to(MappingStatus::Active));
        assert!(!candidate.can_transition_to(MappingStatus::Rejected));
        assert_eq!(candidate.rejection_reason.as_deref(), Some("noise"));
    }

    #[test]
    fn test_approve_records_review() {
        let mut candidate = MappingCandidate::new("x", "x", "en");
        candidate.approve("Travel", None);
        assert_eq!(candidate.status, MappingStatus::Active);
        assert_eq!(candidate.approved_mapping.as_deref(), Some("Travel"));
        assert!(candidate.reviewed_at.is_some());
    }
}
