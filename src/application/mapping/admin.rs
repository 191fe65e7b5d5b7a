//! Administrative operations: authoring mappings and reviewing candidates.
//!
//! Unlike `map_category` these surface errors, since they are explicit
//! human-triggered actions.

use super::MappingEngine;
use crate::domain::{
    CandidateId, CandidateStats, CategoryCount, CategoryMapping, MappingAnalytics,
    MappingCandidate, MappingError, MappingId, MappingSource, MappingStatus, MappingType,
    normalize_text,
};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// Confidence assigned to mappings created by approving a candidate.
pub const APPROVED_CONFIDENCE: f64 = 0.8;

const POPULAR_LIMIT: usize = 10;

fn default_language() -> String {
    "en".to_string()
}

fn default_confidence() -> f64 {
    0.9
}

/// Input for authoring a mapping by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMapping {
    pub key: String,
    pub target_category: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub mapping_type: MappingType,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub priority: Option<i32>,
    pub created_by: Option<String>,
}

impl NewMapping {
    pub fn new(key: impl Into<String>, target_category: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target_category: target_category.into(),
            language: default_language(),
            mapping_type: MappingType::default(),
            aliases: Vec::new(),
            patterns: Vec::new(),
            confidence: default_confidence(),
            priority: None,
            created_by: None,
        }
    }
}

/// Fields to change on an existing mapping. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingUpdate {
    pub target_category: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub patterns: Option<Vec<String>>,
    pub priority: Option<i32>,
    pub confidence: Option<f64>,
    pub status: Option<MappingStatus>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingStats {
    pub mappings: MappingAnalytics,
    pub candidates: CandidateStats,
    pub categories: Vec<CategoryCount>,
    pub popular: Vec<CategoryMapping>,
    pub cache_size: usize,
    pub cache_version: Option<String>,
}

fn validate_confidence(confidence: f64) -> Result<(), MappingError> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(MappingError::InvalidInput(format!(
            "confidence must be within 0..=1, got {confidence}"
        )));
    }
    Ok(())
}

fn validate_patterns(patterns: &[String]) -> Result<(), MappingError> {
    for pattern in patterns {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| MappingError::InvalidInput(format!("invalid pattern {pattern:?}: {e}")))?;
    }
    Ok(())
}

fn normalized_aliases(aliases: &[String]) -> Vec<String> {
    aliases
        .iter()
        .map(|alias| normalize_text(alias))
        .filter(|alias| !alias.is_empty())
        .collect()
}

impl MappingEngine {
    /// Authors a manual mapping and refreshes the cache.
    pub async fn create_mapping(&self, new: NewMapping) -> Result<CategoryMapping, MappingError> {
        let key = normalize_text(&new.key);
        if key.is_empty() {
            return Err(MappingError::InvalidInput("mapping key is empty".into()));
        }
        let category = new.target_category.trim();
        if category.is_empty() {
            return Err(MappingError::InvalidInput("target category is empty".into()));
        }
        validate_confidence(new.confidence)?;
        validate_patterns(&new.patterns)?;

        let mut mapping = CategoryMapping::new(&key, new.language, category, new.confidence)
            .with_aliases(normalized_aliases(&new.aliases))
            .with_patterns(new.patterns)
            .with_source(MappingSource::Manual)
            .with_created_by(new.created_by);
        mapping.mapping_type = new.mapping_type;
        if let Some(priority) = new.priority {
            mapping.priority = priority;
        }

        self.store().save_mapping(&mapping).await?;
        self.refresh_cache().await;
        log::info!("Created mapping {:?} -> {}", mapping.key, mapping.target_category);
        Ok(mapping)
    }

    /// Applies `update` to a mapping, bumps its version and refreshes the cache.
    pub async fn update_mapping(
        &self,
        id: &MappingId,
        update: MappingUpdate,
    ) -> Result<CategoryMapping, MappingError> {
        let mut mapping = self
            .store()
            .find_mapping_by_id(id)
            .await?
            .ok_or_else(|| MappingError::MappingNotFound(id.clone()))?;

        if let Some(confidence) = update.confidence {
            validate_confidence(confidence)?;
            mapping.confidence = confidence;
        }
        if let Some(patterns) = update.patterns {
            validate_patterns(&patterns)?;
            mapping.patterns = patterns;
        }
        if let Some(category) = update.target_category {
            mapping.target_category = category;
        }
        if let Some(aliases) = update.aliases {
            mapping.aliases = normalized_aliases(&aliases);
        }
        if let Some(priority) = update.priority {
            mapping.priority = priority;
        }
        if let Some(status) = update.status {
            mapping.status = status;
        }
        mapping.increment_version(update.updated_by);

        self.store().save_mapping(&mapping).await?;
        self.refresh_cache().await;
        log::info!("Updated mapping {} to version {}", mapping.id, mapping.version);
        Ok(mapping)
    }

    /// Resolves a pending candidate into a mapping for `category`.
    pub async fn approve_candidate(
        &self,
        id: &CandidateId,
        category: &str,
        reviewer: Option<&str>,
    ) -> Result<CategoryMapping, MappingError> {
        let category = category.trim();
        if category.is_empty() {
            return Err(MappingError::InvalidInput("approved category is empty".into()));
        }

        let guard = self.candidates.exclusive().await;
        let mut candidate = self.pending_candidate(id, MappingStatus::Active).await?;
        let reviewer = reviewer.map(str::to_string);
        let mapping = CategoryMapping::new(
            &candidate.normalized_text,
            candidate.language.clone(),
            category,
            APPROVED_CONFIDENCE,
        )
        .with_source(MappingSource::UserCorrection)
        .with_created_by(reviewer.clone());

        candidate.approve(category, reviewer);
        self.store().promote_candidate(&candidate, &mapping).await?;
        drop(guard);

        self.refresh_cache().await;
        log::info!(
            "Approved candidate {:?} -> {}",
            candidate.original_text,
            category
        );
        Ok(mapping)
    }

    pub async fn reject_candidate(
        &self,
        id: &CandidateId,
        reason: &str,
        reviewer: Option<&str>,
    ) -> Result<MappingCandidate, MappingError> {
        let _guard = self.candidates.exclusive().await;
        let mut candidate = self.pending_candidate(id, MappingStatus::Rejected).await?;
        candidate.reject(reason, reviewer.map(str::to_string));
        self.store().save_candidate(&candidate).await?;
        log::info!("Rejected candidate {:?}: {}", candidate.original_text, reason);
        Ok(candidate)
    }

    pub async fn get_pending_candidates(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<MappingCandidate>, MappingError> {
        Ok(self.store().get_pending_candidates(limit, offset).await?)
    }

    pub async fn get_mapping_stats(&self) -> Result<MappingStats, MappingError> {
        let store = self.store();
        Ok(MappingStats {
            mappings: store.mapping_analytics().await?,
            candidates: store.candidate_stats().await?,
            categories: store.category_distribution(None).await?,
            popular: store.popular_mappings(POPULAR_LIMIT, None).await?,
            cache_size: self.cache().len(),
            cache_version: self.cache().version(),
        })
    }

    /// Deletes rejected candidates older than `older_than_days`.
    pub async fn cleanup_candidates(&self, older_than_days: i64) -> Result<usize, MappingError> {
        if older_than_days < 0 {
            return Err(MappingError::InvalidInput(
                "cleanup age must not be negative".into(),
            ));
        }
        let deleted = self
            .store()
            .cleanup_rejected_candidates(older_than_days)
            .await?;
        log::info!("Removed {} rejected candidates", deleted);
        Ok(deleted)
    }

    async fn pending_candidate(
        &self,
        id: &CandidateId,
        next: MappingStatus,
    ) -> Result<MappingCandidate, MappingError> {
        let candidate = self
            .store()
            .find_candidate_by_id(id)
            .await?
            .ok_or_else(|| MappingError::CandidateNotFound(id.clone()))?;
        if !candidate.can_transition_to(next) {
            return Err(MappingError::InvalidStatusTransition {
                current: candidate.status.to_string(),
                next: next.to_string(),
            });
        }
        Ok(candidate)
    }
}
