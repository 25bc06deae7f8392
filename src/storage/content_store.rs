//! Content Store
//!
//! Write-only sink for finished content. The orchestrator only ever calls
//! `create`; reading back is left to the concrete stores.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::storage as storage_constants;
use crate::puzzle::{AudienceTier, Candidate, Family, FamilyData};
use crate::types::{CallerId, ForgeError, Result};

// =============================================================================
// Records
// =============================================================================

/// Content ready to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContent {
    pub family: Family,
    pub audience_tier: AudienceTier,
    pub caller_id: CallerId,
    pub title: String,
    pub question: String,
    pub correct_answer: String,
    pub explanation: String,
    pub hints: Vec<String>,
    pub family_data: FamilyData,
    pub difficulty: f64,
    pub estimated_time_minutes: u32,
    pub tags: Vec<String>,
    pub auto_corrected: bool,
    pub validation_passed: bool,
}

impl NewContent {
    /// Freeze a candidate for storage.
    ///
    /// Estimated time falls back to one derived from difficulty; tags get the
    /// family and tier names in front of the model's own, without duplicates.
    pub fn from_candidate(
        candidate: &Candidate,
        audience_tier: AudienceTier,
        caller_id: &CallerId,
        auto_corrected: bool,
        validation_passed: bool,
    ) -> Self {
        let estimated_time_minutes = candidate
            .estimated_time_minutes
            .unwrap_or_else(|| estimate_minutes(candidate.difficulty));

        Self {
            family: candidate.family,
            audience_tier,
            caller_id: caller_id.clone(),
            title: candidate.title.clone(),
            question: candidate.question.clone(),
            correct_answer: candidate.correct_answer.clone(),
            explanation: candidate.explanation.clone(),
            hints: candidate.hints.clone(),
            family_data: candidate.family_data.clone(),
            difficulty: candidate.difficulty,
            estimated_time_minutes,
            tags: merge_tags(candidate.family, audience_tier, &candidate.tags),
            auto_corrected,
            validation_passed,
        }
    }
}

/// Solving time in minutes derived from difficulty
pub fn estimate_minutes(difficulty: f64) -> u32 {
    let minutes = storage_constants::BASE_MINUTES
        + storage_constants::MINUTES_PER_DIFFICULTY * difficulty.max(0.0);
    minutes.round() as u32
}

fn merge_tags(family: Family, tier: AudienceTier, model_tags: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(model_tags.len() + 2);
    let candidates = [family.as_str(), tier.as_str()]
        .into_iter()
        .map(String::from)
        .chain(model_tags.iter().map(|t| t.trim().to_lowercase()));

    for tag in candidates {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Identity assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContent {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl StoredContent {
    pub fn fresh() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Store Trait
// =============================================================================

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create(&self, content: NewContent) -> Result<StoredContent>;
}

pub type SharedContentStore = Arc<dyn ContentStore>;

// =============================================================================
// In-Memory Store
// =============================================================================

/// Process-local store for tests and dry runs
#[derive(Default)]
pub struct InMemoryContentStore {
    items: RwLock<Vec<(StoredContent, NewContent)>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items
            .read()
            .map(|items| items.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<NewContent> {
        let items = self.items.read().unwrap_or_else(|poisoned| {
            tracing::error!("Content store RwLock poisoned on read, recovering");
            poisoned.into_inner()
        });
        items
            .iter()
            .find(|(stored, _)| stored.id == id)
            .map(|(_, content)| content.clone())
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn create(&self, content: NewContent) -> Result<StoredContent> {
        if content.title.is_empty() || content.question.is_empty() {
            return Err(ForgeError::Storage(
                "content requires a title and a question".to_string(),
            ));
        }
        let stored = StoredContent::fresh();
        let mut items = self.items.write().unwrap_or_else(|poisoned| {
            tracing::error!("Content store RwLock poisoned, recovering");
            poisoned.into_inner()
        });
        items.push((stored.clone(), content));
        Ok(stored)
    }
}
