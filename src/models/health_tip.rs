use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Priority, TipSource, TipStatus};

/// A health tip. General tips (`patient_id = None`) are visible to every
/// patient; personalized tips are scoped to one patient. Content comes from
/// the external text-generation provider or an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthTip {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub status: TipStatus,
    pub featured: bool,
    pub source: TipSource,
    pub patient_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Per-patient like/bookmark flags for a tip.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TipReaction {
    pub liked: bool,
    pub bookmarked: bool,
}
