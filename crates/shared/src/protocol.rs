use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DeckId;

/// One imported deck as reported by `GET /api/decks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSummary {
    pub id: DeckId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub card_count: u32,
    pub lesson_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckListResponse {
    #[serde(default)]
    pub decks: Vec<DeckSummary>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: bool,
}
