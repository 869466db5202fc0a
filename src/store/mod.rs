// src/store/mod.rs
pub mod http;
pub mod memory;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Post lifecycle. Transitions are one-directional from `Draft`;
/// `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    #[serde(default)]
    pub excerpt: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Fields for the initial draft row.
#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub status: PostStatus,
    pub excerpt: &'a str,
    pub tags: &'a [String],
}

/// Partial update applied exactly once at the end of the loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// One numbered draft attempt. Append-only; `(post_id, iteration_number)` is
/// unique and the store must reject duplicates.
#[derive(Debug, Clone)]
pub struct IterationRow<'a> {
    pub post_id: Uuid,
    pub iteration_number: u32,
    pub title: &'a str,
    pub content: &'a str,
    pub quality_score: f64,
    pub critique: serde_json::Value,
    pub cost_cents: u32,
}

/// Append-only activity log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub agent: String,
    pub activity_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ActivityEntry {
    pub fn new(activity_type: impl Into<String>, success: bool) -> Self {
        Self {
            agent: "ralph".to_string(),
            activity_type: activity_type.into(),
            success,
            context_id: None,
            duration_ms: None,
            error: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn context(mut self, id: Uuid) -> Self {
        self.context_id = Some(id);
        self
    }

    pub fn duration(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn error_text(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn meta(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Persistence the loop writes through. Create/read/update by id plus
/// append-only history and logging; no deletes anywhere.
#[async_trait::async_trait]
pub trait BlogStore: Send + Sync {
    async fn create_post(&self, new: NewPost<'_>) -> Result<Uuid>;

    async fn update_post(&self, post_id: Uuid, update: PostUpdate) -> Result<()>;

    /// Must reject a duplicate iteration number for the same post.
    async fn save_iteration(&self, row: IterationRow<'_>) -> Result<Uuid>;

    async fn log_activity(&self, entry: ActivityEntry) -> Result<Uuid>;

    /// Whether any post was created on the given (UTC) date.
    async fn post_exists_on(&self, date: NaiveDate) -> Result<bool>;
}
