// src/catalog/mod.rs
pub mod feed;
pub mod http;
pub mod memory;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a candidate item came from. Wire labels match the catalog tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Rss,
    Evergreen,
    Standards,
    Vendor,
    Internal,
}

impl SourceCategory {
    /// Selection priority order; also the backfill order.
    pub const PRIORITY: [SourceCategory; 5] = [
        SourceCategory::Rss,
        SourceCategory::Evergreen,
        SourceCategory::Standards,
        SourceCategory::Vendor,
        SourceCategory::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Rss => "rss",
            SourceCategory::Evergreen => "evergreen",
            SourceCategory::Standards => "standards",
            SourceCategory::Vendor => "vendor",
            SourceCategory::Internal => "internal",
        }
    }

    /// Label used when formatting items into prompts.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            SourceCategory::Rss => "RSS Feed",
            SourceCategory::Evergreen => "Evergreen Topic",
            SourceCategory::Standards => "Standards/Gov",
            SourceCategory::Vendor => "Vendor Update",
            SourceCategory::Internal => "Internal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" => Some(SourceCategory::Rss),
            "evergreen" => Some(SourceCategory::Evergreen),
            "standards" => Some(SourceCategory::Standards),
            "vendor" => Some(SourceCategory::Vendor),
            "internal" => Some(SourceCategory::Internal),
            _ => None,
        }
    }
}

/// One candidate piece of source material. Read-only inside the core; the
/// only state change is `mark_used`, which is one-way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "source_type")]
    pub category: SourceCategory,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_name: Option<String>,
}

impl SourceItem {
    /// Short human-readable line for logs and the run digest.
    pub fn summary_line(&self) -> String {
        match &self.url {
            Some(url) => format!("[{}] {} - {}", self.category.as_str(), self.title, url),
            None => format!("[{}] {}", self.category.as_str(), self.title),
        }
    }
}

/// A configured upstream source (feed URL, evergreen topic list, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "source_type")]
    pub category: SourceCategory,
    #[serde(default)]
    pub priority: i32,
}

/// The external catalog the selector draws from.
#[async_trait::async_trait]
pub trait TopicCatalog: Send + Sync {
    /// Unused items of one category, newest first.
    async fn fetch_unused(&self, category: SourceCategory, limit: usize) -> Result<Vec<SourceItem>>;

    /// Associate items with the post that consumed them. Items already used
    /// are left untouched; returns the number actually updated.
    async fn mark_used(
        &self,
        category: SourceCategory,
        item_ids: &[String],
        post_id: Uuid,
    ) -> Result<usize>;

    /// Active upstream sources for a category, highest priority first.
    async fn fetch_active_sources(&self, category: SourceCategory) -> Result<Vec<SourceDescriptor>>;

    /// Pull fresh items from one upstream source into the catalog.
    /// Best-effort: callers catch and skip per-source failures.
    async fn refresh_from_feed(
        &self,
        source: &SourceDescriptor,
        limit: usize,
    ) -> Result<Vec<SourceItem>>;
}
