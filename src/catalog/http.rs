// src/catalog/http.rs
// Supabase (PostgREST) backed catalog over blog_topic_sources/blog_topic_items.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::feed;
use super::{SourceCategory, SourceDescriptor, SourceItem, TopicCatalog};

pub struct SupabaseCatalog {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ItemRow {
    id: String,
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    source_name: Option<String>,
}

impl SupabaseCatalog {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let url = std::env::var("SUPABASE_URL").context("Missing SUPABASE_URL env var")?;
        let key = std::env::var("SUPABASE_KEY").context("Missing SUPABASE_KEY env var")?;
        Ok(Self::new(url, key))
    }

    fn rest(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn source_ids(&self, category: SourceCategory) -> Result<Vec<String>> {
        Ok(self
            .fetch_active_sources(category)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect())
    }
}

#[async_trait::async_trait]
impl TopicCatalog for SupabaseCatalog {
    async fn fetch_unused(&self, category: SourceCategory, limit: usize) -> Result<Vec<SourceItem>> {
        let source_ids = self.source_ids(category).await?;
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }

        let resp = self
            .authed(self.http.get(self.rest("blog_topic_items")))
            .query(&[
                ("select", "*".to_string()),
                ("source_id", format!("in.({})", source_ids.join(","))),
                ("used_in_blog", "is.null".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .context("fetching unused topic items")?
            .error_for_status()
            .context("unused topic items query failed")?;

        let rows: Vec<ItemRow> = resp.json().await.context("parsing topic item rows")?;
        Ok(rows
            .into_iter()
            .map(|row| SourceItem {
                id: row.id,
                title: row.title,
                summary: row.summary.unwrap_or_default(),
                url: row.url,
                category,
                published_at: row.published_at,
                source_name: row.source_name,
            })
            .collect())
    }

    async fn mark_used(
        &self,
        _category: SourceCategory,
        item_ids: &[String],
        post_id: Uuid,
    ) -> Result<usize> {
        if item_ids.is_empty() {
            return Ok(0);
        }

        let resp = self
            .authed(self.http.patch(self.rest("blog_topic_items")))
            .query(&[
                ("id", format!("in.({})", item_ids.join(","))),
                // Only flip rows that are still unused; used rows stay put.
                ("used_in_blog", "is.null".to_string()),
            ])
            .header("Prefer", "return=representation")
            .json(&json!({ "used_in_blog": post_id }))
            .send()
            .await
            .context("marking topic items used")?
            .error_for_status()
            .context("mark_used update failed")?;

        let rows: Vec<serde_json::Value> = resp.json().await.context("parsing mark_used rows")?;
        Ok(rows.len())
    }

    async fn fetch_active_sources(&self, category: SourceCategory) -> Result<Vec<SourceDescriptor>> {
        let resp = self
            .authed(self.http.get(self.rest("blog_topic_sources")))
            .query(&[
                ("select", "*".to_string()),
                ("source_type", format!("eq.{}", category.as_str())),
                ("active", "eq.true".to_string()),
                ("order", "priority.desc".to_string()),
            ])
            .send()
            .await
            .context("fetching active sources")?
            .error_for_status()
            .context("active sources query failed")?;

        resp.json().await.context("parsing source rows")
    }

    async fn refresh_from_feed(
        &self,
        source: &SourceDescriptor,
        limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let url = source
            .url
            .as_deref()
            .context("source has no feed url")?;

        let xml = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching feed {}", source.name))?
            .error_for_status()
            .with_context(|| format!("feed {} returned an error status", source.name))?
            .text()
            .await
            .context("reading feed body")?;

        let entries = feed::parse_rss(&xml)?;
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .take(limit)
            .map(|e| {
                json!({
                    "source_id": source.id,
                    "guid": e.guid,
                    "title": e.title,
                    "summary": e.summary,
                    "url": e.url,
                    "published_at": e.published_at,
                    "source_name": source.name,
                })
            })
            .collect();

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let resp = self
            .authed(self.http.post(self.rest("blog_topic_items")))
            .query(&[("on_conflict", "guid")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&rows)
            .send()
            .await
            .context("inserting feed items")?
            .error_for_status()
            .context("feed item insert failed")?;

        let inserted: Vec<ItemRow> = resp.json().await.context("parsing inserted rows")?;
        tracing::info!(
            source = %source.name,
            fetched = entries.len(),
            inserted = inserted.len(),
            "feed refresh"
        );

        Ok(inserted
            .into_iter()
            .map(|row| SourceItem {
                id: row.id,
                title: row.title,
                summary: row.summary.unwrap_or_default(),
                url: row.url,
                category: source.category,
                published_at: row.published_at,
                source_name: row.source_name.or_else(|| Some(source.name.clone())),
            })
            .collect())
    }
}
