// src/store/http.rs
// Supabase (PostgREST) backed store over blog_posts/blog_content_drafts/
// agent_activity_log. The drafts table carries a unique constraint on
// (blog_post_id, iteration_number); a violation surfaces here as an error.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::RalphError;

use super::{ActivityEntry, BlogStore, IterationRow, NewPost, PostUpdate};

pub struct SupabaseStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

impl SupabaseStore {
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

    async fn insert_returning_id(&self, table: &str, body: serde_json::Value) -> Result<Uuid> {
        let resp = self
            .authed(self.http.post(self.rest(table)))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .with_context(|| format!("inserting into {table}"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{table} insert returned {status}: {text}");
        }

        let rows: Vec<IdRow> = resp
            .json()
            .await
            .with_context(|| format!("parsing {table} insert response"))?;
        rows.first()
            .map(|r| r.id)
            .with_context(|| format!("{table} insert returned no rows"))
    }
}

#[async_trait::async_trait]
impl BlogStore for SupabaseStore {
    async fn create_post(&self, new: NewPost<'_>) -> Result<Uuid> {
        self.insert_returning_id(
            "blog_posts",
            json!({
                "title": new.title,
                "content": new.content,
                "status": new.status.as_str(),
                "excerpt": new.excerpt,
                "tags": new.tags,
            }),
        )
        .await
    }

    async fn update_post(&self, post_id: Uuid, update: PostUpdate) -> Result<()> {
        self.authed(self.http.patch(self.rest("blog_posts")))
            .query(&[("id", format!("eq.{post_id}"))])
            .json(&update)
            .send()
            .await
            .context("updating blog post")?
            .error_for_status()
            .context("blog post update failed")?;
        Ok(())
    }

    async fn save_iteration(&self, row: IterationRow<'_>) -> Result<Uuid> {
        let body = json!({
            "blog_post_id": row.post_id,
            "iteration_number": row.iteration_number,
            "title": row.title,
            "content": row.content,
            "quality_score": row.quality_score,
            "critique": row.critique,
            "api_cost_cents": row.cost_cents,
        });

        let resp = self
            .authed(self.http.post(self.rest("blog_content_drafts")))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .context("inserting draft iteration")?;

        let status = resp.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(RalphError::DuplicateIteration {
                post_id: row.post_id,
                iteration: row.iteration_number,
            }
            .into());
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("draft iteration insert returned {status}: {text}");
        }

        let rows: Vec<IdRow> = resp.json().await.context("parsing draft insert response")?;
        rows.first()
            .map(|r| r.id)
            .context("draft insert returned no rows")
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<Uuid> {
        self.insert_returning_id(
            "agent_activity_log",
            serde_json::to_value(&entry).context("serializing activity entry")?,
        )
        .await
    }

    async fn post_exists_on(&self, date: NaiveDate) -> Result<bool> {
        let next = date
            .succ_opt()
            .context("date overflow computing day boundary")?;

        let resp = self
            .authed(self.http.get(self.rest("blog_posts")))
            .query(&[
                ("select", "id".to_string()),
                ("created_at", format!("gte.{date}T00:00:00Z")),
                ("created_at", format!("lt.{next}T00:00:00Z")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .context("checking for an existing post today")?
            .error_for_status()
            .context("existing-post query failed")?;

        let rows: Vec<IdRow> = resp.json().await.context("parsing existing-post rows")?;
        Ok(!rows.is_empty())
    }
}
