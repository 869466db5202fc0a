// src/store/memory.rs
// In-memory store: tests and local dry runs.

use std::sync::Mutex;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::RalphError;

use super::{ActivityEntry, BlogStore, IterationRow, NewPost, Post, PostStatus, PostUpdate};

#[derive(Debug, Clone)]
pub struct StoredIteration {
    pub id: Uuid,
    pub post_id: Uuid,
    pub iteration_number: u32,
    pub title: String,
    pub content: String,
    pub quality_score: f64,
    pub critique: serde_json::Value,
    pub cost_cents: u32,
}

#[derive(Default)]
struct Inner {
    posts: Vec<Post>,
    iterations: Vec<StoredIteration>,
    activities: Vec<ActivityEntry>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    // ---- test observers ----

    pub fn posts(&self) -> Vec<Post> {
        self.inner.lock().expect("poisoned store").posts.clone()
    }

    pub fn post(&self, id: Uuid) -> Option<Post> {
        self.inner
            .lock()
            .expect("poisoned store")
            .posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn iterations_for(&self, post_id: Uuid) -> Vec<StoredIteration> {
        let mut rows: Vec<StoredIteration> = self
            .inner
            .lock()
            .expect("poisoned store")
            .iterations
            .iter()
            .filter(|i| i.post_id == post_id)
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.iteration_number);
        rows
    }

    pub fn activities(&self) -> Vec<ActivityEntry> {
        self.inner.lock().expect("poisoned store").activities.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BlogStore for MemoryStore {
    async fn create_post(&self, new: NewPost<'_>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let post = Post {
            id,
            title: new.title.to_string(),
            content: new.content.to_string(),
            status: new.status,
            excerpt: new.excerpt.to_string(),
            created_at: Utc::now(),
            published_at: None,
            failure_reason: None,
        };
        self.inner.lock().expect("poisoned store").posts.push(post);
        Ok(id)
    }

    async fn update_post(&self, post_id: Uuid, update: PostUpdate) -> Result<()> {
        let mut inner = self.inner.lock().expect("poisoned store");
        let post = inner
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| anyhow::anyhow!("no post with id {post_id}"))?;

        if let Some(title) = update.title {
            post.title = title;
        }
        if let Some(content) = update.content {
            post.content = content;
        }
        if let Some(status) = update.status {
            // draft -> published/failed only; terminal states never move.
            if post.status == PostStatus::Draft {
                post.status = status;
            } else if post.status != status {
                anyhow::bail!(
                    "illegal status transition {} -> {}",
                    post.status.as_str(),
                    status.as_str()
                );
            }
        }
        if let Some(ts) = update.published_at {
            post.published_at = Some(ts);
        }
        if let Some(reason) = update.failure_reason {
            post.failure_reason = Some(reason);
        }
        Ok(())
    }

    async fn save_iteration(&self, row: IterationRow<'_>) -> Result<Uuid> {
        let mut inner = self.inner.lock().expect("poisoned store");
        let duplicate = inner
            .iterations
            .iter()
            .any(|i| i.post_id == row.post_id && i.iteration_number == row.iteration_number);
        if duplicate {
            return Err(RalphError::DuplicateIteration {
                post_id: row.post_id,
                iteration: row.iteration_number,
            }
            .into());
        }

        let id = Uuid::new_v4();
        inner.iterations.push(StoredIteration {
            id,
            post_id: row.post_id,
            iteration_number: row.iteration_number,
            title: row.title.to_string(),
            content: row.content.to_string(),
            quality_score: row.quality_score,
            critique: row.critique,
            cost_cents: row.cost_cents,
        });
        Ok(id)
    }

    async fn log_activity(&self, entry: ActivityEntry) -> Result<Uuid> {
        self.inner
            .lock()
            .expect("poisoned store")
            .activities
            .push(entry);
        Ok(Uuid::new_v4())
    }

    async fn post_exists_on(&self, date: NaiveDate) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .expect("poisoned store")
            .posts
            .iter()
            .any(|p| p.created_at.date_naive() == date))
    }
}
