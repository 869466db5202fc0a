// src/catalog/memory.rs
// In-memory catalog: tests and local dry runs, no database required.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use uuid::Uuid;

use super::{SourceCategory, SourceDescriptor, SourceItem, TopicCatalog};

#[derive(Default)]
struct Inner {
    items: Vec<StoredItem>,
    sources: Vec<SourceDescriptor>,
    /// Items released by the next refresh call, keyed by source id.
    pending_refresh: HashMap<String, Vec<SourceItem>>,
}

struct StoredItem {
    item: SourceItem,
    used_by: Option<Uuid>,
}

pub struct MemoryCatalog {
    inner: Mutex<Inner>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_items(items: Vec<SourceItem>) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.add_item(item);
        }
        catalog
    }

    pub fn add_item(&self, item: SourceItem) {
        self.inner
            .lock()
            .expect("poisoned catalog")
            .items
            .push(StoredItem { item, used_by: None });
    }

    pub fn add_source(&self, source: SourceDescriptor) {
        self.inner.lock().expect("poisoned catalog").sources.push(source);
    }

    /// Queue items that will appear once `refresh_from_feed` runs for the
    /// given source id.
    pub fn queue_refresh(&self, source_id: impl Into<String>, items: Vec<SourceItem>) {
        self.inner
            .lock()
            .expect("poisoned catalog")
            .pending_refresh
            .insert(source_id.into(), items);
    }

    /// Which post consumed this item, if any. Test observer.
    pub fn used_by(&self, item_id: &str) -> Option<Uuid> {
        self.inner
            .lock()
            .expect("poisoned catalog")
            .items
            .iter()
            .find(|s| s.item.id == item_id)
            .and_then(|s| s.used_by)
    }

    pub fn unused_count(&self) -> usize {
        self.inner
            .lock()
            .expect("poisoned catalog")
            .items
            .iter()
            .filter(|s| s.used_by.is_none())
            .count()
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TopicCatalog for MemoryCatalog {
    async fn fetch_unused(&self, category: SourceCategory, limit: usize) -> Result<Vec<SourceItem>> {
        let inner = self.inner.lock().expect("poisoned catalog");
        Ok(inner
            .items
            .iter()
            .filter(|s| s.used_by.is_none() && s.item.category == category)
            .take(limit)
            .map(|s| s.item.clone())
            .collect())
    }

    async fn mark_used(
        &self,
        category: SourceCategory,
        item_ids: &[String],
        post_id: Uuid,
    ) -> Result<usize> {
        let mut inner = self.inner.lock().expect("poisoned catalog");
        let mut updated = 0;
        for stored in inner.items.iter_mut() {
            if stored.item.category == category
                && stored.used_by.is_none()
                && item_ids.contains(&stored.item.id)
            {
                stored.used_by = Some(post_id);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn fetch_active_sources(&self, category: SourceCategory) -> Result<Vec<SourceDescriptor>> {
        let inner = self.inner.lock().expect("poisoned catalog");
        let mut sources: Vec<SourceDescriptor> = inner
            .sources
            .iter()
            .filter(|s| s.category == category)
            .cloned()
            .collect();
        sources.sort_by_key(|s| std::cmp::Reverse(s.priority));
        Ok(sources)
    }

    async fn refresh_from_feed(
        &self,
        source: &SourceDescriptor,
        limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let mut inner = self.inner.lock().expect("poisoned catalog");
        let fresh = inner
            .pending_refresh
            .remove(&source.id)
            .unwrap_or_default();
        let fresh: Vec<SourceItem> = fresh.into_iter().take(limit).collect();
        for item in &fresh {
            inner.items.push(StoredItem {
                item: item.clone(),
                used_by: None,
            });
        }
        Ok(fresh)
    }
}
