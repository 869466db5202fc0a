// src/select.rs
// Source selection: fill the configured category mix from the catalog, with
// the pre-screened + sampled syndicated-news path and a backfill pass when a
// category comes up short.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::catalog::{SourceCategory, SourceItem, TopicCatalog};
use crate::error::RalphError;
use crate::prescreen::MajorNewsScreen;

/// Items fetched per source during the backfill feed-refresh sweep.
const REFRESH_BATCH: usize = 10;

#[derive(Debug, Clone)]
pub struct Selection {
    pub items: Vec<SourceItem>,
    pub counts: BTreeMap<SourceCategory, usize>,
    pub prescreen_cost_cents: u32,
}

pub struct SourceSelector {
    catalog: Arc<dyn TopicCatalog>,
    prescreen: MajorNewsScreen,
    rss_pool_size: usize,
    min_items: usize,
}

impl SourceSelector {
    pub fn new(
        catalog: Arc<dyn TopicCatalog>,
        prescreen: MajorNewsScreen,
        rss_pool_size: usize,
        min_items: usize,
    ) -> Self {
        Self {
            catalog,
            prescreen,
            rss_pool_size,
            min_items,
        }
    }

    /// Fill the mix in priority order, dedupe by id, backfill a shortfall,
    /// and fail the run if the overall minimum still cannot be met.
    pub async fn select(&self, targets: &BTreeMap<SourceCategory, usize>) -> Result<Selection> {
        let mut selected: Vec<SourceItem> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut prescreen_cost_cents = 0u32;

        for category in SourceCategory::PRIORITY {
            let desired = targets.get(&category).copied().unwrap_or(0);
            if desired == 0 {
                continue;
            }
            let picked = if category == SourceCategory::Rss {
                let (items, cost) = self.pick_rss(desired, &seen).await?;
                prescreen_cost_cents += cost;
                items
            } else {
                self.pick_plain(category, desired, &seen).await?
            };
            for item in picked {
                if seen.insert(item.id.clone()) {
                    selected.push(item);
                }
            }
        }

        if selected.len() < self.min_items {
            self.refresh_feeds_best_effort().await;
            self.backfill(&mut selected, &mut seen).await?;
        }

        if selected.len() < self.min_items {
            return Err(RalphError::SourceShortage {
                needed: self.min_items,
                found: selected.len(),
            }
            .into());
        }

        let mut counts: BTreeMap<SourceCategory, usize> = BTreeMap::new();
        for item in &selected {
            *counts.entry(item.category).or_default() += 1;
        }
        info!(total = selected.len(), ?counts, "sources selected");

        Ok(Selection {
            items: selected,
            counts,
            prescreen_cost_cents,
        })
    }

    /// Syndicated news: pull a larger pool, reserve at most one slot for the
    /// top pre-screened story, fill the rest by uniform random sampling so the
    /// newest items do not monopolize every post.
    async fn pick_rss(
        &self,
        desired: usize,
        seen: &HashSet<String>,
    ) -> Result<(Vec<SourceItem>, u32)> {
        let pool: Vec<SourceItem> = self
            .catalog
            .fetch_unused(SourceCategory::Rss, self.rss_pool_size + seen.len())
            .await?
            .into_iter()
            .filter(|item| !seen.contains(&item.id))
            .take(self.rss_pool_size)
            .collect();

        if pool.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let outcome = self.prescreen.screen(&pool).await?;

        let mut picked: Vec<SourceItem> = Vec::with_capacity(desired);
        if let Some(major) = outcome.major_index {
            if desired > 0 {
                picked.push(pool[major].clone());
            }
        }

        let mut rest: Vec<&SourceItem> = pool
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != outcome.major_index)
            .map(|(_, item)| item)
            .collect();
        rest.shuffle(&mut rand::rng());
        for item in rest.into_iter().take(desired.saturating_sub(picked.len())) {
            picked.push(item.clone());
        }

        Ok((picked, outcome.cost_cents))
    }

    async fn pick_plain(
        &self,
        category: SourceCategory,
        desired: usize,
        seen: &HashSet<String>,
    ) -> Result<Vec<SourceItem>> {
        Ok(self
            .catalog
            .fetch_unused(category, desired + seen.len())
            .await?
            .into_iter()
            .filter(|item| !seen.contains(&item.id))
            .take(desired)
            .collect())
    }

    /// One sweep over the active syndicated feeds. A failing feed is logged
    /// and skipped; it must not block items already on hand.
    async fn refresh_feeds_best_effort(&self) {
        let sources = match self.catalog.fetch_active_sources(SourceCategory::Rss).await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "could not list active feeds for refresh");
                return;
            }
        };
        for source in sources {
            match self.catalog.refresh_from_feed(&source, REFRESH_BATCH).await {
                Ok(fresh) => {
                    if !fresh.is_empty() {
                        info!(source = %source.name, count = fresh.len(), "feed refresh added items");
                    }
                }
                Err(e) => {
                    warn!(source = %source.name, error = %e, "feed refresh failed, skipping");
                }
            }
        }
    }

    /// Fill the remaining shortfall, first category able to supply wins.
    async fn backfill(
        &self,
        selected: &mut Vec<SourceItem>,
        seen: &mut HashSet<String>,
    ) -> Result<()> {
        for category in SourceCategory::PRIORITY {
            let needed = self.min_items.saturating_sub(selected.len());
            if needed == 0 {
                return Ok(());
            }
            let extra = self
                .catalog
                .fetch_unused(category, needed + seen.len())
                .await?;
            for item in extra {
                if selected.len() >= self.min_items {
                    break;
                }
                if seen.insert(item.id.clone()) {
                    selected.push(item);
                }
            }
        }
        Ok(())
    }
}
