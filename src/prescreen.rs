// src/prescreen.rs
// Major-news pre-screen over the syndicated-news candidate pool. One cheap
// model pass; small pools skip it entirely because screening only pays for
// itself when there is something to choose between.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use crate::catalog::SourceItem;
use crate::cost::estimate_cost;
use crate::llm::{parse_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::prompts::MAJOR_NEWS_SCREENING_PROMPT;

/// Pools at or below this size are never screened.
const SMALL_POOL_MAX: usize = 4;

const SUMMARY_TRUNCATE: usize = 300;

/// Per-item screening verdict, index-aligned with the input pool.
#[derive(Debug, Clone)]
pub struct ItemScreen {
    pub urgency_score: f64,
    pub is_major_news: bool,
    pub reason: String,
}

impl Default for ItemScreen {
    fn default() -> Self {
        Self {
            urgency_score: 0.5,
            is_major_news: false,
            reason: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrescreenOutcome {
    /// One entry per pool item, in pool order.
    pub screens: Vec<ItemScreen>,
    /// Index of the single reserved-slot winner, if any item qualified.
    pub major_index: Option<usize>,
    pub cost_cents: u32,
}

impl PrescreenOutcome {
    fn neutral(pool_len: usize) -> Self {
        Self {
            screens: vec![ItemScreen::default(); pool_len],
            major_index: None,
            cost_cents: 0,
        }
    }
}

pub struct MajorNewsScreen {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u32,
    urgency_threshold: f64,
}

impl MajorNewsScreen {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        max_tokens: u32,
        urgency_threshold: f64,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens,
            urgency_threshold,
        }
    }

    pub async fn screen(&self, pool: &[SourceItem]) -> Result<PrescreenOutcome> {
        if pool.len() <= SMALL_POOL_MAX {
            return Ok(PrescreenOutcome::neutral(pool.len()));
        }

        let items_json = serde_json::to_string_pretty(
            &pool
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    json!({
                        "item_index": i,
                        "title": item.title,
                        "summary": truncate(&item.summary, SUMMARY_TRUNCATE),
                        "published_at": item.published_at,
                    })
                })
                .collect::<Vec<_>>(),
        )?;

        let prompt = MAJOR_NEWS_SCREENING_PROMPT.replace("{items_json}", &items_json);
        let completion = self
            .llm
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user(prompt)],
                system: None,
                max_tokens: self.max_tokens,
                model: self.model.clone(),
            })
            .await?;
        let cost_cents = estimate_cost(
            completion.input_tokens,
            completion.output_tokens,
            &self.model,
        );

        let mut outcome = match parse_json_object(&completion.text) {
            Ok(payload) => self.apply_results(pool.len(), &payload),
            Err(e) => {
                // Screening is advisory: a bad payload just means no reserved slot.
                warn!(error = %e, "major-news screening response unparsable");
                PrescreenOutcome::neutral(pool.len())
            }
        };
        outcome.cost_cents = cost_cents;

        if let Some(idx) = outcome.major_index {
            info!(
                index = idx,
                urgency = outcome.screens[idx].urgency_score,
                title = %pool[idx].title,
                "major news item reserved"
            );
        }
        Ok(outcome)
    }

    fn apply_results(&self, pool_len: usize, payload: &serde_json::Value) -> PrescreenOutcome {
        let mut screens = vec![ItemScreen::default(); pool_len];
        let results = payload
            .get("screening_results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for entry in results {
            let Some(index) = entry.get("item_index").and_then(|v| v.as_u64()) else {
                continue;
            };
            let index = index as usize;
            if index >= pool_len {
                continue;
            }
            screens[index] = ItemScreen {
                urgency_score: entry
                    .get("urgency_score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.5)
                    .clamp(0.0, 1.0),
                is_major_news: entry
                    .get("is_major_news")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                reason: entry
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            };
        }

        // Only flagged items over the urgency bar compete for the one slot.
        let major_index = screens
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_major_news && s.urgency_score >= self.urgency_threshold)
            .max_by(|(_, a), (_, b)| {
                a.urgency_score
                    .partial_cmp(&b.urgency_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);

        PrescreenOutcome {
            screens,
            major_index,
            cost_cents: 0,
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SourceCategory;
    use crate::llm::{Completion, MockLlm};

    fn item(id: &str) -> SourceItem {
        SourceItem {
            id: id.to_string(),
            title: format!("News {id}"),
            summary: "summary".to_string(),
            url: Some(format!("https://example.com/{id}")),
            category: SourceCategory::Rss,
            published_at: None,
            source_name: None,
        }
    }

    fn screen_with(text: &str) -> MajorNewsScreen {
        let llm = Arc::new(MockLlm {
            fixed: Completion {
                text: text.to_string(),
                input_tokens: 100_000,
                output_tokens: 20_000,
            },
        });
        MajorNewsScreen::new(llm, "claude-haiku-3-5", 2048, 0.7)
    }

    #[tokio::test]
    async fn small_pool_skips_the_model_entirely() {
        let screen = screen_with("should never be parsed");
        let pool: Vec<SourceItem> = (0..4).map(|i| item(&i.to_string())).collect();
        let out = screen.screen(&pool).await.unwrap();
        assert_eq!(out.cost_cents, 0);
        assert!(out.major_index.is_none());
        assert_eq!(out.screens.len(), 4);
        assert!((out.screens[0].urgency_score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn picks_highest_scoring_flagged_item_over_threshold() {
        let payload = r#"{"screening_results": [
            {"item_index": 0, "is_major_news": true, "urgency_score": 0.75, "reason": "tariffs"},
            {"item_index": 1, "is_major_news": true, "urgency_score": 0.92, "reason": "plant closure"},
            {"item_index": 2, "is_major_news": false, "urgency_score": 0.99, "reason": "not major"},
            {"item_index": 3, "is_major_news": true, "urgency_score": 0.4, "reason": "below bar"}
        ]}"#;
        let screen = screen_with(payload);
        let pool: Vec<SourceItem> = (0..5).map(|i| item(&i.to_string())).collect();
        let out = screen.screen(&pool).await.unwrap();
        assert_eq!(out.major_index, Some(1));
        assert!(out.cost_cents > 0, "real pass must report its cost");
    }

    #[tokio::test]
    async fn parse_failure_degrades_to_no_major_item() {
        let screen = screen_with("not json at all");
        let pool: Vec<SourceItem> = (0..6).map(|i| item(&i.to_string())).collect();
        let out = screen.screen(&pool).await.unwrap();
        assert!(out.major_index.is_none());
        assert!(out.cost_cents > 0, "tokens were still spent");
    }

    #[tokio::test]
    async fn out_of_range_indices_are_ignored() {
        let payload = r#"{"screening_results": [
            {"item_index": 99, "is_major_news": true, "urgency_score": 0.95, "reason": "bogus"}
        ]}"#;
        let screen = screen_with(payload);
        let pool: Vec<SourceItem> = (0..5).map(|i| item(&i.to_string())).collect();
        let out = screen.screen(&pool).await.unwrap();
        assert!(out.major_index.is_none());
    }
}
