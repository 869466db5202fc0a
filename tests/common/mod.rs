// tests/common/mod.rs
// Shared harness: scripted LLM + scorer, canned payloads, loop builder.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use shopfloor_ralph::catalog::memory::MemoryCatalog;
use shopfloor_ralph::catalog::{SourceCategory, SourceItem, TopicCatalog};
use shopfloor_ralph::llm::{Completion, CompletionRequest, LlmClient};
use shopfloor_ralph::quality::DraftScorer;
use shopfloor_ralph::store::memory::MemoryStore;
use shopfloor_ralph::store::BlogStore;
use shopfloor_ralph::{Collaborators, RalphConfig, RalphLoop};

// ------------------------------------------------------------
// Scripted LLM
// ------------------------------------------------------------

/// Pops one canned completion per call, recording the prompt it was asked.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Completion>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Completion>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// How many recorded prompts contain the given marker text.
    pub fn calls_matching(&self, marker: &str) -> usize {
        self.prompts
            .lock()
            .iter()
            .filter(|p| p.contains(marker))
            .count()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let prompt = request
            .messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().push(prompt);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted LLM ran out of responses"))
    }
}

/// Markers for counting which passes actually ran.
pub const CRITIQUE_MARKER: &str = "ruthless blog editor";
pub const REVISE_MARKER: &str = "revising a draft blog post";
pub const JUICE_MARKER: &str = "enough \"juice\"";
pub const STRATEGY_MARKER: &str = "recommend a content strategy";

// ------------------------------------------------------------
// Scripted scorer
// ------------------------------------------------------------

/// Pops a scripted score per call; repeats the last one when exhausted.
pub struct ScriptedScorer {
    scores: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl ScriptedScorer {
    pub fn new(scores: Vec<f64>) -> Self {
        Self {
            scores: Mutex::new(scores.into()),
            last: Mutex::new(0.0),
        }
    }
}

impl DraftScorer for ScriptedScorer {
    fn score(&self, _title: &str, _content: &str) -> f64 {
        match self.scores.lock().pop_front() {
            Some(score) => {
                *self.last.lock() = score;
                score
            }
            None => *self.last.lock(),
        }
    }
}

// ------------------------------------------------------------
// Canned payloads
// ------------------------------------------------------------

pub fn completion(text: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Completion {
    Completion {
        text: text.into(),
        input_tokens,
        output_tokens,
    }
}

/// Token counts chosen so each pass has a small, exact cost on the default
/// model tiers (sonnet for juice/draft/critique, haiku for screening).
pub fn juice_completion(score: f64, proceed: bool) -> Completion {
    completion(
        format!(
            r#"{{"juice_score": {score}, "should_proceed": {proceed}, "reason": "scripted verdict",
                "best_source": "Item r0", "potential_angle": "tariffs and the tool crib"}}"#
        ),
        10_000,
        2_000,
    ) // 6 cents on sonnet
}

pub fn strategy_completion(strategy: &str, recommended: &[usize]) -> Completion {
    let indices = serde_json::to_string(recommended).unwrap();
    completion(
        format!(
            r#"{{"strategy": "{strategy}", "strategy_reason": "scripted strategy",
                "recommended_indices": {indices}, "theme_clusters": {{"tariffs": {indices}}},
                "item_scores": [], "anchor_index": null, "unifying_angle": null}}"#
        ),
        40_000,
        8_000,
    ) // 2 cents on haiku
}

pub fn draft_completion(title: &str) -> Completion {
    completion(
        format!(
            r###"{{"title": "{title}", "excerpt": "What this week means on the floor.",
                "content_markdown": "## Lead\n\nShop talk.\n\n## Sources\n\n- [a](https://example.com/a)",
                "source_urls": ["https://example.com/a"], "tags": ["news"]}}"###
        ),
        20_000,
        4_000,
    ) // 12 cents on sonnet
}

pub fn critique_completion(score: f64) -> Completion {
    completion(
        format!(
            r#"{{"quality_score": {score}, "ai_slop_detected": false, "ai_slop_terms": [],
                "main_issues": ["lead is soft"], "improvements": ["open with the number"],
                "strengths": ["tone"]}}"#
        ),
        20_000,
        4_000,
    ) // 12 cents on sonnet
}

pub fn revise_completion() -> Completion {
    completion(
        r###"{"title": "Revised Title Goes Here", "excerpt": "Tighter.",
            "content_markdown": "## Sharper Lead\n\nBetter shop talk.\n\n## Sources\n\n- [a](https://example.com/a)",
            "source_urls": ["https://example.com/a"]}"###,
        20_000,
        4_000,
    ) // 12 cents on sonnet
}

// ------------------------------------------------------------
// Fixtures + loop builder
// ------------------------------------------------------------

pub fn rss_item(id: &str) -> SourceItem {
    SourceItem {
        id: id.to_string(),
        title: format!("News {id}"),
        summary: format!("Summary for {id}"),
        url: Some(format!("https://example.com/{id}")),
        category: SourceCategory::Rss,
        published_at: Some(Utc::now() - Duration::hours(1)),
        source_name: Some("Wire".to_string()),
    }
}

pub fn evergreen_item(id: &str) -> SourceItem {
    SourceItem {
        id: id.to_string(),
        title: format!("Evergreen {id}"),
        summary: "Always relevant shop topic".to_string(),
        url: None,
        category: SourceCategory::Evergreen,
        published_at: None,
        source_name: None,
    }
}

/// Default test config: generous budget, every day a posting day.
pub fn test_config() -> RalphConfig {
    RalphConfig {
        cost_limit_cents: 10_000,
        max_iterations: 5,
        source_mix: BTreeMap::from([
            (SourceCategory::Rss, 4),
            (SourceCategory::Evergreen, 1),
        ]),
        ..Default::default()
    }
}

pub struct Harness {
    pub catalog: Arc<MemoryCatalog>,
    pub store: Arc<MemoryStore>,
    pub llm: Arc<ScriptedLlm>,
    pub ralph: RalphLoop,
}

pub fn harness(
    config: RalphConfig,
    items: Vec<SourceItem>,
    responses: Vec<Completion>,
    scores: Vec<f64>,
) -> Harness {
    let catalog = Arc::new(MemoryCatalog::with_items(items));
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(ScriptedLlm::new(responses));
    let ralph = RalphLoop::new(
        config,
        Collaborators {
            catalog: Arc::clone(&catalog) as Arc<dyn TopicCatalog>,
            store: Arc::clone(&store) as Arc<dyn BlogStore>,
            llm: Arc::clone(&llm) as Arc<dyn LlmClient>,
            scorer: Arc::new(ScriptedScorer::new(scores)),
        },
    )
    .expect("loop construction");
    Harness {
        catalog,
        store,
        llm,
        ralph,
    }
}

/// The standard five-item shop pool: 4 fresh news items + 1 evergreen.
pub fn standard_pool() -> Vec<SourceItem> {
    vec![
        rss_item("r0"),
        rss_item("r1"),
        rss_item("r2"),
        rss_item("r3"),
        evergreen_item("e0"),
    ]
}
