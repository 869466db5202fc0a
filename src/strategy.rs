// src/strategy.rs
// Content-strategy screening: one cheap model pass that clusters the selected
// items, scores urgency, and recommends the narrative shape of the post.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

use crate::catalog::SourceItem;
use crate::cost::estimate_cost;
use crate::llm::{parse_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::prompts::STRATEGY_SCREENING_PROMPT;

const SUMMARY_TRUNCATE: usize = 300;

/// Narrative shape of the post. Closed set; the text->variant mapping below
/// is total, with `Analysis` as the one documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStrategy {
    /// One dominant story, everything else is context.
    AnchorContext,
    /// Multiple sources on one theme.
    Thematic,
    /// Scattered sources tied together by a shop-floor angle.
    Analysis,
    /// One or two sources treated in depth.
    DeepDive,
}

impl ContentStrategy {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "anchor_context" => ContentStrategy::AnchorContext,
            "thematic" => ContentStrategy::Thematic,
            "analysis" => ContentStrategy::Analysis,
            "deep_dive" => ContentStrategy::DeepDive,
            _ => ContentStrategy::Analysis,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStrategy::AnchorContext => "anchor_context",
            ContentStrategy::Thematic => "thematic",
            ContentStrategy::Analysis => "analysis",
            ContentStrategy::DeepDive => "deep_dive",
        }
    }

    /// How many items each narrative shape can actually use.
    pub fn max_items(&self) -> usize {
        match self {
            ContentStrategy::AnchorContext => 4,
            ContentStrategy::Thematic => 4,
            ContentStrategy::Analysis => 5,
            ContentStrategy::DeepDive => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemAnnotation {
    pub item_index: usize,
    pub urgency_score: f64,
    pub themes: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct StrategyDecision {
    pub strategy: ContentStrategy,
    pub reason: String,
    pub anchor_index: Option<usize>,
    pub theme_clusters: BTreeMap<String, Vec<usize>>,
    /// Valid indices into the classified slice, model-preferred order.
    pub recommended_indices: Vec<usize>,
    pub item_scores: Vec<ItemAnnotation>,
    pub unifying_angle: Option<String>,
    pub cost_cents: u32,
}

impl StrategyDecision {
    fn fallback(strategy: ContentStrategy, reason: String, item_count: usize) -> Self {
        Self {
            strategy,
            reason,
            anchor_index: None,
            theme_clusters: BTreeMap::new(),
            recommended_indices: (0..item_count).collect(),
            item_scores: Vec::new(),
            unifying_angle: None,
            cost_cents: 0,
        }
    }

    /// Name of the theme cluster that best covers the recommended items.
    pub fn dominant_theme(&self) -> Option<String> {
        self.theme_clusters
            .iter()
            .max_by_key(|(_, indices)| {
                indices
                    .iter()
                    .filter(|i| self.recommended_indices.contains(i))
                    .count()
            })
            .map(|(name, _)| name.clone())
    }
}

pub struct StrategyClassifier {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u32,
}

impl StrategyClassifier {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens,
        }
    }

    pub async fn classify(&self, items: &[SourceItem]) -> Result<StrategyDecision> {
        // Degenerate pools have exactly one sensible shape.
        if items.len() <= 1 {
            return Ok(StrategyDecision::fallback(
                ContentStrategy::DeepDive,
                "pool too small to screen; going deep on what we have".to_string(),
                items.len(),
            ));
        }

        let items_json = serde_json::to_string_pretty(
            &items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    json!({
                        "item_index": i,
                        "source_type": item.category.as_str(),
                        "title": item.title,
                        "summary": truncate(&item.summary, SUMMARY_TRUNCATE),
                        "published_at": item.published_at,
                    })
                })
                .collect::<Vec<_>>(),
        )?;
        let prompt = STRATEGY_SCREENING_PROMPT.replace("{items_json}", &items_json);

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

        let mut decision = match parse_json_object(&completion.text) {
            Ok(payload) => parse_decision(&payload, items.len()),
            Err(e) => {
                // Fail open into the most generic shape, with every item.
                warn!(error = %e, "strategy response unparsable, defaulting to analysis");
                StrategyDecision::fallback(
                    ContentStrategy::Analysis,
                    format!("Strategy response was not valid JSON (defaulting to analysis): {e}"),
                    items.len(),
                )
            }
        };
        decision.cost_cents = cost_cents;

        info!(
            strategy = decision.strategy.as_str(),
            recommended = decision.recommended_indices.len(),
            cost_cents = decision.cost_cents,
            "strategy decision"
        );
        Ok(decision)
    }
}

fn parse_decision(payload: &serde_json::Value, item_count: usize) -> StrategyDecision {
    let strategy = payload
        .get("strategy")
        .and_then(|v| v.as_str())
        .map(ContentStrategy::from_label)
        .unwrap_or(ContentStrategy::Analysis);

    let reason = payload
        .get("strategy_reason")
        .and_then(|v| v.as_str())
        .unwrap_or("no reason given")
        .to_string();

    let anchor_index = payload
        .get("anchor_index")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .filter(|&i| i < item_count);

    let mut theme_clusters: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    if let Some(clusters) = payload.get("theme_clusters").and_then(|v| v.as_object()) {
        for (name, indices) in clusters {
            let valid: Vec<usize> = indices
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_u64())
                        .map(|v| v as usize)
                        .filter(|&i| i < item_count)
                        .collect()
                })
                .unwrap_or_default();
            if !valid.is_empty() {
                theme_clusters.insert(name.clone(), valid);
            }
        }
    }

    // Keep only valid indices, drop duplicates, preserve the model's order.
    let mut recommended_indices: Vec<usize> = Vec::new();
    if let Some(arr) = payload.get("recommended_indices").and_then(|v| v.as_array()) {
        for v in arr {
            if let Some(i) = v.as_u64().map(|v| v as usize).filter(|&i| i < item_count) {
                if !recommended_indices.contains(&i) {
                    recommended_indices.push(i);
                }
            }
        }
    }
    if recommended_indices.is_empty() {
        recommended_indices = (0..item_count).collect();
    }

    let item_scores = payload
        .get("item_scores")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    let item_index =
                        entry.get("item_index").and_then(|v| v.as_u64())? as usize;
                    if item_index >= item_count {
                        return None;
                    }
                    Some(ItemAnnotation {
                        item_index,
                        urgency_score: entry
                            .get("urgency_score")
                            .and_then(|v| v.as_f64())
                            .unwrap_or(0.5)
                            .clamp(0.0, 1.0),
                        themes: entry
                            .get("themes")
                            .and_then(|v| v.as_array())
                            .map(|ts| {
                                ts.iter()
                                    .filter_map(|t| t.as_str())
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default(),
                        summary: entry
                            .get("summary")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let unifying_angle = payload
        .get("unifying_angle")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    StrategyDecision {
        strategy,
        reason,
        anchor_index,
        theme_clusters,
        recommended_indices,
        item_scores,
        unifying_angle,
        cost_cents: 0,
    }
}

/// Apply the per-strategy item cap, anchor first for anchor_context.
pub fn filter_items(items: &[SourceItem], decision: &StrategyDecision) -> Vec<SourceItem> {
    let mut order: Vec<usize> = decision.recommended_indices.clone();

    if decision.strategy == ContentStrategy::AnchorContext {
        if let Some(anchor) = decision.anchor_index {
            order.retain(|&i| i != anchor);
            order.insert(0, anchor);
        }
    }

    order
        .into_iter()
        .take(decision.strategy.max_items())
        .filter_map(|i| items.get(i).cloned())
        .collect()
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

    fn items(n: usize) -> Vec<SourceItem> {
        (0..n)
            .map(|i| SourceItem {
                id: format!("i{i}"),
                title: format!("Item {i}"),
                summary: "summary".to_string(),
                url: None,
                category: SourceCategory::Rss,
                published_at: None,
                source_name: None,
            })
            .collect()
    }

    fn classifier_with(text: &str) -> StrategyClassifier {
        let llm = Arc::new(MockLlm {
            fixed: Completion {
                text: text.to_string(),
                input_tokens: 150_000,
                output_tokens: 30_000,
            },
        });
        StrategyClassifier::new(llm, "claude-haiku-3-5", 2048)
    }

    #[test]
    fn label_mapping_is_total_with_analysis_default() {
        assert_eq!(
            ContentStrategy::from_label("anchor_context"),
            ContentStrategy::AnchorContext
        );
        assert_eq!(ContentStrategy::from_label("THEMATIC"), ContentStrategy::Thematic);
        assert_eq!(ContentStrategy::from_label("deep_dive"), ContentStrategy::DeepDive);
        assert_eq!(
            ContentStrategy::from_label("listicle"),
            ContentStrategy::Analysis,
            "unknown labels take the generic default"
        );
    }

    #[tokio::test]
    async fn single_item_pool_is_a_deep_dive_without_a_model_call() {
        let classifier = classifier_with("never parsed");
        let decision = classifier.classify(&items(1)).await.unwrap();
        assert_eq!(decision.strategy, ContentStrategy::DeepDive);
        assert_eq!(decision.cost_cents, 0);
        assert_eq!(decision.recommended_indices, vec![0]);
    }

    #[tokio::test]
    async fn parses_a_full_screening_payload() {
        let payload = r#"{
            "item_scores": [
                {"item_index": 0, "urgency_score": 0.9, "themes": ["tariffs"], "summary": "big"},
                {"item_index": 1, "urgency_score": 0.4, "themes": ["tooling"], "summary": "meh"}
            ],
            "theme_clusters": {"tariffs": [0, 2], "tooling": [1]},
            "strategy": "thematic",
            "strategy_reason": "two items share the tariffs theme",
            "anchor_index": null,
            "recommended_indices": [0, 2, 7],
            "unifying_angle": null
        }"#;
        let classifier = classifier_with(payload);
        let decision = classifier.classify(&items(3)).await.unwrap();
        assert_eq!(decision.strategy, ContentStrategy::Thematic);
        assert_eq!(decision.recommended_indices, vec![0, 2], "index 7 is invalid");
        assert_eq!(decision.dominant_theme().as_deref(), Some("tariffs"));
        assert!(decision.cost_cents > 0);
    }

    #[tokio::test]
    async fn parse_failure_defaults_to_analysis_with_all_items() {
        let classifier = classifier_with("```\nnot json\n```");
        let decision = classifier.classify(&items(4)).await.unwrap();
        assert_eq!(decision.strategy, ContentStrategy::Analysis);
        assert_eq!(decision.recommended_indices, vec![0, 1, 2, 3]);
        assert!(decision.cost_cents > 0, "tokens were still spent");
    }

    #[test]
    fn filter_caps_items_per_strategy() {
        let pool = items(6);
        let mut decision = StrategyDecision::fallback(
            ContentStrategy::Analysis,
            "test".into(),
            pool.len(),
        );
        assert_eq!(filter_items(&pool, &decision).len(), 5);

        decision.strategy = ContentStrategy::DeepDive;
        assert_eq!(filter_items(&pool, &decision).len(), 2);
    }

    #[test]
    fn anchor_moves_to_front_regardless_of_model_order() {
        let pool = items(5);
        let decision = StrategyDecision {
            strategy: ContentStrategy::AnchorContext,
            reason: "anchor test".into(),
            anchor_index: Some(3),
            theme_clusters: BTreeMap::new(),
            recommended_indices: vec![0, 1, 3, 4],
            item_scores: Vec::new(),
            unifying_angle: None,
            cost_cents: 0,
        };
        let filtered = filter_items(&pool, &decision);
        assert_eq!(filtered[0].id, "i3");
        assert_eq!(filtered.len(), 4);
    }

    #[test]
    fn invalid_anchor_is_dropped_at_parse_time() {
        let payload: serde_json::Value = serde_json::json!({
            "strategy": "anchor_context",
            "anchor_index": 42,
            "recommended_indices": [0, 1]
        });
        let decision = parse_decision(&payload, 3);
        assert_eq!(decision.anchor_index, None);
    }
}
