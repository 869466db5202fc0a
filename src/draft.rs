// src/draft.rs
// Draft generation and revision. One strategy-specific prompt in, one parsed
// post payload out. An empty or malformed payload here is a contract
// violation and aborts the run.

use std::sync::Arc;

use anyhow::Result;

use crate::catalog::SourceItem;
use crate::cost::estimate_cost;
use crate::error::RalphError;
use crate::llm::{parse_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::prompts;
use crate::strategy::ContentStrategy;

/// Extra context the strategy screen produced for the prompt build.
#[derive(Debug, Clone, Default)]
pub struct StrategyContext {
    pub anchor_index: Option<usize>,
    pub theme_name: Option<String>,
    pub unifying_angle: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DraftPost {
    pub title: String,
    pub excerpt: String,
    pub content_markdown: String,
    pub source_urls: Vec<String>,
    pub tags: Vec<String>,
    pub cost_cents: u32,
}

#[derive(Debug, Clone)]
pub struct RevisedDraft {
    pub content_markdown: String,
    pub cost_cents: u32,
}

pub struct DraftAgent {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u32,
}

impl DraftAgent {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens,
        }
    }

    pub async fn draft(
        &self,
        items: &[SourceItem],
        strategy: Option<ContentStrategy>,
        context: &StrategyContext,
    ) -> Result<DraftPost> {
        if items.is_empty() {
            return Err(RalphError::ContentValidation("no items to draft from".into()).into());
        }

        let prompt = build_strategy_prompt(items, strategy, context);
        let completion = self.complete(prompt).await?;
        let cost_cents = self.cost_of(&completion);

        let payload = parse_json_object(&completion.text)
            .map_err(|e| RalphError::ContentValidation(format!("draft payload: {e}")))?;

        let title = required_post_string(&payload, "title")?;
        let content_markdown = content_field(&payload)?;

        Ok(DraftPost {
            title,
            excerpt: payload
                .get("excerpt")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            content_markdown,
            source_urls: string_list(&payload, "source_urls"),
            tags: string_list(&payload, "tags"),
            cost_cents,
        })
    }

    /// Revise a draft body against structured critique feedback.
    pub async fn revise(&self, content: &str, critique: &serde_json::Value) -> Result<RevisedDraft> {
        if content.trim().is_empty() {
            return Err(RalphError::ContentValidation("content must be non-empty".into()).into());
        }
        let critique_text = serde_json::to_string_pretty(critique)?;

        let prompt = prompts::improvement_prompt(&critique_text, content);
        let completion = self.complete(prompt).await?;
        let cost_cents = self.cost_of(&completion);

        let payload = parse_json_object(&completion.text)
            .map_err(|e| RalphError::ContentValidation(format!("revision payload: {e}")))?;
        let content_markdown = content_field(&payload)?;

        Ok(RevisedDraft {
            content_markdown,
            cost_cents,
        })
    }

    async fn complete(&self, prompt: String) -> Result<crate::llm::Completion> {
        self.llm
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user(prompt)],
                system: None,
                max_tokens: self.max_tokens,
                model: self.model.clone(),
            })
            .await
    }

    fn cost_of(&self, completion: &crate::llm::Completion) -> u32 {
        estimate_cost(completion.input_tokens, completion.output_tokens, &self.model)
    }
}

fn build_strategy_prompt(
    items: &[SourceItem],
    strategy: Option<ContentStrategy>,
    context: &StrategyContext,
) -> String {
    let sources_text = || {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| format_source_item(i + 1, item))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    match strategy {
        None => prompts::initial_draft_prompt(&sources_text()),
        Some(ContentStrategy::AnchorContext) => {
            let anchor_index = context.anchor_index.filter(|&i| i < items.len()).unwrap_or(0);
            let anchor_source = format_source_item(1, &items[anchor_index]);
            let context_sources = items
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != anchor_index)
                .enumerate()
                .map(|(n, (_, item))| format_source_item(n + 2, item))
                .collect::<Vec<_>>()
                .join("\n\n");
            let context_sources = if context_sources.is_empty() {
                "No additional context sources.".to_string()
            } else {
                context_sources
            };
            prompts::anchor_context_prompt(&anchor_source, &context_sources)
        }
        Some(ContentStrategy::Thematic) => {
            let theme = context.theme_name.as_deref().unwrap_or("Manufacturing");
            prompts::thematic_prompt(theme, &sources_text())
        }
        Some(ContentStrategy::Analysis) => {
            let angle = context
                .unifying_angle
                .as_deref()
                .unwrap_or("What these developments mean for machine shop operations");
            prompts::analysis_prompt(angle, &sources_text())
        }
        Some(ContentStrategy::DeepDive) => prompts::deep_dive_prompt(&sources_text()),
    }
}

/// Format one item for prompt injection, handling mixed source types.
fn format_source_item(index: usize, item: &SourceItem) -> String {
    let mut lines = vec![format!(
        "**Source {index} ({}):** {}",
        item.category.prompt_label(),
        item.title
    )];
    match item.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => lines.push(format!("URL: {url}")),
        None => lines.push("URL: No URL available (do not fabricate)".to_string()),
    }
    lines.push(format!("Summary: {}", item.summary));
    lines.join("\n")
}

fn required_post_string(payload: &serde_json::Value, key: &str) -> Result<String> {
    crate::llm::required_string(payload, key)
        .map_err(|e| RalphError::ContentValidation(e.to_string()).into())
}

/// `content_markdown` with a legacy `content` fallback.
fn content_field(payload: &serde_json::Value) -> Result<String> {
    for key in ["content_markdown", "content"] {
        if let Some(s) = payload.get(key).and_then(|v| v.as_str()) {
            if !s.trim().is_empty() {
                return Ok(s.to_string());
            }
        }
    }
    Err(RalphError::ContentValidation("content_markdown must be a non-empty string".into()).into())
}

fn string_list(payload: &serde_json::Value, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
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
                summary: format!("Summary {i}"),
                url: if i % 2 == 0 {
                    Some(format!("https://example.com/{i}"))
                } else {
                    None
                },
                category: SourceCategory::Rss,
                published_at: None,
                source_name: None,
            })
            .collect()
    }

    fn agent_with(text: &str) -> DraftAgent {
        let llm = Arc::new(MockLlm {
            fixed: Completion {
                text: text.to_string(),
                input_tokens: 500_000,
                output_tokens: 300_000,
            },
        });
        DraftAgent::new(llm, "claude-sonnet-4-5", 4096)
    }

    #[tokio::test]
    async fn parses_a_complete_post_payload() {
        let agent = agent_with(
            r###"{"title": "Tariffs Hit the Tool Crib", "excerpt": "What the new surcharge means.",
                "content_markdown": "## Body\n\ntext", "source_urls": ["https://example.com/0"],
                "tags": ["tariffs"]}"###,
        );
        let post = agent
            .draft(&items(2), None, &StrategyContext::default())
            .await
            .unwrap();
        assert_eq!(post.title, "Tariffs Hit the Tool Crib");
        assert_eq!(post.source_urls.len(), 1);
        assert!(post.cost_cents > 0);
    }

    #[tokio::test]
    async fn legacy_content_key_is_accepted() {
        let agent = agent_with(r###"{"title": "T is a Title Here", "content": "## Body"}"###);
        let post = agent
            .draft(&items(1), None, &StrategyContext::default())
            .await
            .unwrap();
        assert_eq!(post.content_markdown, "## Body");
    }

    #[tokio::test]
    async fn empty_title_is_a_content_validation_error() {
        let agent = agent_with(r###"{"title": "  ", "content_markdown": "## Body"}"###);
        let err = agent
            .draft(&items(1), None, &StrategyContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RalphError>(),
            Some(RalphError::ContentValidation(_))
        ));
    }

    #[tokio::test]
    async fn non_json_draft_is_fatal() {
        let agent = agent_with("I'd be happy to write that post!");
        let err = agent
            .draft(&items(1), None, &StrategyContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RalphError>(),
            Some(RalphError::ContentValidation(_))
        ));
    }

    #[tokio::test]
    async fn revision_returns_the_improved_body() {
        let agent = agent_with(
            r###"{"title": "T", "content_markdown": "## Better Body", "source_urls": []}"###,
        );
        let revised = agent
            .revise("## Old Body", &serde_json::json!({"main_issues": ["weak lead"]}))
            .await
            .unwrap();
        assert_eq!(revised.content_markdown, "## Better Body");
        assert!(revised.cost_cents > 0);
    }

    #[test]
    fn anchor_prompt_puts_the_anchor_first() {
        let pool = items(3);
        let ctx = StrategyContext {
            anchor_index: Some(2),
            ..Default::default()
        };
        let prompt = build_strategy_prompt(&pool, Some(ContentStrategy::AnchorContext), &ctx);
        assert!(prompt.contains("**Source 1 (RSS Feed):** Item 2"));
        assert!(prompt.contains("Item 0"));
    }

    #[test]
    fn missing_urls_are_flagged_not_fabricated() {
        let pool = items(2);
        let prompt = build_strategy_prompt(&pool, None, &StrategyContext::default());
        assert!(prompt.contains("URL: No URL available (do not fabricate)"));
    }
}
