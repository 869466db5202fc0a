// src/juice.rs
// The value gate: decide whether today's source material is worth a post at
// all. Deterministic freshness first (free), then one model pass for the
// newsworthiness verdict. The configured threshold is the authority; the
// model only advises.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::catalog::{SourceCategory, SourceItem};
use crate::cost::estimate_cost;
use crate::llm::{parse_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::prompts::SOURCE_JUICE_PROMPT;

const SUMMARY_TRUNCATE: usize = 500;

/// Score assumed when the model answers with something unparsable: a middling
/// pass, so one formatting hiccup does not block the pipeline.
const FAIL_OPEN_SCORE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct JuiceVerdict {
    pub proceed: bool,
    pub score: f64,
    pub reason: String,
    pub best_source: Option<String>,
    pub potential_angle: Option<String>,
    pub cost_cents: u32,
}

impl JuiceVerdict {
    fn stale(reason: String) -> Self {
        Self {
            proceed: false,
            score: 0.0,
            reason,
            best_source: None,
            potential_angle: None,
            cost_cents: 0,
        }
    }
}

pub struct JuiceGate {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u32,
    threshold: f64,
    freshness_window: Duration,
}

impl JuiceGate {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        max_tokens: u32,
        threshold: f64,
        freshness_window_hours: u64,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens,
            threshold,
            freshness_window: Duration::hours(freshness_window_hours as i64),
        }
    }

    pub async fn evaluate(&self, items: &[SourceItem]) -> Result<JuiceVerdict> {
        let (fresh, freshness_reason) = self.check_freshness(items, Utc::now());
        if !fresh {
            info!(reason = %freshness_reason, "juice gate: stale sources, skipping model call");
            return Ok(JuiceVerdict::stale(freshness_reason));
        }

        let source_items = items
            .iter()
            .enumerate()
            .map(|(i, item)| format_item(i + 1, item))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = SOURCE_JUICE_PROMPT.replace("{source_items}", &source_items);

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

        let mut verdict = match parse_json_object(&completion.text) {
            Ok(payload) => JuiceVerdict {
                proceed: payload
                    .get("should_proceed")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
                score: payload
                    .get("juice_score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0),
                reason: payload
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("no reason given")
                    .to_string(),
                best_source: payload
                    .get("best_source")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                potential_angle: payload
                    .get("potential_angle")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                cost_cents,
            },
            Err(e) => {
                // Fail open: a formatting hiccup must not kill the run.
                warn!(error = %e, "juice response unparsable, failing open");
                JuiceVerdict {
                    proceed: true,
                    score: FAIL_OPEN_SCORE,
                    reason: format!("Juice response was not valid JSON (failing open): {e}"),
                    best_source: None,
                    potential_angle: None,
                    cost_cents,
                }
            }
        };

        // The threshold overrides whatever the model claimed.
        if verdict.score < self.threshold {
            if verdict.proceed {
                verdict
                    .reason
                    .push_str(&format!(" (score below juice threshold {:.2})", self.threshold));
            }
            verdict.proceed = false;
        }

        info!(
            score = verdict.score,
            proceed = verdict.proceed,
            cost_cents = verdict.cost_cents,
            "juice gate verdict"
        );
        Ok(verdict)
    }

    /// Deterministic freshness. Evergreen always counts; dated items count
    /// within the window; undated items only when nothing in the set is dated
    /// and no evergreen item exists.
    pub fn check_freshness(&self, items: &[SourceItem], now: DateTime<Utc>) -> (bool, String) {
        if items.is_empty() {
            return (false, "No source items available".to_string());
        }

        let any_dated = items.iter().any(|i| i.published_at.is_some());
        let any_evergreen = items
            .iter()
            .any(|i| i.category == SourceCategory::Evergreen);

        let fresh_count = items
            .iter()
            .filter(|item| {
                if item.category == SourceCategory::Evergreen {
                    return true;
                }
                match item.published_at {
                    Some(ts) => now.signed_duration_since(ts) <= self.freshness_window,
                    None => !any_dated && !any_evergreen,
                }
            })
            .count();

        if fresh_count > 0 {
            (true, format!("{fresh_count}/{} sources are fresh", items.len()))
        } else {
            (
                false,
                format!(
                    "all {} sources are older than {} hours",
                    items.len(),
                    self.freshness_window.num_hours()
                ),
            )
        }
    }
}

fn format_item(index: usize, item: &SourceItem) -> String {
    let mut lines = vec![format!(
        "**Source {index} ({}):** {}",
        item.category.prompt_label(),
        item.title
    )];
    match item.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => lines.push(format!("URL: {url}")),
        None => lines.push("URL: No URL available (do not fabricate)".to_string()),
    }
    if let Some(ts) = item.published_at {
        lines.push(format!("Published: {}", ts.to_rfc3339()));
    }
    lines.push(format!("Summary: {}", truncate(&item.summary, SUMMARY_TRUNCATE)));
    lines.join("\n")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
