// src/critique.rs
// LLM critique of a draft. The parse here is strict: a critique without the
// required fields must fail rather than fabricate a score.

use std::sync::Arc;

use anyhow::Result;

use crate::cost::estimate_cost;
use crate::error::RalphError;
use crate::llm::{parse_json_object, ChatMessage, CompletionRequest, LlmClient};
use crate::prompts;
use crate::quality::AI_SLOP_KEYWORDS;

#[derive(Debug, Clone)]
pub struct Critique {
    pub quality_score: f64,
    pub ai_slop_detected: bool,
    pub ai_slop_terms: Vec<String>,
    pub main_issues: Vec<String>,
    pub improvements: Vec<String>,
    pub strengths: Vec<String>,
    pub cost_cents: u32,
    /// Full parsed payload, fed verbatim into the revision prompt and the
    /// iteration row.
    pub raw: serde_json::Value,
}

pub struct CritiqueAgent {
    llm: Arc<dyn LlmClient>,
    model: String,
    max_tokens: u32,
}

impl CritiqueAgent {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            llm,
            model: model.into(),
            max_tokens,
        }
    }

    pub async fn critique(&self, title: &str, content: &str, current_score: f64) -> Result<Critique> {
        if title.trim().is_empty() {
            return Err(RalphError::ContentValidation("title must be non-empty".into()).into());
        }
        if content.trim().is_empty() {
            return Err(RalphError::ContentValidation("content must be non-empty".into()).into());
        }

        let slop_list = AI_SLOP_KEYWORDS
            .iter()
            .map(|kw| format!("- {kw}"))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::critique_prompt(title, content, current_score, &slop_list);

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

        let payload = parse_json_object(&completion.text)
            .map_err(|e| RalphError::ContentValidation(format!("critique payload: {e}")))?;
        parse_critique(payload, cost_cents)
    }
}

fn parse_critique(payload: serde_json::Value, cost_cents: u32) -> Result<Critique> {
    let quality_score = payload
        .get("quality_score")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| RalphError::ContentValidation("Missing required field: quality_score".into()))?;
    if !(0.0..=1.0).contains(&quality_score) {
        return Err(RalphError::ContentValidation(format!(
            "quality_score must be between 0.0 and 1.0, got {quality_score}"
        ))
        .into());
    }

    let ai_slop_detected = payload
        .get("ai_slop_detected")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| {
            RalphError::ContentValidation("Missing required field: ai_slop_detected".into())
        })?;

    let list = |key: &str| -> Vec<String> {
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
    };

    Ok(Critique {
        quality_score,
        ai_slop_detected,
        ai_slop_terms: list("ai_slop_terms"),
        main_issues: list("main_issues"),
        improvements: list("improvements"),
        strengths: list("strengths"),
        cost_cents,
        raw: payload,
    })
}
