//! # RalphLoop
//! The generate/critique/refine orchestrator. Composes source selection, the
//! juice gate, strategy screening, drafting and critique under the run
//! guardrail, and decides the terminal disposition of the run.
//!
//! Expected outcomes (all skip variants, draft, published, failed) come back
//! as a `RunResult`; thrown errors are reserved for configuration problems,
//! source shortage, and model contract violations.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{Datelike, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{SourceCategory, TopicCatalog};
use crate::config::RalphConfig;
use crate::critique::CritiqueAgent;
use crate::draft::{DraftAgent, StrategyContext};
use crate::guardrail::RunGuardrail;
use crate::juice::JuiceGate;
use crate::llm::LlmClient;
use crate::prescreen::MajorNewsScreen;
use crate::quality::DraftScorer;
use crate::select::{Selection, SourceSelector};
use crate::store::{ActivityEntry, BlogStore, IterationRow, NewPost, PostStatus, PostUpdate};
use crate::strategy::{filter_items, ContentStrategy, StrategyClassifier};

/// Below this score a finished run is `failed` rather than `draft`, no matter
/// where the configurable publish threshold sits.
const DRAFT_FLOOR: f64 = 0.70;

/// Terminal status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Published,
    Draft,
    Failed,
    Skipped,
    SkippedNoValue,
    SkippedNotScheduled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Published => "published",
            RunStatus::Draft => "draft",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
            RunStatus::SkippedNoValue => "skipped_no_value",
            RunStatus::SkippedNotScheduled => "skipped_not_scheduled",
        }
    }

    /// Everything except `failed` is a success-like exit: declining to
    /// publish low-value content is the system working as intended.
    pub fn is_success(&self) -> bool {
        !matches!(self, RunStatus::Failed)
    }
}

/// What one run produced. Post id is `Uuid::nil()` when no row was created.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub post_id: Uuid,
    pub status: RunStatus,
    pub final_quality_score: f64,
    pub iteration_count: u32,
    pub total_cost_cents: u32,
    pub failure_reason: Option<String>,
    pub strategy: Option<ContentStrategy>,
    pub strategy_reason: Option<String>,
    pub source_summaries: Vec<String>,
}

impl RunResult {
    fn skipped(status: RunStatus, reason: impl Into<String>) -> Self {
        Self {
            post_id: Uuid::nil(),
            status,
            final_quality_score: 0.0,
            iteration_count: 0,
            total_cost_cents: 0,
            failure_reason: Some(reason.into()),
            strategy: None,
            strategy_reason: None,
            source_summaries: Vec::new(),
        }
    }
}

/// Everything external the loop talks to. Callers assemble real
/// implementations; tests wire in scripted ones. No ambient globals.
pub struct Collaborators {
    pub catalog: Arc<dyn TopicCatalog>,
    pub store: Arc<dyn BlogStore>,
    pub llm: Arc<dyn LlmClient>,
    pub scorer: Arc<dyn DraftScorer>,
}

pub struct RalphLoop {
    config: RalphConfig,
    catalog: Arc<dyn TopicCatalog>,
    store: Arc<dyn BlogStore>,
    scorer: Arc<dyn DraftScorer>,
    selector: SourceSelector,
    juice: JuiceGate,
    classifier: StrategyClassifier,
    drafter: DraftAgent,
    critic: CritiqueAgent,
}

impl RalphLoop {
    pub fn new(config: RalphConfig, deps: Collaborators) -> Result<Self> {
        config.validate()?;

        let prescreen = MajorNewsScreen::new(
            Arc::clone(&deps.llm),
            config.screening_model.clone(),
            config.screening_max_tokens,
            config.prescreen_urgency_threshold,
        );
        let selector = SourceSelector::new(
            Arc::clone(&deps.catalog),
            prescreen,
            config.rss_pool_size,
            config.min_items,
        );
        let juice = JuiceGate::new(
            Arc::clone(&deps.llm),
            config.model.clone(),
            1024,
            config.juice_threshold,
            config.freshness_window_hours,
        );
        let classifier = StrategyClassifier::new(
            Arc::clone(&deps.llm),
            config.screening_model.clone(),
            config.screening_max_tokens,
        );
        let drafter = DraftAgent::new(
            Arc::clone(&deps.llm),
            config.model.clone(),
            config.draft_max_tokens,
        );
        let critic = CritiqueAgent::new(
            Arc::clone(&deps.llm),
            config.model.clone(),
            config.draft_max_tokens,
        );

        Ok(Self {
            config,
            catalog: deps.catalog,
            store: deps.store,
            scorer: deps.scorer,
            selector,
            juice,
            classifier,
            drafter,
            critic,
        })
    }

    /// Run one generation cycle to its terminal disposition.
    pub async fn run(&self) -> Result<RunResult> {
        let guardrail = RunGuardrail::new(self.config.timeout_minutes, self.config.cost_limit_cents)?;
        let mut total_cost: u32 = 0;

        // 1) Idempotency: one post per day.
        if self.config.check_existing_today {
            let today = Utc::now().date_naive();
            if self.store.post_exists_on(today).await? {
                info!(%today, "post already exists for today, skipping");
                self.store
                    .log_activity(
                        ActivityEntry::new("idempotency_check", true)
                            .meta(json!({ "date": today.to_string(), "skipped": true })),
                    )
                    .await?;
                return Ok(RunResult::skipped(
                    RunStatus::Skipped,
                    format!("post already exists for {today}"),
                ));
            }
        }

        // 2) Posting-day schedule.
        if let Some(days) = &self.config.posting_days {
            let weekday = Utc::now().weekday();
            if !days.contains(&weekday) {
                info!(%weekday, "not a posting day, skipping");
                self.store
                    .log_activity(
                        ActivityEntry::new("schedule_check", true)
                            .meta(json!({ "weekday": weekday.to_string(), "skipped": true })),
                    )
                    .await?;
                return Ok(RunResult::skipped(
                    RunStatus::SkippedNotScheduled,
                    format!("{weekday} is not a posting day"),
                ));
            }
        }

        // 3) Source selection. A shortage here is fatal and pre-post.
        let started = Instant::now();
        let selection = match self.selector.select(&self.config.source_mix).await {
            Ok(selection) => selection,
            Err(e) => {
                self.store
                    .log_activity(
                        ActivityEntry::new("source_selection", false)
                            .duration(started.elapsed().as_millis() as u64)
                            .error_text(format!("{e:#}")),
                    )
                    .await?;
                return Err(e);
            }
        };
        total_cost += selection.prescreen_cost_cents;
        let source_summaries: Vec<String> =
            selection.items.iter().map(|i| i.summary_line()).collect();
        self.store
            .log_activity(
                ActivityEntry::new("source_selection", true)
                    .duration(started.elapsed().as_millis() as u64)
                    .meta(json!({
                        "total": selection.items.len(),
                        "counts": count_map(&selection),
                        "prescreen_cost_cents": selection.prescreen_cost_cents,
                    })),
            )
            .await?;

        // 4) Juice gate.
        let started = Instant::now();
        let verdict = self.juice.evaluate(&selection.items).await?;
        total_cost += verdict.cost_cents;
        self.store
            .log_activity(
                ActivityEntry::new("juice_evaluation", true)
                    .duration(started.elapsed().as_millis() as u64)
                    .meta(json!({
                        "score": verdict.score,
                        "proceed": verdict.proceed,
                        "reason": verdict.reason,
                        "best_source": verdict.best_source,
                        "cost_cents": verdict.cost_cents,
                    })),
            )
            .await?;
        if !verdict.proceed {
            info!(score = verdict.score, reason = %verdict.reason, "no value today, skipping");
            return Ok(RunResult {
                post_id: Uuid::nil(),
                status: RunStatus::SkippedNoValue,
                final_quality_score: verdict.score,
                iteration_count: 0,
                total_cost_cents: total_cost,
                failure_reason: Some(verdict.reason),
                strategy: None,
                strategy_reason: None,
                source_summaries,
            });
        }

        // 5) Strategy screening + item filtering.
        let started = Instant::now();
        let decision = self.classifier.classify(&selection.items).await?;
        total_cost += decision.cost_cents;
        let items = filter_items(&selection.items, &decision);
        self.store
            .log_activity(
                ActivityEntry::new("strategy_screening", true)
                    .duration(started.elapsed().as_millis() as u64)
                    .meta(json!({
                        "strategy": decision.strategy.as_str(),
                        "reason": decision.reason,
                        "items_used": items.len(),
                        "cost_cents": decision.cost_cents,
                    })),
            )
            .await?;

        let context = StrategyContext {
            // filter_items moved the anchor to the front.
            anchor_index: match (decision.strategy, decision.anchor_index) {
                (ContentStrategy::AnchorContext, Some(_)) => Some(0),
                _ => None,
            },
            theme_name: decision.dominant_theme(),
            unifying_angle: decision.unifying_angle.clone(),
        };

        // 6) First draft, post row, and consumption marking.
        let started = Instant::now();
        let draft = self
            .drafter
            .draft(&items, Some(decision.strategy), &context)
            .await?;
        total_cost += draft.cost_cents;

        let post_id = self
            .store
            .create_post(NewPost {
                title: &draft.title,
                content: &draft.content_markdown,
                status: PostStatus::Draft,
                excerpt: &draft.excerpt,
                tags: &draft.tags,
            })
            .await?;
        self.mark_items_used(&items, post_id).await?;
        self.store
            .log_activity(
                ActivityEntry::new("draft_generation", true)
                    .context(post_id)
                    .duration(started.elapsed().as_millis() as u64)
                    .meta(json!({
                        "title": draft.title,
                        "strategy": decision.strategy.as_str(),
                        "cost_cents": draft.cost_cents,
                    })),
            )
            .await?;

        // 7) Score the first draft, persist iteration 1.
        let title = draft.title;
        let mut body = draft.content_markdown;
        let mut score = self.scorer.score(&title, &body);
        let mut iteration: u32 = 1;
        self.persist_iteration(
            post_id,
            iteration,
            &title,
            &body,
            score,
            json!({ "note": "initial draft" }),
            draft.cost_cents,
        )
        .await?;

        // 8) Refine until the bar is cleared or a guardrail trips.
        let mut stop_reason: Option<String> = None;
        while score < self.config.quality_threshold {
            if iteration >= self.config.max_iterations {
                stop_reason = Some(format!(
                    "iteration ceiling reached ({} of {})",
                    iteration, self.config.max_iterations
                ));
                break;
            }
            if guardrail.timeout_exceeded() {
                stop_reason = Some(format!(
                    "timeout after {}s",
                    guardrail.elapsed().as_secs()
                ));
                break;
            }
            if guardrail.cost_exceeded(total_cost) {
                stop_reason = Some(format!(
                    "cost limit exceeded ({total_cost} > {} cents)",
                    self.config.cost_limit_cents
                ));
                break;
            }

            let critique = self.critic.critique(&title, &body, score).await?;
            total_cost += critique.cost_cents;

            // Critique itself costs money and time; re-check before revising.
            if guardrail.cost_exceeded(total_cost) {
                stop_reason = Some(format!(
                    "cost limit exceeded after critique ({total_cost} > {} cents)",
                    self.config.cost_limit_cents
                ));
                break;
            }
            if guardrail.timeout_exceeded() {
                stop_reason = Some(format!(
                    "timeout after critique at {}s",
                    guardrail.elapsed().as_secs()
                ));
                break;
            }

            let revised = self.drafter.revise(&body, &critique.raw).await?;
            total_cost += revised.cost_cents;
            body = revised.content_markdown;
            score = self.scorer.score(&title, &body);
            iteration += 1;

            self.persist_iteration(
                post_id,
                iteration,
                &title,
                &body,
                score,
                critique.raw.clone(),
                critique.cost_cents + revised.cost_cents,
            )
            .await?;
        }

        if let Some(reason) = &stop_reason {
            warn!(%reason, score, iteration, "guardrail stop");
            self.store
                .log_activity(
                    ActivityEntry::new("guardrail_stop", true)
                        .context(post_id)
                        .meta(json!({
                            "reason": reason,
                            "iteration": iteration,
                            "score": score,
                            "cost_cents": total_cost,
                        })),
                )
                .await?;
        }

        // 9) Terminal disposition.
        let (status, failure_reason) = if score >= self.config.quality_threshold {
            self.store
                .update_post(
                    post_id,
                    PostUpdate {
                        title: Some(title.clone()),
                        content: Some(body.clone()),
                        status: Some(PostStatus::Published),
                        published_at: Some(Utc::now()),
                        failure_reason: None,
                    },
                )
                .await?;
            (RunStatus::Published, None)
        } else if score >= DRAFT_FLOOR {
            self.store
                .update_post(
                    post_id,
                    PostUpdate {
                        title: Some(title.clone()),
                        content: Some(body.clone()),
                        ..Default::default()
                    },
                )
                .await?;
            (RunStatus::Draft, stop_reason)
        } else {
            let reason = format!(
                "quality {score:.2} below floor {DRAFT_FLOOR:.2} ({})",
                stop_reason.as_deref().unwrap_or("refinement exhausted")
            );
            self.store
                .update_post(
                    post_id,
                    PostUpdate {
                        title: Some(title.clone()),
                        content: Some(body.clone()),
                        status: Some(PostStatus::Failed),
                        published_at: None,
                        failure_reason: Some(reason.clone()),
                    },
                )
                .await?;
            (RunStatus::Failed, Some(reason))
        };

        self.store
            .log_activity(
                ActivityEntry::new("finalize", status.is_success())
                    .context(post_id)
                    .duration(guardrail.elapsed().as_millis() as u64)
                    .meta(json!({
                        "status": status.as_str(),
                        "score": score,
                        "iterations": iteration,
                        "cost_cents": total_cost,
                    })),
            )
            .await?;

        info!(
            status = status.as_str(),
            score,
            iteration,
            cost_cents = total_cost,
            %post_id,
            "run complete"
        );

        Ok(RunResult {
            post_id,
            status,
            final_quality_score: score,
            iteration_count: iteration,
            total_cost_cents: total_cost,
            failure_reason,
            strategy: Some(decision.strategy),
            strategy_reason: Some(decision.reason),
            source_summaries,
        })
    }

    /// Mark the filtered item set consumed, one catalog call per category.
    async fn mark_items_used(
        &self,
        items: &[crate::catalog::SourceItem],
        post_id: Uuid,
    ) -> Result<()> {
        let mut by_category: BTreeMap<SourceCategory, Vec<String>> = BTreeMap::new();
        for item in items {
            by_category
                .entry(item.category)
                .or_default()
                .push(item.id.clone());
        }
        for (category, ids) in by_category {
            let updated = self.catalog.mark_used(category, &ids, post_id).await?;
            info!(category = category.as_str(), updated, "marked items used");
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_iteration(
        &self,
        post_id: Uuid,
        iteration: u32,
        title: &str,
        body: &str,
        score: f64,
        critique: serde_json::Value,
        cost_cents: u32,
    ) -> Result<()> {
        self.store
            .save_iteration(IterationRow {
                post_id,
                iteration_number: iteration,
                title,
                content: body,
                quality_score: score,
                critique,
                cost_cents,
            })
            .await?;
        self.store
            .log_activity(
                ActivityEntry::new("draft_iteration", true)
                    .context(post_id)
                    .meta(json!({
                        "iteration": iteration,
                        "score": score,
                        "cost_cents": cost_cents,
                    })),
            )
            .await?;
        Ok(())
    }
}

fn count_map(selection: &Selection) -> serde_json::Value {
    json!(selection
        .counts
        .iter()
        .map(|(cat, n)| (cat.as_str().to_string(), *n))
        .collect::<BTreeMap<String, usize>>())
}
