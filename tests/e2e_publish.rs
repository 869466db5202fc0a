// tests/e2e_publish.rs
// Full pipeline: mixed pool in, published post out, costs itemized.

mod common;

use common::*;
use shopfloor_ralph::cost::estimate_cost;
use shopfloor_ralph::store::PostStatus;
use shopfloor_ralph::strategy::ContentStrategy;
use shopfloor_ralph::RunStatus;

/// Five sources (4 syndicated + 1 evergreen), a 0.75 juice score, a thematic
/// strategy capped at 4 items, and scores [0.72, 0.88] over two iterations.
#[tokio::test]
async fn mixed_pool_publishes_in_two_iterations() {
    let h = harness(
        test_config(),
        standard_pool(),
        vec![
            juice_completion(0.75, true),
            strategy_completion("thematic", &[0, 1, 2, 3, 4]),
            draft_completion("Aluminum Week in Review"),
            critique_completion(0.7),
            revise_completion(),
        ],
        vec![0.72, 0.88],
    );

    let result = h.ralph.run().await.unwrap();

    assert_eq!(result.status, RunStatus::Published);
    assert_eq!(result.iteration_count, 2);
    assert!((result.final_quality_score - 0.88).abs() < 1e-9);
    assert_eq!(result.strategy, Some(ContentStrategy::Thematic));
    assert_eq!(result.source_summaries.len(), 5);

    // Cost is exactly: juice + strategy + initial draft + one critique + one
    // revision, each strictly positive. The 4-item news pool skips the
    // pre-screen, so it contributes nothing.
    let juice = estimate_cost(10_000, 2_000, "claude-sonnet-4-5");
    let strategy = estimate_cost(40_000, 8_000, "claude-haiku-3-5");
    let draft = estimate_cost(20_000, 4_000, "claude-sonnet-4-5");
    let critique = estimate_cost(20_000, 4_000, "claude-sonnet-4-5");
    let revise = estimate_cost(20_000, 4_000, "claude-sonnet-4-5");
    for part in [juice, strategy, draft, critique, revise] {
        assert!(part > 0);
    }
    assert_eq!(
        result.total_cost_cents,
        juice + strategy + draft + critique + revise
    );

    // Thematic caps at 4 items: the recommended 5 shrink to 4, and only the
    // used 4 are marked consumed.
    let consumed: Vec<_> = ["r0", "r1", "r2", "r3", "e0"]
        .iter()
        .filter(|id| h.catalog.used_by(id).is_some())
        .collect();
    assert_eq!(consumed.len(), 4);
    assert_eq!(h.catalog.unused_count(), 1, "the capped-out item stays available");
    for id in &consumed {
        assert_eq!(h.catalog.used_by(id), Some(result.post_id));
    }

    // Post row: published, timestamped, carrying the final body.
    let post = h.store.post(result.post_id).unwrap();
    assert_eq!(post.status, PostStatus::Published);
    assert!(post.published_at.is_some());
    assert!(post.content.contains("Sharper Lead"));

    // Iteration history: 1 then 2, costs split initial-draft vs critique+revise.
    let iterations = h.store.iterations_for(result.post_id);
    assert_eq!(iterations.len(), 2);
    assert_eq!(iterations[0].iteration_number, 1);
    assert_eq!(iterations[0].cost_cents, draft);
    assert_eq!(iterations[1].iteration_number, 2);
    assert_eq!(iterations[1].cost_cents, critique + revise);
    assert!((iterations[0].quality_score - 0.72).abs() < 1e-9);
    assert!((iterations[1].quality_score - 0.88).abs() < 1e-9);

    // Activity log covers every phase plus the finalize record.
    let activities = h.store.activities();
    for phase in [
        "source_selection",
        "juice_evaluation",
        "strategy_screening",
        "draft_generation",
        "draft_iteration",
        "finalize",
    ] {
        assert!(
            activities.iter().any(|a| a.activity_type == phase && a.success),
            "missing activity: {phase}"
        );
    }
    let finalize = activities
        .iter()
        .find(|a| a.activity_type == "finalize")
        .unwrap();
    assert_eq!(finalize.metadata["status"], "published");
    assert_eq!(finalize.metadata["iterations"], 2);
}

/// One critique/revise round exactly: the model sees the first body once.
#[tokio::test]
async fn call_sequence_matches_the_state_machine() {
    let h = harness(
        test_config(),
        standard_pool(),
        vec![
            juice_completion(0.75, true),
            strategy_completion("thematic", &[0, 1, 2, 3]),
            draft_completion("Sequence Check"),
            critique_completion(0.7),
            revise_completion(),
        ],
        vec![0.72, 0.88],
    );
    h.ralph.run().await.unwrap();

    assert_eq!(h.llm.calls_matching(JUICE_MARKER), 1);
    assert_eq!(h.llm.calls_matching(STRATEGY_MARKER), 1);
    assert_eq!(h.llm.calls_matching(CRITIQUE_MARKER), 1);
    assert_eq!(h.llm.calls_matching(REVISE_MARKER), 1);
    assert_eq!(h.llm.call_count(), 5);

    // The revision prompt worked from the first draft's body.
    let prompts = h.llm.prompts();
    let revise_prompt = prompts
        .iter()
        .find(|p| p.contains(REVISE_MARKER))
        .expect("revision prompt recorded");
    assert!(revise_prompt.contains("## Lead"));
    assert!(
        revise_prompt.contains("Do NOT introduce URLs"),
        "content-safety constraint must survive in the prompt text"
    );
}
