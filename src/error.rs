// src/error.rs
// Typed errors for the fatal classes; everything else travels as anyhow context.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RalphError {
    /// Bad construction parameters. Never reaches the loop.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Not enough unused source items even after feed refresh + backfill.
    #[error("insufficient source items: need at least {needed}, found {found}")]
    SourceShortage { needed: usize, found: usize },

    /// The model violated its output contract (empty draft, malformed critique).
    #[error("model returned invalid content: {0}")]
    ContentValidation(String),

    /// The persistence layer saw a second write of the same iteration number.
    #[error("duplicate draft iteration {iteration} for post {post_id}")]
    DuplicateIteration { post_id: Uuid, iteration: u32 },
}
