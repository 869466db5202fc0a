// src/cost.rs
// Token usage -> cents. Pure lookup + integer arithmetic, no state.

/// Cents per million tokens, (input, output).
const PRICING: &[(&str, (u64, u64))] = &[
    ("claude-opus-4-5", (1_500, 7_500)),
    ("claude-sonnet-4-5", (300, 1_500)),
    ("claude-sonnet-3-5", (300, 1_500)),
    ("claude-haiku-3-5", (25, 125)),
];

/// Rate tier used when the model id is unknown. Opus is the most expensive
/// tier, so an unknown model always over-estimates rather than under.
const FALLBACK: (u64, u64) = (1_500, 7_500);

fn rates_for(model: &str) -> (u64, u64) {
    PRICING
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, rates)| *rates)
        .unwrap_or(FALLBACK)
}

/// Estimate the cost of one API call in whole cents, rounded half up.
pub fn estimate_cost(input_tokens: u64, output_tokens: u64, model: &str) -> u32 {
    let (input_rate, output_rate) = rates_for(model);
    let micro_cents = input_tokens as u128 * input_rate as u128
        + output_tokens as u128 * output_rate as u128;
    ((micro_cents + 500_000) / 1_000_000) as u32
}
