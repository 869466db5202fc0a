// src/prompts.rs
// Prompt templates for every model-backed pass. Placeholders use {name}
// markers filled with str::replace; keep them unique per template.

/// Pre-generation "is this worth writing about" gate.
pub const SOURCE_JUICE_PROMPT: &str = r#"You are evaluating whether a set of source articles has enough "juice" (newsworthiness, value, and interest) to warrant writing a blog post for a precision manufacturing company.

**SOURCE ITEMS TO EVALUATE:**
{source_items}

**EVALUATION CRITERIA:**
1. **Newsworthiness** - Is there actual news here, or just filler content?
2. **Manufacturing Relevance** - Does this matter to machine shop owners and engineers?
3. **Practical Value** - Would readers learn something useful?
4. **Timeliness** - Is this timely or stale information?
5. **Uniqueness** - Is this worth covering, or overdone?

**SCORING GUIDE:**
- 0.8-1.0: Strong sources - clear news, high relevance, definite post material
- 0.6-0.8: Decent sources - worth writing about, some value
- 0.4-0.6: Weak sources - marginal value, might be filler
- 0.0-0.4: Skip - no real news, irrelevant, or stale

**PHILOSOPHY:**
Quality over quantity. It's better to skip a day than publish content nobody cares about. Posts should only happen when there's real value to deliver.

**OUTPUT REQUIRED (JSON ONLY):**
{
  "juice_score": 0.0-1.0,
  "should_proceed": true|false,
  "reason": "1-2 sentence explanation of the decision",
  "best_source": "title of the most promising source item",
  "potential_angle": "suggested angle if proceeding, or null if skipping"
}

Be honest. If the sources are weak, say so.
"#;

/// Cheap-tier screen over the syndicated-news pool.
pub const MAJOR_NEWS_SCREENING_PROMPT: &str = r#"Evaluate these news items and identify any that qualify as "major news" for a precision manufacturing company's blog.

**ITEMS TO SCREEN:**
{items_json}

**MAJOR NEWS CRITERIA:**
A story qualifies as major news if it has ANY of these characteristics:
1. **Trade policy changes** - Tariffs, trade agreements, sanctions, import/export regulations
2. **Major industry events** - Significant acquisitions, bankruptcies, plant closures/openings
3. **Government regulations** - New manufacturing standards, safety requirements, environmental rules
4. **Supply chain disruptions** - Material shortages, logistics issues, supplier problems
5. **Significant economic data** - Major manufacturing indices, employment data, commodity prices

**URGENCY SCORING:**
- 0.9-1.0: Breaking news - immediate impact on manufacturing operations or costs
- 0.7-0.9: Important development - significant industry implications
- 0.5-0.7: Notable but not urgent - worth covering but not time-sensitive
- 0.0-0.5: Routine news - no special priority needed

**OUTPUT FORMAT (JSON ONLY):**
{
  "screening_results": [
    {
      "item_index": 0,
      "is_major_news": true|false,
      "urgency_score": 0.0-1.0,
      "reason": "Brief explanation of why this is/isn't major news"
    }
  ]
}

Be selective. Most items should NOT be major news. Only flag genuinely significant developments.
"#;

/// Cheap-tier strategy screen over the selected items.
pub const STRATEGY_SCREENING_PROMPT: &str = r#"Analyze these source items for a precision manufacturing blog and recommend a content strategy.

**IMPORTANT CONTEXT:**
This blog is for a machine shop based in Ontario, Canada. Content should be:
- Relevant to Canadian manufacturers, OR
- Globally applicable (technical topics, best practices, industry trends)
- US-specific policy/regulations are LOWER priority unless they directly impact Canadian operations (e.g., cross-border trade, tariffs affecting Canada)

**SOURCE ITEMS:**
{items_json}

**YOUR TASK:**
1. Score each item for newsworthiness (urgency_score 0.0-1.0)
2. Identify themes that connect multiple items
3. Recommend the best content strategy

**STRATEGY OPTIONS:**

1. **anchor_context** - Use when ONE item clearly dominates (urgency >= 0.8)
   - That item becomes the main story
   - Other items provide supporting context only
   - Result: Focused post with clear narrative

2. **thematic** - Use when 2+ items share a common theme
   - Group related items together
   - Ignore unrelated items
   - Result: Cohesive post exploring one topic from multiple angles

3. **analysis** - Use when items are scattered but individually solid
   - Find a unifying "shop floor perspective" angle
   - What do these mean for a machine shop owner?
   - Result: Commentary/analysis piece tying disparate news together

4. **deep_dive** - Use when the source pool is weak OR one item deserves thorough treatment
   - Pick only 1-2 best items
   - Go deeper rather than broader
   - Result: In-depth exploration of a single topic

**OUTPUT FORMAT (JSON ONLY):**
{
  "item_scores": [
    {
      "item_index": 0,
      "urgency_score": 0.0-1.0,
      "themes": ["theme1", "theme2"],
      "summary": "One line describing item's value"
    }
  ],
  "theme_clusters": {
    "theme_name": [0, 2, 4]
  },
  "strategy": "anchor_context|thematic|analysis|deep_dive",
  "strategy_reason": "Brief explanation of why this strategy fits",
  "anchor_index": null or integer (only for anchor_context),
  "recommended_indices": [0, 2, 4],
  "unifying_angle": "For analysis strategy: the shop-floor perspective that ties items together"
}

Be decisive. Pick the strategy that will produce the most valuable, coherent blog post.
"#;

const SHARED_STYLE_RULES: &str = r#"**Requirements:**
1. Write in markdown format
2. Length: 1000-2500 words
3. Include ## and ### headings for structure
4. Sound like a knowledgeable shop veteran, not a marketing bot
5. Be practical and industrial, not corporate or salesy
6. Use concrete examples over abstract concepts
7. Lead with interesting details, not context-setting
8. Short sentences. Active voice. No hedging.
9. Summarize sources; do not copy or quote large blocks
10. Include a short "Sources" section with links
11. Only cite sources you actually used

**CRITICAL - Avoid AI slop language:**
- NEVER use: delve, unveil, landscape, realm, unlock, leverage, utilize, robust, streamline, cutting-edge,
  revolutionary, harness, paradigm, synergy
- NEVER use: "in today's fast-paced world", "it's important to note", "let's explore", "dive deep",
  "game-changer", "best practices"
- DO NOT use formulaic structure every time
- DO NOT hedge or qualify unnecessarily

**Output format:**
Return ONLY a JSON object with these exact keys:
{
  "title": "Post title (5-10 words, engaging)",
  "excerpt": "Brief summary (2-3 sentences, 150-200 chars)",
  "content_markdown": "Full blog post content in markdown format",
  "source_urls": ["https://example.com/source-1", "https://example.com/source-2"]
}

Do not include any text before or after the JSON object."#;

pub fn initial_draft_prompt(sources_text: &str) -> String {
    format!(
        "You are writing a blog post for a precision machine shop's website.\n\n\
         Your task: Write a single blog post that synthesizes insights from the following manufacturing industry sources.\n\n\
         **Sources:**\n{sources_text}\n\n\
         If sources are unrelated, choose a single coherent theme and ignore unrelated items.\n\n\
         {SHARED_STYLE_RULES}"
    )
}

pub fn anchor_context_prompt(anchor_source: &str, context_sources: &str) -> String {
    format!(
        "You are writing a blog post for a precision machine shop's website.\n\n\
         Your task: Write a focused post built around ONE main story, using the remaining sources only as supporting context.\n\n\
         **Main story:**\n{anchor_source}\n\n\
         **Supporting context:**\n{context_sources}\n\n\
         Keep the narrative anchored on the main story. Context sources earn at most a paragraph each, and only where they sharpen the main story.\n\n\
         {SHARED_STYLE_RULES}"
    )
}

pub fn thematic_prompt(theme_name: &str, sources_text: &str) -> String {
    format!(
        "You are writing a blog post for a precision machine shop's website.\n\n\
         Your task: Write one cohesive post exploring the theme \"{theme_name}\" from multiple angles, using the sources below.\n\n\
         **Sources:**\n{sources_text}\n\n\
         Stay on the theme. Drop any source that does not serve it.\n\n\
         {SHARED_STYLE_RULES}"
    )
}

pub fn analysis_prompt(unifying_angle: &str, sources_text: &str) -> String {
    format!(
        "You are writing a blog post for a precision machine shop's website.\n\n\
         Your task: Write a commentary piece that ties the scattered news below together through one shop-floor perspective: {unifying_angle}\n\n\
         **Sources:**\n{sources_text}\n\n\
         The angle is the spine of the post. Every source appears in service of it, or not at all.\n\n\
         {SHARED_STYLE_RULES}"
    )
}

pub fn deep_dive_prompt(sources_text: &str) -> String {
    format!(
        "You are writing a blog post for a precision machine shop's website.\n\n\
         Your task: Go deep on the one or two sources below. Depth over breadth: background, mechanics, and what it changes on the shop floor.\n\n\
         **Sources:**\n{sources_text}\n\n\
         {SHARED_STYLE_RULES}"
    )
}

/// Revision pass. The no-new-URLs rule is a content-safety constraint:
/// revisions must never cite material the draft was not built from.
pub fn improvement_prompt(critique: &str, content_markdown: &str) -> String {
    format!(
        "You are revising a draft blog post for a precision machine shop's website.\n\n\
         Your task: Improve the draft using the critique below. Address the issues directly while preserving the core topic.\n\n\
         **Critique:**\n{critique}\n\n\
         **Draft to Improve:**\n{content_markdown}\n\n\
         **Requirements:**\n\
         1. Keep the length between 1000-2500 words\n\
         2. Keep ## and ### headings for structure\n\
         3. Maintain the shop-veteran tone: practical, direct, non-salesy\n\
         4. Keep facts grounded in the provided sources\n\
         5. Remove any AI slop language\n\
         6. Preserve or improve clarity and flow\n\
         7. Do NOT introduce URLs that are not already present in the draft or its Sources section\n\
         8. Only cite sources you actually used\n\n\
         **Output format:**\n\
         Return ONLY a JSON object with these exact keys:\n\
         {{\n\
           \"title\": \"Improved title (5-10 words, engaging)\",\n\
           \"excerpt\": \"Brief summary (2-3 sentences, 150-200 chars)\",\n\
           \"content_markdown\": \"Improved blog post content in markdown format\",\n\
           \"source_urls\": [\"https://example.com/source-1\"]\n\
         }}\n\n\
         Do not include any text before or after the JSON object."
    )
}

pub fn critique_prompt(title: &str, content: &str, current_score: f64, ai_slop_list: &str) -> String {
    format!(
        "You are a ruthless blog editor for a precision machine shop. Evaluate this draft.\n\n\
         **Title:** {title}\n\n\
         **Draft:**\n{content}\n\n\
         **Previous quality score:** {current_score:.2}\n\n\
         **EVALUATE FOR:**\n\
         1. Does it sound like a shop veteran or a marketing bot?\n\
         2. Concrete detail vs. abstract filler\n\
         3. Structure: headings, flow, a lead that earns attention\n\
         4. Grounding: claims tied to the cited sources\n\
         5. Forbidden AI slop phrasing (list below) - automatic penalty when present\n\n\
         **FORBIDDEN PHRASING:**\n{ai_slop_list}\n\n\
         **OUTPUT REQUIRED (JSON ONLY):**\n\
         {{\n\
           \"quality_score\": 0.0-1.0,\n\
           \"ai_slop_detected\": true|false,\n\
           \"ai_slop_terms\": [\"terms actually found\"],\n\
           \"main_issues\": [\"the biggest problems, most damaging first\"],\n\
           \"improvements\": [\"specific, actionable fixes\"],\n\
           \"strengths\": [\"what already works - keep these intact\"]\n\
         }}\n\n\
         Score honestly. A publishable post is rare on the first pass."
    )
}
