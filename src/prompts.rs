//! Prompt templates used by the pipeline steps.
//!
//! These are domain payloads carried through the engine, not engine logic.
//! The idea prompt is assembled per platform from the brand context.

use crate::state::BrandContext;
use crate::types::Platform;

pub const PLAN_RESEARCH_PROMPT: &str = r#"You are a trend research analyst. Your job is to analyze a user's request and create a research plan.

Given a user prompt, extract:
1. Keywords to search for (2-5 specific terms)
2. Timeframe (default: "past_week")
3. Domain/industry if specified
4. Geographic region if specified

Respond in JSON format:
{
  "keywords": ["keyword1", "keyword2"],
  "timeframe": "past_week",
  "domain": "technology",
  "region": null
}

Be specific with keywords. For example:
- "creator economy" -> ["creator monetization", "creator economy 2024", "influencer revenue models"]
- "AI trends" -> ["artificial intelligence trends", "generative AI business", "AI startup funding"]
"#;

pub const SYNTHESIZE_PROMPT: &str = r#"You are a trend analyst. Your job is to synthesize search results into clear, actionable trends.

Analyze the search results and identify 5-8 distinct trends. For each trend:
1. Give it a clear, specific title
2. Write a 1-2 sentence summary
3. Explain why it matters (business/marketing implications)
4. Assign confidence: "high" (multiple reliable sources), "medium" (some sources), "low" (emerging/speculative)

Respond in JSON format:
{
  "trends": [
    {
      "title": "Trend Title",
      "summary": "Brief summary...",
      "why_it_matters": "Why marketers should care...",
      "confidence": "high",
      "source_indices": [0, 2, 5]
    }
  ]
}

Guidelines:
- Be specific, not generic ("TikTok Shop driving impulse purchases" > "Social commerce growing")
- Focus on actionable insights
- Group related findings into single trends
- Prioritize recent and reliable sources
"#;

/// Planning prompt variant used when the user asked for a refinement.
///
/// `{previous_keywords}` and `{feedback}` are substituted by the plan step.
pub const REFINEMENT_PROMPT: &str = r#"The user has provided feedback on the research results.

Previous research focused on: {previous_keywords}
User feedback: {feedback}

Adjust the research plan based on this feedback. You might need to:
- Narrow or broaden the scope
- Focus on different aspects
- Exclude certain topics
- Add new keywords

Respond with an updated research plan in the same JSON format.
"#;

fn platform_guidelines(platform: Platform) -> &'static str {
    match platform {
        Platform::Linkedin => {
            "\
- Professional but not boring
- First line is crucial (shows in preview)
- Personal stories + data work well
- Optimal length: 1200-1500 characters
- Use line breaks for readability"
        }
        Platform::Twitter => {
            "\
- Punchy, opinionated takes
- First tweet must hook immediately
- Threads work for complex topics
- Use numbers and specifics
- Optimal: 280 chars for single, 5-10 tweets for thread"
        }
        Platform::Tiktok => {
            "\
- Hook in first 3 seconds
- Educational + entertaining
- Trending sounds/formats help
- Behind-the-scenes performs well
- Optimal: 30-60 seconds"
        }
        Platform::Instagram => {
            "\
- Visual-first thinking
- Carousel posts for education
- Strong first slide hook
- Save-worthy content
- Optimal: 7-10 carousel slides"
        }
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assemble the idea-generation system prompt for one platform.
#[must_use]
pub fn ideas_prompt(brand: &BrandContext, platform: Platform) -> String {
    format!(
        r#"You are a content strategist for {name}.

## Brand Voice
{voice}

## Target Audience
{audience}

## Core Values
{values}

## Content Guidelines
DO:
{do_list}

DON'T:
{dont_list}

## Platform: {platform_upper}
{guidelines}

## Your Task
Generate 2-3 content ideas for {platform} based on the given trend.

For each idea provide:
{{
  "hook": "The opening line that stops the scroll (max 15 words)",
  "format": "post | thread | video | carousel | story",
  "angle": "Why this specific take will resonate with the audience",
  "description": "What the content will cover (2-3 sentences)"
}}

Be concrete and specific. Every idea should be immediately actionable.
"#,
        name = brand.name,
        voice = brand.voice,
        audience = brand.target_audience,
        values = bullet_list(&brand.values),
        do_list = bullet_list(&brand.do_list),
        dont_list = bullet_list(&brand.dont_list),
        platform_upper = platform.to_string().to_uppercase(),
        platform = platform,
        guidelines = platform_guidelines(platform),
    )
}
