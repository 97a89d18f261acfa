use crate::image::IMAGE_PARTS;
use crate::post::PostDraft;
use crate::research::ResearchFindings;

/// Prompt templates for the three workflow stages.
pub struct StagePrompts;

impl StagePrompts {
    pub fn research_system() -> &'static str {
        "You are a social-platform research analyst. You extract concrete, verifiable \
         facts: named companies, prices, places, dates, first-hand accounts. You never \
         pad findings with generalities, and you always answer with a single JSON object."
    }

    /// Brief for the research stage.
    pub fn research_brief(topic: &str, audience: &str) -> String {
        format!(
            r#"Research the topic "{topic}" for an audience of {audience}.

Collect:
- entities: at least 5 concrete entities, each {{"kind": "...", "name": "...", "detail": "..."}}
- cases: at least 3 first-hand accounts, each {{"subject": "...", "experience": "...", "source": "..."}}
- keywords: 5-10 recurring keywords
- credibility: "low", "medium" or "high" based on how well sources corroborate
- data_points: how many distinct sources the findings draw on
- summary: 3-5 sentences of findings

Return one JSON object with exactly those fields."#,
        )
    }

    pub fn research_review_system() -> &'static str {
        "You are a rigorous research reviewer. You fail findings that are vague, \
         unsourced or padded. Concrete names and first-hand accounts are what count."
    }

    pub fn content_system() -> &'static str {
        "You are a social-post writer. You turn research findings into posts that are \
         specific and data-driven: real names, real amounts, real timelines. You always \
         answer with a single JSON object."
    }

    /// Brief for the content stage. Embeds the research findings the draft
    /// must actually use.
    pub fn content_brief(topic: &str, audience: &str, research: &ResearchFindings) -> String {
        let findings =
            serde_json::to_string_pretty(research).unwrap_or_else(|_| research.summary.clone());
        format!(
            r#"Write a post about "{topic}" for {audience}.

Requirements:
- title: 10-30 characters, attention-grabbing
- body: at least 100 characters, citing 3+ named entities from the research with their concrete details, and at least one full case with its timeline
- hashtags: 3-5 relevant tags
- call_to_action: one line inviting replies

The research below contains {facts} usable facts. Draw on it directly; do not invent entities that are not in it.

# Research findings
{findings}

Return one JSON object with fields: title, body, hashtags, call_to_action."#,
            facts = research.usable_facts(),
        )
    }

    pub fn content_review_system() -> &'static str {
        "You are a content reviewer for social posts. You check that the draft uses the \
         research it was given: named entities with details, at least one complete case, \
         a hook that earns the click without lying. Unsupported claims are critical."
    }

    pub fn image_system() -> &'static str {
        "You write image-generation prompts for social-post illustrations: flat design, \
         bold readable text, bright palettes that survive thumbnail size."
    }

    /// Brief for the image stage. The loop appends which part of the set to
    /// produce; this brief describes the whole set.
    pub fn image_brief(topic: &str, draft: &PostDraft) -> String {
        let parts: Vec<String> = IMAGE_PARTS
            .iter()
            .map(|part| format!("- {}: {}", part.key, part.brief))
            .collect();
        format!(
            r#"Illustrate a post titled "{title}" about "{topic}".

The set has these parts:
{parts}

Every image: vertical 3:4, flat illustration style, title text large enough to read as a thumbnail, consistent palette across the set."#,
            title = draft.title,
            parts = parts.join("\n"),
        )
    }

    pub fn image_review_system() -> &'static str {
        "You review generated social-post images from their metadata and prompts. You \
         flag parts whose prompt or file path suggests unreadable text, off-topic \
         content or a style break from the rest of the set."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::{ResearchFindings, SourceEntity};

    #[test]
    fn test_content_brief_embeds_research_and_counts() {
        let research = ResearchFindings {
            summary: "two companies flagged".to_string(),
            entities: vec![SourceEntity {
                kind: "company".to_string(),
                name: "Acme".to_string(),
                detail: "probation with no insurance".to_string(),
            }],
            cases: vec![],
            keywords: vec![],
            credibility: Default::default(),
            data_points: 4,
        };
        let brief = StagePrompts::content_brief("job hunting", "new graduates", &research);
        assert!(brief.contains("Acme"));
        assert!(brief.contains("1 usable facts"));
        assert!(brief.contains("job hunting"));
    }

    #[test]
    fn test_image_brief_lists_every_part() {
        let draft = PostDraft {
            title: "Job hunt survival guide".to_string(),
            body: "x".repeat(120),
            hashtags: vec![],
            call_to_action: String::new(),
        };
        let brief = StagePrompts::image_brief("job hunting", &draft);
        for part in IMAGE_PARTS {
            assert!(brief.contains(part.key));
        }
    }
}
