//! Subject composer
//!
//! Derives a concise email subject from the assembled draft content, with
//! a deterministic fallback when the generator returns nothing usable.

use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::TextGenerator;
use crate::models::{RequestContext, SectionDraft};
use crate::text::{collapse_whitespace, strip_tags, title_case, truncate_chars};
use crate::Result;

const TITLE_SYSTEM: &str = "Create a concise, title-case subject for an email newsletter. \
                            Output plain text only, no quotes.";

const EXCERPT_CHARS: usize = 1500;
const FALLBACK_HINT_CHARS: usize = 60;

pub struct SubjectComposer {
    generator: Arc<dyn TextGenerator>,
}

impl SubjectComposer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Compose the subject over the final section sequence.
    pub async fn compose(
        &self,
        ctx: &RequestContext,
        sections: &[SectionDraft],
    ) -> Result<String> {
        let assembled = sections
            .iter()
            .map(|s| s.html.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let snippet = collapse_whitespace(&strip_tags(&assembled));
        let user = format!(
            "Tone: {}\nAudience: {}\nNewsletter excerpt: {}",
            ctx.tone,
            ctx.audience,
            truncate_chars(&snippet, EXCERPT_CHARS)
        );

        let subject = self.generator.complete(TITLE_SYSTEM, &user).await?;
        let subject = subject
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();

        if !subject.is_empty() {
            info!(subject = %subject, "Subject composed");
            return Ok(subject);
        }

        debug!("Generator returned an empty subject; using fallback");
        Ok(fallback_subject(ctx, sections))
    }
}

/// Deterministic subject: title-cased topic plus a truncated list of
/// section titles.
fn fallback_subject(ctx: &RequestContext, sections: &[SectionDraft]) -> String {
    let hint = sections
        .iter()
        .map(|s| s.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{} — {}",
        title_case(ctx.topic.trim()),
        truncate_chars(&hint, FALLBACK_HINT_CHARS)
    )
}
