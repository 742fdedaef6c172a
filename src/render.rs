//! Final document rendering
//!
//! Aggregates citations across sections into one deterministic source
//! mapping and renders the newsletter template, with a soft word-budget
//! check on the result.

use std::collections::BTreeMap;
use tera::Tera;
use tracing::warn;

use crate::error::NewsletterError;
use crate::models::SectionDraft;
use crate::text::{count_words, strip_tags};
use crate::Result;

const TEMPLATE_NAME: &str = "newsletter.html";
const TEMPLATE_SOURCE: &str = include_str!("../templates/newsletter.html");

pub struct Renderer {
    tera: Tera,
    max_words: usize,
}

impl Renderer {
    pub fn new(max_words: usize) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE_SOURCE)
            .map_err(|e| NewsletterError::Render(format!("Template compile failed: {}", e)))?;

        Ok(Self { tera, max_words })
    }

    /// Render the final document and return it with the aggregated,
    /// URL-sorted source mapping. Exceeding the word budget is a warning,
    /// not a rejection.
    pub fn render(
        &self,
        subject: &str,
        sections: &[SectionDraft],
    ) -> Result<(String, BTreeMap<String, String>)> {
        let sources = aggregate_sources(sections);

        let mut context = tera::Context::new();
        context.insert("subject", subject);
        context.insert("sections", sections);
        context.insert("sources", &sources);

        let html = self
            .tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| NewsletterError::Render(format!("Template render failed: {}", e)))?;

        let words = count_words(&strip_tags(&html));
        if words > self.max_words {
            warn!(
                words,
                max_words = self.max_words,
                "Newsletter exceeds max_words; content may need trimming"
            );
        }

        Ok((html, sources))
    }
}

/// Deduplicated union of every section's source URLs, keyed and sorted by
/// URL. The first occurrence claims the label slot.
fn aggregate_sources(sections: &[SectionDraft]) -> BTreeMap<String, String> {
    let mut sources = BTreeMap::new();
    for section in sections {
        for url in &section.sources {
            sources.entry(url.clone()).or_insert_with(String::new);
        }
    }
    sources
}
