//! Section drafter
//!
//! For one planned section: gather research, synthesize an HTML fragment,
//! and extract the citation links actually present in the generated text.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::llm::TextGenerator;
use crate::models::{RequestContext, ResearchResult, SectionDraft, SectionPlan};
use crate::search::SearchProvider;
use crate::Result;

const SECTION_SYSTEM: &str = "# Role\n\
You write the final newsletter section content (no prefacing).\n\n\
# Rules\n\
- Use provided research.\n\
- Inline cite via HTML <a href> links for any claims.\n\
- Audience-aware tone.\n\
- Return well-formed HTML only (no <html> wrapper).\n";

const NO_SOURCES_MARKER: &str = "(no external sources available)";

lazy_static! {
    // href values in single or double quotes
    static ref HREF_RE: Regex = Regex::new(r#"href=['"]([^'"]+)['"]"#).unwrap();
}

pub struct SectionDrafter {
    generator: Arc<dyn TextGenerator>,
    research: Arc<dyn SearchProvider>,
    word_target: usize,
}

impl SectionDrafter {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        research: Arc<dyn SearchProvider>,
        word_target: usize,
    ) -> Self {
        Self {
            generator,
            research,
            word_target,
        }
    }

    /// Draft one section: research, generate, extract citations.
    pub async fn draft(&self, ctx: &RequestContext, plan: &SectionPlan) -> Result<SectionDraft> {
        let query = format!(
            "{} — {}. {} Audience: {}.",
            ctx.topic, plan.title, plan.description, ctx.audience
        );

        let results = self.research.search(&query).await?;
        debug!(section = %plan.title, results = results.len(), "Research gathered");

        let research_block = build_research_block(&results);

        let user = format!(
            "Section Title: {}\n\
             Section Description: {}\n\
             Audience: {}\n\
             Tone: {}\n\
             Hard limit: {} words.\n\
             Write 1-3 concise paragraphs. Include inline hyperlink citations \
             for information that relies on research.\n\n\
             Research:\n{}",
            plan.title, plan.description, ctx.audience, ctx.tone, self.word_target, research_block
        );

        let html = self
            .generator
            .complete(SECTION_SYSTEM, &user)
            .await?
            .trim()
            .to_string();

        let sources = extract_citations(&html);
        info!(section = %plan.title, citations = sources.len(), "Section drafted");

        Ok(SectionDraft {
            title: plan.title.clone(),
            html,
            sources,
        })
    }
}

/// Indexed research listing for the drafting prompt; an explicit marker
/// keeps the prompt usable when no results are available.
fn build_research_block(results: &[ResearchResult]) -> String {
    if results.is_empty() {
        return NO_SOURCES_MARKER.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[Source {}] URL: {}\nTitle: {}\nContent: {}",
                i + 1,
                r.url,
                r.title.as_deref().unwrap_or(""),
                r.content.as_deref().unwrap_or(""),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extract citation URLs from generated HTML.
///
/// The source list is derived from the generated text, not the raw research:
/// only inserted anchors that parse as absolute http(s) links with a host
/// count, deduplicated in first-seen order.
fn extract_citations(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for captures in HREF_RE.captures_iter(html) {
        let raw = &captures[1];
        let valid = Url::parse(raw)
            .map(|u| {
                matches!(u.scheme(), "http" | "https")
                    && u.host_str().map(|h| !h.is_empty()).unwrap_or(false)
            })
            .unwrap_or(false);

        if valid && seen.insert(raw.to_string()) {
            sources.push(raw.to_string());
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_citations_both_quote_styles() {
        let html = r#"<p>See <a href="https://a.dev/x">one</a> and <a href='http://b.org/y'>two</a>.</p>"#;
        assert_eq!(
            extract_citations(html),
            vec!["https://a.dev/x".to_string(), "http://b.org/y".to_string()]
        );
    }

    #[test]
    fn test_extract_citations_filters_invalid_links() {
        let html = concat!(
            r#"<a href="mailto:x@y.com">mail</a>"#,
            r#"<a href="/relative/path">rel</a>"#,
            r#"<a href="ftp://files.example.com">ftp</a>"#,
            r#"<a href="https://ok.example.com/page">ok</a>"#,
        );
        assert_eq!(extract_citations(html), vec!["https://ok.example.com/page"]);
    }

    #[test]
    fn test_extract_citations_dedupes_first_seen() {
        let html = concat!(
            r#"<a href="https://b.dev">1</a>"#,
            r#"<a href="https://a.dev">2</a>"#,
            r#"<a href="https://b.dev">3</a>"#,
        );
        assert_eq!(extract_citations(html), vec!["https://b.dev", "https://a.dev"]);
    }

    #[test]
    fn test_research_block_indexes_results() {
        let results = vec![
            ResearchResult {
                url: "https://a.dev".to_string(),
                title: Some("Alpha".to_string()),
                content: Some("First finding".to_string()),
            },
            ResearchResult {
                url: "https://b.dev".to_string(),
                title: None,
                content: None,
            },
        ];

        let block = build_research_block(&results);
        assert!(block.starts_with("[Source 1] URL: https://a.dev"));
        assert!(block.contains("[Source 2] URL: https://b.dev"));
        assert!(block.contains("Title: Alpha"));
    }

    #[test]
    fn test_research_block_empty_marker() {
        assert_eq!(build_research_block(&[]), NO_SOURCES_MARKER);
    }
}
