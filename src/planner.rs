//! Section planner
//!
//! Turns topic/tone/audience into an ordered table of contents via one
//! generator call, with strict-JSON extraction and a lenient fallback parse.

use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::info;

use crate::error::NewsletterError;
use crate::llm::TextGenerator;
use crate::models::{PlanResponse, RequestContext, SectionPlan};
use crate::Result;

/// Hard cap, even if the generator proposes more.
const MAX_SECTIONS: usize = 6;

const PLAN_SYSTEM: &str = "# Overview\n\
You plan a newsletter table of contents tailored to topic, tone, and audience.\n\n\
# Instructions\n\
- Analyze topic, tone, and audience.\n\
- Brainstorm 4-6 engaging sections.\n\
- Output strict JSON with key newsletterSections (list of {title, description}).\n";

lazy_static! {
    // Trailing {...} object, for responses that wrap the JSON in prose.
    static ref TRAILING_OBJECT_RE: Regex = Regex::new(r"(?s)\{.*\}$").unwrap();
}

pub struct SectionPlanner {
    generator: Arc<dyn TextGenerator>,
}

impl SectionPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Plan 1-6 sections for the request, or fail with `PlanParse`.
    pub async fn plan(&self, ctx: &RequestContext) -> Result<Vec<SectionPlan>> {
        let user = format!(
            "Topic: {}\nTone: {}\nAudience: {}\n\n\
             Output JSON strictly like: {{\n  \"newsletterSections\": [\n    \
             {{\"title\": \"...\", \"description\": \"...\"}}\n  ]\n}}",
            ctx.topic, ctx.tone, ctx.audience
        );

        let response = self.generator.complete(PLAN_SYSTEM, &user).await?;
        let mut plan = parse_plan_response(&response)?;

        if plan.sections.is_empty() {
            return Err(NewsletterError::PlanParse("No sections planned".to_string()));
        }

        info!(sections = plan.sections.len(), "Planned sections");

        plan.sections.truncate(MAX_SECTIONS);
        Ok(plan.sections)
    }
}

/// Extract the plan document from generator output.
///
/// Strict full-document parse first; on failure, re-attempt on the trailing
/// JSON object of the trimmed response. Anything else is a parse failure.
fn parse_plan_response(response: &str) -> Result<PlanResponse> {
    if let Ok(plan) = serde_json::from_str::<PlanResponse>(response) {
        return Ok(plan);
    }

    let trimmed = response.trim();
    if let Some(m) = TRAILING_OBJECT_RE.find(trimmed) {
        if let Ok(plan) = serde_json::from_str::<PlanResponse>(m.as_str()) {
            return Ok(plan);
        }
    }

    Err(NewsletterError::PlanParse(format!(
        "Could not parse plan JSON from generator output: {}",
        response
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticGenerator(String);

    #[async_trait]
    impl TextGenerator for StaticGenerator {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new("AI Regulation", "Professional", "policy analysts")
    }

    #[test]
    fn test_strict_parse() {
        let raw = r#"{"newsletterSections": [{"title": "Global Frameworks", "description": "EU and US"}]}"#;
        let plan = parse_plan_response(raw).unwrap();
        assert_eq!(plan.sections.len(), 1);
        assert_eq!(plan.sections[0].title, "Global Frameworks");
    }

    #[test]
    fn test_description_defaults_to_empty() {
        let raw = r#"{"newsletterSections": [{"title": "Untitled beat"}]}"#;
        let plan = parse_plan_response(raw).unwrap();
        assert_eq!(plan.sections[0].description, "");
    }

    #[test]
    fn test_trailing_object_rescue() {
        let raw = "Sure! Here is your plan:\n\
                   {\"newsletterSections\": [{\"title\": \"Industry Response\", \"description\": \"\"}]}";
        let plan = parse_plan_response(raw).unwrap();
        assert_eq!(plan.sections[0].title, "Industry Response");
    }

    #[test]
    fn test_unparseable_response() {
        let err = parse_plan_response("no json here").unwrap_err();
        assert!(matches!(err, NewsletterError::PlanParse(_)));
    }

    #[tokio::test]
    async fn test_empty_plan_is_an_error() {
        let planner = SectionPlanner::new(Arc::new(StaticGenerator(
            r#"{"newsletterSections": []}"#.to_string(),
        )));
        let err = planner.plan(&ctx()).await.unwrap_err();
        assert!(matches!(err, NewsletterError::PlanParse(_)));
    }

    #[tokio::test]
    async fn test_plan_capped_at_six() {
        let sections: Vec<String> = (1..=8)
            .map(|i| format!("{{\"title\": \"Section {}\", \"description\": \"d\"}}", i))
            .collect();
        let raw = format!("{{\"newsletterSections\": [{}]}}", sections.join(","));

        let planner = SectionPlanner::new(Arc::new(StaticGenerator(raw)));
        let plan = planner.plan(&ctx()).await.unwrap();
        assert_eq!(plan.len(), 6);
        assert_eq!(plan[0].title, "Section 1");
        assert_eq!(plan[5].title, "Section 6");
    }
}
