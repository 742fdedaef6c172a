//! Core data models for the newsletter pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

//
// ================= Request =================
//

/// Immutable input to a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub topic: String,
    /// e.g. "Professional", "Funny"
    pub tone: String,
    pub audience: String,
}

impl RequestContext {
    pub fn new(
        topic: impl Into<String>,
        tone: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            tone: tone.into(),
            audience: audience.into(),
        }
    }
}

//
// ================= Plan =================
//

/// One planned content unit, produced by the planner and consumed by the drafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SectionPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Structural JSON document the planner instructs the generator to emit.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanResponse {
    #[serde(rename = "newsletterSections", default)]
    pub sections: Vec<SectionPlan>,
}

//
// ================= Research =================
//

/// One external finding; the URL is the identity key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchResult {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

//
// ================= Draft =================
//

/// A fully generated HTML fragment plus its extracted citation set.
/// `sources` preserves first-seen order with duplicates removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDraft {
    pub title: String,
    pub html: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

//
// ================= Final Artifact =================
//

/// Terminal output of one pipeline run.
///
/// `sources` maps URL -> best-known label; the `BTreeMap` keeps keys unique
/// and lexicographically sorted for deterministic output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newsletter {
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}
