//! Newsletter pipeline orchestrator
//!
//! PLAN → DRAFT × N → AUGMENT? → SUBJECT → RENDER
//!
//! Planning and drafting failures abort the run; market augmentation is an
//! isolated failure domain that degrades to "no market section".

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::drafter::SectionDrafter;
use crate::llm::build_generator;
use crate::market::{LineChartRenderer, MarketDataAugmenter, MarketDataClient};
use crate::models::{Newsletter, RequestContext, SectionDraft};
use crate::planner::SectionPlanner;
use crate::render::Renderer;
use crate::search::{SearchProvider, TavilySearch};
use crate::subject::SubjectComposer;
use crate::Result;

pub struct NewsletterPipeline {
    planner: SectionPlanner,
    drafter: SectionDrafter,
    augmenter: Option<MarketDataAugmenter>,
    composer: SubjectComposer,
    renderer: Renderer,
    market_position: i32,
}

impl NewsletterPipeline {
    pub fn new(
        planner: SectionPlanner,
        drafter: SectionDrafter,
        augmenter: Option<MarketDataAugmenter>,
        composer: SubjectComposer,
        renderer: Renderer,
        market_position: i32,
    ) -> Self {
        Self {
            planner,
            drafter,
            augmenter,
            composer,
            renderer,
            market_position,
        }
    }

    /// Wire the pipeline with the real collaborators for these settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let generator = build_generator(settings);
        let research: Arc<dyn SearchProvider> = Arc::new(TavilySearch::new(settings));

        let augmenter = settings.enable_market_data.then(|| {
            MarketDataAugmenter::new(
                Arc::new(MarketDataClient::new()),
                Arc::new(LineChartRenderer::new()),
            )
        });

        Ok(Self::new(
            SectionPlanner::new(generator.clone()),
            SectionDrafter::new(
                generator.clone(),
                research,
                settings.per_section_word_target,
            ),
            augmenter,
            SubjectComposer::new(generator),
            Renderer::new(settings.max_words)?,
            settings.market_data_position,
        ))
    }

    /// Run one full generation pass and return the final artifact.
    pub async fn run(&self, ctx: &RequestContext) -> Result<Newsletter> {
        info!(topic = %ctx.topic, tone = %ctx.tone, "Pipeline starting");

        // === PLAN ===
        let plan = self.planner.plan(ctx).await?;

        // === DRAFT ===
        // Sequential, in plan order; a single section failure aborts the run.
        let mut sections: Vec<SectionDraft> = Vec::with_capacity(plan.len());
        for section_plan in &plan {
            debug!(section = %section_plan.title, "Drafting section");
            sections.push(self.drafter.draft(ctx, section_plan).await?);
        }

        // === AUGMENT (non-fatal) ===
        if let Some(augmenter) = &self.augmenter {
            match augmenter.augment(ctx).await {
                Ok(draft) => {
                    let at = insertion_index(self.market_position, sections.len());
                    debug!(index = at, "Inserting market section");
                    sections.insert(at, draft);
                }
                Err(e) => {
                    warn!("Market augmentation failed; continuing without it: {}", e);
                }
            }
        }

        // === SUBJECT ===
        let subject = self.composer.compose(ctx, &sections).await?;

        // === RENDER ===
        let (html, sources) = self.renderer.render(&subject, &sections)?;

        info!(
            sections = sections.len(),
            sources = sources.len(),
            "Pipeline complete"
        );

        Ok(Newsletter {
            subject,
            html,
            sources,
        })
    }
}

/// A non-negative in-range position is a literal insertion index; anything
/// else appends at the end.
fn insertion_index(position: i32, len: usize) -> usize {
    if position >= 0 && (position as usize) < len {
        position as usize
    } else {
        len
    }
}
