//! End-to-end pipeline runs with scripted collaborators

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use newsletter_pipeline::config::Settings;
use newsletter_pipeline::drafter::SectionDrafter;
use newsletter_pipeline::llm::TextGenerator;
use newsletter_pipeline::market::{
    ChartRenderer, IndicatorReading, MarketDataAugmenter, MarketDataProvider, PricePoint,
    PriceSeries,
};
use newsletter_pipeline::models::{RequestContext, ResearchResult};
use newsletter_pipeline::pipeline::NewsletterPipeline;
use newsletter_pipeline::planner::SectionPlanner;
use newsletter_pipeline::render::Renderer;
use newsletter_pipeline::search::SearchProvider;
use newsletter_pipeline::subject::SubjectComposer;
use newsletter_pipeline::Result;

const TWO_SECTION_PLAN: &str = r#"{"newsletterSections": [
    {"title": "Global Frameworks", "description": "EU and US rulemaking"},
    {"title": "Industry Response", "description": "How companies react"}
]}"#;

/// Routes each call by the system prompt: plan, section body, or subject.
struct ScriptedGenerator {
    plan_json: String,
    subject: String,
    section_calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(plan_json: &str, subject: &str) -> Self {
        Self {
            plan_json: plan_json.to_string(),
            subject: subject.to_string(),
            section_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        if system.contains("table of contents") {
            return Ok(self.plan_json.clone());
        }

        if system.contains("newsletter section content") {
            self.section_calls.fetch_add(1, Ordering::SeqCst);
            let title = user
                .lines()
                .find_map(|l| l.strip_prefix("Section Title: "))
                .unwrap_or("untitled");
            let slug = title.to_lowercase().replace(' ', "-");
            return Ok(format!(
                "<p>Coverage of {}. Details at <a href=\"https://example.com/{}\">the report</a>.</p>",
                title, slug
            ));
        }

        Ok(self.subject.clone())
    }
}

struct StaticSearch {
    results: Vec<ResearchResult>,
    calls: AtomicUsize,
}

impl StaticSearch {
    fn empty() -> Self {
        Self {
            results: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str) -> Result<Vec<ResearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

struct FakeMarketData {
    available: bool,
}

#[async_trait]
impl MarketDataProvider for FakeMarketData {
    async fn fetch_series(
        &self,
        ticker: &str,
        _range: &str,
        _interval: &str,
    ) -> Option<PriceSeries> {
        if !self.available {
            return None;
        }
        Some(PriceSeries {
            ticker: ticker.to_string(),
            points: vec![
                PricePoint {
                    date: NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
                    close: 15.0,
                },
                PricePoint {
                    date: NaiveDate::from_ymd_opt(2026, 8, 4).unwrap(),
                    close: 15.6,
                },
            ],
        })
    }

    async fn latest_indicators(&self, series_ids: &[&str]) -> BTreeMap<String, IndicatorReading> {
        if !self.available {
            return BTreeMap::new();
        }
        series_ids
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    IndicatorReading {
                        value: 3.5,
                        as_of: NaiveDate::from_ymd_opt(2026, 7, 30).unwrap(),
                    },
                )
            })
            .collect()
    }
}

struct StubChart;

impl ChartRenderer for StubChart {
    fn render_line_chart(&self, _series: &PriceSeries, _title: &str) -> Option<String> {
        Some("data:image/png;base64,AAAA".to_string())
    }
}

fn ctx() -> RequestContext {
    RequestContext::new("AI Regulation", "Professional", "policy analysts")
}

fn build_pipeline(
    generator: Arc<ScriptedGenerator>,
    search: Arc<StaticSearch>,
    augmenter: Option<MarketDataAugmenter>,
    market_position: i32,
) -> NewsletterPipeline {
    let settings = Settings::default();
    let llm: Arc<dyn TextGenerator> = generator;
    let research: Arc<dyn SearchProvider> = search;

    NewsletterPipeline::new(
        SectionPlanner::new(llm.clone()),
        SectionDrafter::new(llm.clone(), research, settings.per_section_word_target),
        augmenter,
        SubjectComposer::new(llm),
        Renderer::new(settings.max_words).unwrap(),
        market_position,
    )
}

fn market_augmenter(available: bool) -> MarketDataAugmenter {
    MarketDataAugmenter::new(
        Arc::new(FakeMarketData { available }),
        Arc::new(StubChart),
    )
}

#[tokio::test]
async fn test_two_section_run_without_market_data() {
    let generator = Arc::new(ScriptedGenerator::new(TWO_SECTION_PLAN, "Weekly Briefing"));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator.clone(), search.clone(), None, 0);

    let newsletter = pipeline.run(&ctx()).await.unwrap();

    // The drafter ran once per planned section.
    assert_eq!(generator.section_calls.load(Ordering::SeqCst), 2);
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);

    assert_eq!(newsletter.subject, "Weekly Briefing");

    // Exactly the two planned sections, in plan order.
    let first = newsletter.html.find("Global Frameworks").unwrap();
    let second = newsletter.html.find("Industry Response").unwrap();
    assert!(first < second);
    assert!(!newsletter.html.contains("Markets at a Glance"));

    // Citations extracted from the generated anchors, sorted by URL.
    let urls: Vec<&String> = newsletter.sources.keys().collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com/global-frameworks",
            "https://example.com/industry-response"
        ]
    );
}

#[tokio::test]
async fn test_empty_search_still_produces_sections() {
    let generator = Arc::new(ScriptedGenerator::new(TWO_SECTION_PLAN, "Subject"));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator, search, None, 0);

    let newsletter = pipeline.run(&ctx()).await.unwrap();
    assert!(newsletter.html.contains("Coverage of Global Frameworks"));
    assert!(newsletter.html.contains("Coverage of Industry Response"));
}

#[tokio::test]
async fn test_market_section_inserted_at_position_zero() {
    let generator = Arc::new(ScriptedGenerator::new(TWO_SECTION_PLAN, "Subject"));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator, search, Some(market_augmenter(true)), 0);

    let newsletter = pipeline.run(&ctx()).await.unwrap();

    let market = newsletter.html.find("Markets at a Glance").unwrap();
    let first = newsletter.html.find("Global Frameworks").unwrap();
    assert!(market < first);
}

#[tokio::test]
async fn test_market_section_appended_for_negative_position() {
    let generator = Arc::new(ScriptedGenerator::new(TWO_SECTION_PLAN, "Subject"));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator, search, Some(market_augmenter(true)), -1);

    let newsletter = pipeline.run(&ctx()).await.unwrap();

    let market = newsletter.html.find("Markets at a Glance").unwrap();
    let second = newsletter.html.find("Industry Response").unwrap();
    assert!(second < market);
}

#[tokio::test]
async fn test_market_section_appended_for_out_of_range_position() {
    let generator = Arc::new(ScriptedGenerator::new(TWO_SECTION_PLAN, "Subject"));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator, search, Some(market_augmenter(true)), 99);

    let newsletter = pipeline.run(&ctx()).await.unwrap();

    let market = newsletter.html.find("Markets at a Glance").unwrap();
    let second = newsletter.html.find("Industry Response").unwrap();
    assert!(second < market);
}

#[tokio::test]
async fn test_failed_augmenter_degrades_to_no_market_section() {
    let generator = Arc::new(ScriptedGenerator::new(TWO_SECTION_PLAN, "Subject"));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator, search, Some(market_augmenter(false)), 0);

    let newsletter = pipeline.run(&ctx()).await.unwrap();

    // The run completes with the planned sections only.
    assert!(!newsletter.html.contains("Markets at a Glance"));
    assert!(newsletter.html.contains("Global Frameworks"));
    assert!(newsletter.html.contains("Industry Response"));
}

#[tokio::test]
async fn test_empty_subject_uses_deterministic_fallback() {
    let generator = Arc::new(ScriptedGenerator::new(TWO_SECTION_PLAN, ""));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator, search, None, 0);

    let newsletter = pipeline.run(&ctx()).await.unwrap();
    assert_eq!(
        newsletter.subject,
        "Ai Regulation — Global Frameworks, Industry Response"
    );
}

#[tokio::test]
async fn test_unparseable_plan_aborts_the_run() {
    let generator = Arc::new(ScriptedGenerator::new("not json at all", "Subject"));
    let search = Arc::new(StaticSearch::empty());
    let pipeline = build_pipeline(generator, search, None, 0);

    assert!(pipeline.run(&ctx()).await.is_err());
}
