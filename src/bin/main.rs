use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use newsletter_pipeline::config::Settings;
use newsletter_pipeline::emailer::send_email;
use newsletter_pipeline::models::RequestContext;
use newsletter_pipeline::pipeline::NewsletterPipeline;

/// Generate and send a research-backed newsletter
#[derive(Debug, Parser)]
#[command(name = "newsletter")]
struct Cli {
    /// Newsletter topic
    #[arg(long)]
    topic: String,

    /// Tone (e.g., Professional, Funny)
    #[arg(long)]
    tone: String,

    /// Target audience description
    #[arg(long)]
    audience: String,

    /// Email recipients (optional)
    #[arg(long = "to", num_args = 1..)]
    to: Vec<String>,

    /// Send via SMTP if configured
    #[arg(long)]
    send_email: bool,

    /// LLM provider override (openai or anthropic)
    #[arg(long)]
    provider: Option<String>,

    /// LLM model override
    #[arg(long)]
    model: Option<String>,

    /// Directory to write outputs
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(provider) = &cli.provider {
        settings.llm_provider = provider.parse()?;
    }
    if let Some(model) = &cli.model {
        settings.llm_model = model.clone();
    }
    if let Some(output_dir) = &cli.output_dir {
        settings.output_dir = output_dir.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(topic = %cli.topic, provider = %settings.llm_provider, "Newsletter pipeline starting");

    let pipeline = NewsletterPipeline::from_settings(&settings)?;
    let ctx = RequestContext::new(cli.topic, cli.tone, cli.audience);

    match pipeline.run(&ctx).await {
        Ok(newsletter) => {
            tokio::fs::create_dir_all(&settings.output_dir).await?;
            let html_path = settings.output_dir.join("newsletter.html");
            tokio::fs::write(settings.output_dir.join("subject.txt"), &newsletter.subject)
                .await?;
            tokio::fs::write(&html_path, &newsletter.html).await?;

            println!("Subject: {}", newsletter.subject);
            println!("Wrote HTML: {}", html_path.display());

            if cli.send_email && !cli.to.is_empty() {
                send_email(&settings, &newsletter.subject, &newsletter.html, &cli.to).await?;
                println!("Email sent to: {}", cli.to.join(", "));
            } else if cli.send_email {
                println!("--send-email provided but --to is empty; skipped sending.");
            }

            Ok(())
        }
        Err(e) => {
            eprintln!("Newsletter generation failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
