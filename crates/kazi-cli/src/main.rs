mod export;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use kazi_client::llm::{DEFAULT_BASE_URL, DEFAULT_LLM_TIMEOUT};
use kazi_client::{JobBoard, ListingCleaner, ListingScraper, OpenAiClient, ReqwestFetcher};
use kazi_core::models::Category;
use kazi_core::{
    ClassificationPath, Classifier, Collector, CollectorConfig, IngestionPipeline, NullStore,
    OpportunityStore, PersistenceGateway, RunOutput, TracingReporter,
};
use kazi_db::{Database, DatabaseConfig};

type BoardScraper = ListingScraper<ReqwestFetcher, ListingCleaner, OpenAiClient>;

#[derive(Parser)]
#[command(name = "kazi", version, about = "KaziLink opportunity ingester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all job boards, classify the postings and store new ones
    Run {
        /// Classify but do not touch the database
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Listing pages to walk per board
        #[arg(short, long, default_value_t = 3)]
        pages: u32,

        /// Also write the categorized records to this CSV file
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Boards to scrape (defaults to all)
        #[arg(short, long, value_delimiter = ',')]
        sources: Vec<JobBoard>,

        /// Upper bound on one board's scrape, in seconds
        #[arg(long, env = "KAZI_SOURCE_TIMEOUT_SECS", default_value_t = 300)]
        source_timeout: u64,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Classify a single posting and show how the category was decided
    Classify {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long)]
        company: Option<String>,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// List the most recently stored opportunities
    Recent {
        /// Only show one category (attachment, internship, job)
        #[arg(short, long)]
        category: Option<Category>,

        /// Number of results to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args)]
struct LlmArgs {
    /// API key for the classification and extraction model
    #[arg(long, env = "KAZI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// LLM model to use (e.g., "gpt-4", "gpt-4o-mini")
    #[arg(short, long, env = "KAZI_MODEL", default_value = "gpt-4")]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(short, long, env = "KAZI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Upper bound on one LLM request, in seconds
    #[arg(long, env = "KAZI_LLM_TIMEOUT_SECS", default_value_t = DEFAULT_LLM_TIMEOUT.as_secs())]
    llm_timeout: u64,
}

impl LlmArgs {
    fn client(&self) -> Result<OpenAiClient> {
        OpenAiClient::with_base_url(&self.api_key, &self.model, &self.base_url)
            .and_then(|c| c.with_timeout(Duration::from_secs(self.llm_timeout)))
            .context("Failed to create LLM client")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("kazi=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            dry_run,
            pages,
            export,
            sources,
            source_timeout,
            llm,
        } => {
            let boards = if sources.is_empty() {
                JobBoard::ALL.to_vec()
            } else {
                sources
            };
            cmd_run(
                &boards,
                pages,
                dry_run,
                export.as_deref(),
                Duration::from_secs(source_timeout),
                &llm,
            )
            .await?;
        }
        Commands::Classify {
            title,
            description,
            company,
            llm,
        } => {
            cmd_classify(&title, &description, company.as_deref(), &llm).await?;
        }
        Commands::Recent { category, limit } => {
            cmd_recent(category, limit).await?;
        }
    }

    Ok(())
}

/// Cancel the returned token on Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            token.cancel();
        }
    });
    cancel
}

async fn cmd_run(
    boards: &[JobBoard],
    pages: u32,
    dry_run: bool,
    export: Option<&std::path::Path>,
    source_timeout: Duration,
    llm: &LlmArgs,
) -> Result<()> {
    // Store credentials are checked even for a dry run
    let db_config = DatabaseConfig::from_env().context("Database configuration")?;

    let client = llm.client()?;
    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let cleaner = ListingCleaner::new();

    let scrapers: Vec<BoardScraper> = boards
        .iter()
        .map(|board| ListingScraper::new(*board, fetcher.clone(), cleaner.clone(), client.clone()))
        .collect();
    let collector = Collector::new(scrapers).with_config(CollectorConfig::new(source_timeout));
    let classifier = Classifier::new(client);
    let cancel = cancel_on_interrupt();

    let output = if dry_run {
        tracing::info!("Dry run: nothing will be written to the database");
        let gateway = PersistenceGateway::new(NullStore).dry_run(true);
        execute(collector, classifier, gateway, pages, &cancel).await
    } else {
        let db = Database::connect(&db_config)
            .await
            .context("Failed to connect to database")?;
        db.migrate().await.context("Failed to run migrations")?;
        let gateway = PersistenceGateway::new(db.opportunity_repo());
        execute(collector, classifier, gateway, pages, &cancel).await
    };

    if let Some(path) = export {
        export::write_csv(path, &output.records)?;
        tracing::info!(path = %path.display(), rows = output.records.len(), "Exported records");
    }

    let report = &output.report;
    println!("Run finished in {:.1}s", report.elapsed.as_secs_f64());
    for (platform, count) in &report.collected {
        match report.source_errors.get(platform) {
            Some(error) => println!("  {platform}: failed ({error})"),
            None => println!("  {platform}: {count} postings"),
        }
    }
    println!(
        "Unique: {} (attachments: {}, internships: {}, jobs: {})",
        report.unique,
        report.categories.attachment,
        report.categories.internship,
        report.categories.job
    );
    if report.persisted.dry_run {
        println!("Dry run: nothing saved");
    } else {
        println!(
            "Saved: {}, Skipped: {}, Errors: {}",
            report.persisted.saved, report.persisted.skipped, report.persisted.errors
        );
    }

    Ok(())
}

async fn execute<St: OpportunityStore>(
    collector: Collector<BoardScraper>,
    classifier: Classifier<OpenAiClient>,
    gateway: PersistenceGateway<St>,
    pages: u32,
    cancel: &CancellationToken,
) -> RunOutput {
    IngestionPipeline::new(collector, classifier, gateway)
        .run(pages, cancel, &TracingReporter)
        .await
}

async fn cmd_classify(
    title: &str,
    description: &str,
    company: Option<&str>,
    llm: &LlmArgs,
) -> Result<()> {
    let client = llm.client()?;
    let model = client.model().to_string();
    let classifier = Classifier::new(client);
    let classification = classifier.classify(title, description, company).await;

    println!("{}", classification.category);
    match classification.path {
        ClassificationPath::Oracle => println!("  decided by: {model}"),
        ClassificationPath::Fallback(reason) => {
            println!("  decided by: keyword fallback ({reason:?})")
        }
    }

    Ok(())
}

async fn cmd_recent(category: Option<Category>, limit: usize) -> Result<()> {
    let config = DatabaseConfig::from_env().context("Database configuration")?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;

    let opportunities = db
        .opportunity_repo()
        .list_recent(category, limit)
        .await
        .context("Failed to list opportunities")?;

    if opportunities.is_empty() {
        println!("No opportunities stored yet");
        return Ok(());
    }

    for o in &opportunities {
        println!(
            "  [{}] {} | {} | {} ({}, {})",
            o.record.category,
            o.created_at.format("%Y-%m-%d %H:%M"),
            o.record.title(),
            o.record.record.company,
            o.record.record.source_platform,
            o.record.status,
        );
        println!("      {}", o.record.source_url());
    }

    println!("\nTotal: {} opportunities", opportunities.len());

    Ok(())
}
