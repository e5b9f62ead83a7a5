//! # oppcrawl CLI
//!
//! Command-line surface over the crawl, clean and extract pipeline.
//!
//! ## Subcommands
//!
//! - `scrape`: extract (and by default save) the opportunity on a page
//! - `generate-config`: propose include/exclude selectors for a page's domain
//! - `config`: save, list, show or delete domain configurations
//! - `opportunities`: list, show or delete saved opportunities
//!
//! Results are printed as JSON on stdout. Failures print a JSON error payload
//! and exit with status 1.

mod telemetry;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use oppcrawl::domain::CrawlerKind;
use oppcrawl::model::ModelChoice;
use oppcrawl::pipeline::Pipeline;
use oppcrawl::store::OpportunityStore;
use oppcrawl::{Error, Settings};
use serde::Serialize;
use serde_json::{Value, json};
use telemetry::OtelGuard;
use tracing::instrument;

#[derive(Parser)]
#[command(author, version, about = "Extract structured volunteer opportunities from web pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl a page and extract its volunteer opportunity
    Scrape(ScrapeArgs),

    /// Propose selectors for a page's domain
    GenerateConfig(GenerateConfigArgs),

    /// Manage per-domain selector configurations
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Inspect saved opportunities
    #[command(subcommand)]
    Opportunities(OpportunityCommand),
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// Page URL
    #[arg(required = true)]
    url: String,

    /// Primary model provider (gemini|gpt)
    #[arg(short, long, default_value = "gemini")]
    model: ModelChoice,

    /// Print the extracted record without saving it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct GenerateConfigArgs {
    /// Page URL
    #[arg(required = true)]
    url: String,

    /// Ask this model for selectors instead of using only the heuristic
    #[arg(short, long)]
    model: Option<ModelChoice>,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Create or replace a domain configuration
    Save(SaveConfigArgs),

    /// List all stored configurations
    List,

    /// Show the configuration for a domain
    Get { domain: String },

    /// Delete the configuration for a domain
    Delete { domain: String },
}

#[derive(Args, Debug)]
struct SaveConfigArgs {
    /// Domain, e.g. example.org
    #[arg(required = true)]
    domain: String,

    /// Include selectors (comma-separated, repeatable)
    #[arg(short, long)]
    include: Vec<String>,

    /// Exclude selectors (comma-separated, repeatable)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Crawler kind (get|js)
    #[arg(short, long, default_value = "get")]
    crawler: CrawlerKind,

    /// Selector to wait for when rendering headlessly
    #[arg(short, long)]
    wait_for: Option<String>,
}

#[derive(Subcommand, Debug)]
enum OpportunityCommand {
    /// List saved opportunities, newest first
    List {
        #[arg(long, default_value = "0")]
        offset: u32,

        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Show one opportunity
    Get { id: i64 },

    /// Delete one opportunity
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _otel: OtelGuard = telemetry::init_tracing_subscriber();

    match run(cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            println!("{}", serde_json::to_string_pretty(&err.payload())?);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(command: Commands) -> oppcrawl::Result<Value> {
    let settings = Settings::from_env()?;
    let pipeline = Pipeline::from_settings(&settings).await?;

    match command {
        Commands::Scrape(args) => scrape_command(&pipeline, args).await,
        Commands::GenerateConfig(args) => generate_config_command(&pipeline, args).await,
        Commands::Config(command) => config_command(&pipeline, command).await,
        Commands::Opportunities(command) => opportunity_command(&pipeline, command).await,
    }
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} [{elapsed}] {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn to_json<T: Serialize>(value: &T) -> oppcrawl::Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidConfig(format!("unserializable output: {e}")))
}

fn not_found(what: String) -> Value {
    json!({ "found": false, "message": format!("{what} not found") })
}

#[instrument(skip(pipeline))]
async fn scrape_command(pipeline: &Pipeline, args: ScrapeArgs) -> oppcrawl::Result<Value> {
    let progress = spinner(format!("Scraping {} with {}...", args.url, args.model));

    let result = if args.dry_run {
        pipeline
            .scrape(&args.url, args.model)
            .await
            .and_then(|output| to_json(&output))
    } else {
        pipeline
            .scrape_and_save(&args.url, args.model)
            .await
            .and_then(|saved| to_json(&saved))
    };

    progress.finish_and_clear();
    result
}

#[instrument(skip(pipeline))]
async fn generate_config_command(
    pipeline: &Pipeline,
    args: GenerateConfigArgs,
) -> oppcrawl::Result<Value> {
    let progress = spinner(format!("Generating selectors for {}...", args.url));
    let result = pipeline
        .generate_config_from_url(&args.url, args.model)
        .await
        .and_then(|generated| to_json(&generated));
    progress.finish_and_clear();
    result
}

async fn config_command(pipeline: &Pipeline, command: ConfigCommand) -> oppcrawl::Result<Value> {
    let resolver = pipeline.resolver();
    match command {
        ConfigCommand::Save(args) => {
            let saved = pipeline
                .save_config(
                    &args.domain,
                    &args.include,
                    &args.exclude,
                    args.crawler,
                    args.wait_for.as_deref(),
                )
                .await?;
            to_json(&saved)
        }
        ConfigCommand::List => to_json(&resolver.list().await?),
        ConfigCommand::Get { domain } => match resolver.get(&domain).await? {
            Some(config) => to_json(&config),
            None => Ok(not_found(format!("configuration for {domain}"))),
        },
        ConfigCommand::Delete { domain } => {
            let deleted = resolver.delete(&domain).await?;
            Ok(json!({ "domain": domain, "deleted": deleted }))
        }
    }
}

async fn opportunity_command(
    pipeline: &Pipeline,
    command: OpportunityCommand,
) -> oppcrawl::Result<Value> {
    let store = pipeline.opportunities();
    match command {
        OpportunityCommand::List { offset, limit } => to_json(&store.list(offset, limit).await?),
        OpportunityCommand::Get { id } => match store.get(id).await? {
            Some(opportunity) => to_json(&opportunity),
            None => Ok(not_found(format!("opportunity {id}"))),
        },
        OpportunityCommand::Delete { id } => {
            let deleted = store.delete(id).await?;
            Ok(json!({ "id": id, "deleted": deleted }))
        }
    }
}
