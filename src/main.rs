use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use das_harvest::{Config, Harvester, Overrides};

#[derive(Parser)]
#[command(name = "das-harvest")]
#[command(about = "Download every image in a DAS collection whose metadata carries a trait")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Optional TOML configuration file
    #[arg(short, long, env = "DAS_HARVEST_CONFIG")]
    config: Option<String>,

    /// DAS API key
    #[arg(long, env = "HELIUS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// DAS RPC endpoint (without the api-key query)
    #[arg(long, env = "DAS_RPC_URL")]
    rpc_url: Option<String>,

    /// Assets per page
    #[arg(long, env = "GORB_PAGE_LIMIT")]
    page_limit: Option<u32>,

    /// First page to fetch (1-based)
    #[arg(long, env = "GORB_PAGE_START")]
    page_start: Option<u32>,

    /// Stop after this many pages
    #[arg(long, env = "GORB_MAX_PAGES")]
    max_pages: Option<u32>,

    /// Directory the images are written to
    #[arg(short, long, env = "GORB_OUT_DIR")]
    out_dir: Option<String>,

    /// Any mint of the target collection
    #[arg(long, env = "GORB_SAMPLE_MINT")]
    sample_mint: Option<String>,

    /// Trait value to match (case-insensitive)
    #[arg(long, env = "GORB_TRAIT_VALUE")]
    trait_value: Option<String>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, env = "DAS_HARVEST_LOG")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate, filter and download (default)
    Run,
    /// Show how the collection would be enumerated, without downloading
    Discover,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            api_key: self.api_key.clone(),
            rpc_url: self.rpc_url.clone(),
            page_limit: self.page_limit,
            page_start: self.page_start,
            max_pages: self.max_pages,
            out_dir: self.out_dir.clone(),
            sample_mint: self.sample_mint.clone(),
            trait_value: self.trait_value.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())
        .with_context(|| format!("Failed to load config from {}", cli.config.as_deref().unwrap_or("defaults")))?;
    config.apply_overrides(cli.overrides());

    config.expand_paths()
        .with_context(|| "Failed to expand paths in config")?;

    init_logging(&config.logging.level)?;

    config.validate()
        .with_context(|| "Configuration validation failed")?;

    let mut harvester = Harvester::from_config(&config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&mut harvester).await,
        Commands::Discover => discover(&harvester).await,
    }
}

async fn run(harvester: &mut Harvester) -> Result<()> {
    tracing::info!("Starting das-harvest v{}", env!("CARGO_PKG_VERSION"));

    let summary = harvester.run().await?;

    if let Some(strategy) = &summary.strategy {
        println!("Enumerated via {}", strategy);
    }
    println!("{}", summary);
    println!("Done. Images are in: {}", summary.out_dir.display());

    Ok(())
}

async fn discover(harvester: &Harvester) -> Result<()> {
    let chain = harvester.discover().await?;

    println!("Enumeration plan ({}):", harvester.client().display_url());
    for (i, strategy) in chain.iter().enumerate() {
        let role = if i == 0 { "primary" } else { "fallback" };
        println!("  {}. {} ({})", i + 1, strategy, role);
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .with_context(|| format!("Invalid log level: {}", level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(())
}
