mod collect;
mod generate;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chefclip-cli")]
#[command(about = "chefclip admin command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect (or re-collect) video data for one or more video references.
    Collect {
        /// Video ids or URLs to collect.
        video_refs: Vec<String>,
        /// Maximum top comments to collect per video.
        #[arg(long)]
        max_comments: Option<usize>,
        /// Preferred transcript language code.
        #[arg(long)]
        language: Option<String>,
        /// Re-collect even when the cached record is already complete.
        #[arg(long)]
        force: bool,
    },
    /// Run recipe extraction for a video synchronously and print the result.
    Generate {
        /// Video id or URL to generate a recipe for.
        video_ref: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = chefclip_core::load_app_config()?;
    let pool_config = chefclip_db::PoolConfig {
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        acquire_timeout_secs: config.db_acquire_timeout_secs,
    };
    let pool = chefclip_db::connect_pool(&config.database_url, pool_config).await?;
    chefclip_db::run_migrations(&pool).await?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Collect {
            video_refs,
            max_comments,
            language,
            force,
        } => {
            collect::run_collect(
                &pool,
                &config,
                &video_refs,
                max_comments,
                language.as_deref(),
                force,
            )
            .await
        }
        Commands::Generate { video_ref } => {
            generate::run_generate(&pool, &config, &video_ref).await
        }
    }
}
