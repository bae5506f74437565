use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use stablebook_lib::{
    config::AppConfig, db::open_sqlite_pool, http, logging::init_logging,
    migrate::apply_migrations, AppState,
};

#[derive(Debug, Parser)]
#[command(name = "stablebook", about = "Stable records service", version)]
struct Cli {
    /// Configuration file; `stablebook.toml` in the working directory when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP server (default).
    Serve,
    /// Database maintenance commands.
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply pending schema migrations and exit.
    Migrate,
}

fn main() {
    let cli = Cli::parse();
    let config = match AppConfig::load_with_dotenv(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(2);
        }
    };
    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(2);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: start runtime: {err}");
            process::exit(1);
        }
    };
    let result = runtime.block_on(async {
        match cli.command.unwrap_or(Commands::Serve) {
            Commands::Serve => serve(config).await,
            Commands::Db(DbCommand::Migrate) => migrate_only(config).await,
        }
    });
    if let Err(err) = result {
        tracing::error!(target: "stablebook", event = "fatal", error = %format!("{err:#}"));
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn migrate_only(config: AppConfig) -> Result<()> {
    let pool = open_sqlite_pool(&config.storage.database_path)
        .await
        .context("open database")?;
    apply_migrations(&pool).await.context("apply migrations")?;
    pool.close().await;
    println!("migrations applied: {}", config.storage.database_path.display());
    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    let pool = open_sqlite_pool(&config.storage.database_path)
        .await
        .context("open database")?;
    apply_migrations(&pool).await.context("apply migrations")?;
    let state = AppState::from_config(pool.clone(), config).context("build application state")?;
    http::serve(state, shutdown_signal()).await?;
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target: "stablebook", event = "signal_listener_failed", error = %err);
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "stablebook", event = "shutdown_requested");
}
