//! CLI administration tool for linkrelay.
//!
//! Inspects the link store and repairs rows left behind by interrupted
//! short code allocations, without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # List placeholder rows
//! cargo run --bin admin -- placeholders list --limit 20
//!
//! # Rename placeholders to their derived codes
//! cargo run --bin admin -- placeholders repair
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (or `DB_HOST`/`DB_USER`/...): PostgreSQL connection
//! - `BASE_URL` (optional): used when printing short URLs

use linkrelay::application::services::LinkService;
use linkrelay::config::Config;
use linkrelay::domain::repositories::LinkRepository;
use linkrelay::infrastructure::persistence::PgLinkRepository;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing linkrelay.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Show statistics
    Stats,

    /// Inspect or repair placeholder rows
    Placeholders {
        #[command(subcommand)]
        action: PlaceholderAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Placeholder subcommands.
#[derive(Subcommand)]
enum PlaceholderAction {
    /// List rows that still carry a placeholder code
    List {
        /// Maximum rows to show
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },

    /// Rename placeholder rows to their derived base62 code
    Repair {
        /// Maximum rows to repair
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = Config::load_database_url()?;

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Stats => handle_stats(&pool).await?,
        Commands::Placeholders { action } => handle_placeholder_action(action, &pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

fn link_service(pool: &PgPool) -> LinkService<PgLinkRepository> {
    let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let repo = Arc::new(PgLinkRepository::new(Arc::new(pool.clone())));
    LinkService::new(repo, base_url.trim_end_matches('/'), usize::MAX)
}

/// Dispatches placeholder commands.
async fn handle_placeholder_action(action: PlaceholderAction, pool: &PgPool) -> Result<()> {
    let service = link_service(pool);

    match action {
        PlaceholderAction::List { limit } => list_placeholders(&service, limit).await?,
        PlaceholderAction::Repair { limit, yes } => {
            repair_placeholders(&service, limit, yes).await?
        }
    }

    Ok(())
}

/// Lists placeholder rows, oldest first.
///
/// # Output Format
///
/// ```text
/// 🧩 Placeholder Links
///
///   ID     Code                     Created              Long URL
///   ───────────────────────────────────────────────────────────────────────────
///   42     temp_3q2-7wEVr1zT0kMa    2025-01-15 10:30     https://example.com/a
/// ```
async fn list_placeholders(service: &LinkService<PgLinkRepository>, limit: i64) -> Result<()> {
    println!("{}", "🧩 Placeholder Links".bright_blue().bold());
    println!();

    let links = service
        .find_placeholders(limit)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list placeholders: {}", e))?;

    if links.is_empty() {
        println!("{}", "  No placeholder rows found".green());
        return Ok(());
    }

    println!(
        "  {:<6} {:<24} {:<20} {}",
        "ID".bright_white().bold(),
        "Code".bright_white().bold(),
        "Created".bright_white().bold(),
        "Long URL".bright_white().bold()
    );
    println!("  {}", "─".repeat(75).bright_black());

    for link in &links {
        println!(
            "  {:<6} {:<24} {:<20} {}",
            link.id.to_string().bright_black(),
            link.short_code.yellow(),
            link.created_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black(),
            link.long_url.cyan()
        );
    }

    println!();
    println!("  Shown: {}", links.len().to_string().bright_white().bold());
    println!();

    Ok(())
}

/// Renames placeholder rows to their derived codes with confirmation prompt.
///
/// Rows whose derived code is already held by a custom link are reported
/// and left untouched.
async fn repair_placeholders(
    service: &LinkService<PgLinkRepository>,
    limit: i64,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🔧 Repair Placeholder Links".bright_blue().bold());
    println!();

    let pending = service
        .find_placeholders(limit)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list placeholders: {}", e))?;

    if pending.is_empty() {
        println!("{}", "  Nothing to repair".green());
        return Ok(());
    }

    println!(
        "  Rows to repair: {}",
        pending.len().to_string().bright_yellow().bold()
    );
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Rename these rows to their derived codes?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let report = service
        .repair_placeholders(limit)
        .await
        .map_err(|e| anyhow::anyhow!("Repair failed: {}", e))?;

    for link in &report.repaired {
        println!(
            "  {} {:<6} {}",
            "✓".green(),
            link.id.to_string().bright_black(),
            service.build_short_url(&link.short_code).cyan()
        );
    }
    for id in &report.conflicts {
        println!(
            "  {} {:<6} {}",
            "✗".red(),
            id.to_string().bright_black(),
            "derived code already taken".yellow()
        );
    }

    println!();
    println!(
        "{} repaired, {} conflicts",
        report.repaired.len().to_string().green().bold(),
        report.conflicts.len().to_string().red().bold()
    );
    println!();

    Ok(())
}

/// Displays link statistics.
///
/// Shows:
/// - Total number of links
/// - Total recorded clicks
/// - Rows still holding a placeholder code
async fn handle_stats(pool: &PgPool) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let links_count = PgLinkRepository::new(Arc::new(pool.clone()))
        .count()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to count links: {}", e))?;

    let clicks_count: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(click_count), 0)::BIGINT FROM links")
            .fetch_one(pool)
            .await?;

    let placeholder_count: i64 =
        sqlx::query_scalar(r"SELECT COUNT(*) FROM links WHERE short_code LIKE 'temp\_%'")
            .fetch_one(pool)
            .await?;

    println!(
        "  Links:        {}",
        links_count.to_string().bright_green().bold()
    );
    println!(
        "  Clicks:       {}",
        clicks_count.to_string().bright_green().bold()
    );
    println!(
        "  Placeholders: {}",
        placeholder_count.to_string().bright_yellow().bold()
    );
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!();
        }
    }

    Ok(())
}
