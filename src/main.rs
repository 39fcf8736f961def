mod aggregates;
mod artifacts;
mod canonical;
mod catalog;
mod dates;
mod db;
mod filter;
mod named;
mod parser;
mod tagger;
mod wp;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wod_etl", about = "WOD blog archive to canonical analytics records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch WOD posts from the WordPress API into the local cache
    Fetch {
        /// Max API pages to fetch (default: all)
        #[arg(short = 'n', long)]
        max_pages: Option<u32>,
        /// Posts per API page
        #[arg(long, default_value = "100")]
        per_page: u32,
    },
    /// Fetch comment counts for cached posts that lack one
    Comments {
        /// Max posts to fetch counts for (default: all missing)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Build canonical records and derived artifacts from the cache
    Build(BuildArgs),
    /// Fetch + comments + build in one pipeline
    Run(BuildArgs),
    /// Show cache statistics
    Stats,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Max cached posts to process (default: all)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Output directory for derived artifacts
    #[arg(short, long, default_value = "data/derived")]
    out: PathBuf,
    /// Catalog directory (movements.toml, named_workouts.toml)
    #[arg(long, default_value = "config")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch { max_pages, per_page } => {
            let conn = db::connect(db::DB_PATH)?;
            println!("Fetching posts (streaming pages)...");
            let rows = wp::fetch_posts(per_page, max_pages).await?;
            let written = db::insert_raw_posts(&conn, &rows)?;
            println!("Cached {} posts.", written);
            Ok(())
        }
        Commands::Comments { limit } => {
            let conn = db::connect(db::DB_PATH)?;
            let ids = db::fetch_posts_missing_comments(&conn, limit)?;
            if ids.is_empty() {
                println!("No posts missing comment counts. Run 'fetch' first or all are cached.");
                return Ok(());
            }
            println!("Fetching comment counts for {} posts...", ids.len());
            let stats = wp::fetch_comment_counts_streaming(&conn, ids).await?;
            println!(
                "Done: {} of {} fetched ({} errors).",
                stats.ok, stats.total, stats.errors
            );
            Ok(())
        }
        Commands::Build(args) => {
            let conn = db::connect(db::DB_PATH)?;
            build(&conn, &args)
        }
        Commands::Run(args) => {
            let conn = db::connect(db::DB_PATH)?;

            let t_fetch = Instant::now();
            println!("Pipeline: fetching posts...");
            let rows = wp::fetch_posts(100, None).await?;
            let written = db::insert_raw_posts(&conn, &rows)?;
            println!("Cached {} posts in {:.1}s", written, t_fetch.elapsed().as_secs_f64());

            let missing = db::fetch_posts_missing_comments(&conn, None)?;
            if !missing.is_empty() {
                println!("Fetching comment counts for {} posts...", missing.len());
                let stats = wp::fetch_comment_counts_streaming(&conn, missing).await?;
                println!(
                    "Comment counts: {} of {} fetched ({} errors).",
                    stats.ok, stats.total, stats.errors
                );
            }

            build(&conn, &args)
        }
        Commands::Stats => {
            let conn = db::connect(db::DB_PATH)?;
            let s = db::get_stats(&conn)?;
            println!("Posts cached:    {}", s.posts);
            println!("Comment counts:  {}", s.with_comments);
            println!(
                "First published: {}",
                s.first_published.as_deref().unwrap_or("-")
            );
            println!(
                "Last published:  {}",
                s.last_published.as_deref().unwrap_or("-")
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct BuildCounts {
    posts: usize,
    workouts: usize,
    rest_days: usize,
    skipped: usize,
    heroes: usize,
    girls: usize,
}

impl BuildCounts {
    fn print(&self) {
        println!(
            "Built {} records ({} workouts, {} rest days, {} skipped); {} hero and {} girl workouts matched.",
            self.posts, self.workouts, self.rest_days, self.skipped, self.heroes, self.girls,
        );
    }
}

fn build(conn: &rusqlite::Connection, args: &BuildArgs) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;
    use tracing::warn;

    let movements = catalog::load_movements(&args.config.join("movements.toml"))?;
    let named_catalog = catalog::load_named(&args.config.join("named_workouts.toml"))?;

    let rows = db::fetch_raw_posts(conn, args.limit)?;
    if rows.is_empty() {
        println!("No cached posts. Run 'fetch' first.");
        return Ok(());
    }
    let comment_counts = db::fetch_comment_counts(conn)?;

    println!("Processing {} posts...", rows.len());
    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut parsed = Vec::with_capacity(rows.len());
    for chunk in rows.chunks(500) {
        parsed.extend(chunk.par_iter().map(parser::process_post).collect::<Vec<_>>());
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    let out = canonical::build(parsed, &movements, &comment_counts);
    for skip in &out.skipped {
        warn!("skipping post {} ({}): {}", skip.id, skip.title, skip.reason);
    }

    let named = named::build(&out.canonical, &named_catalog);
    let aggs = aggregates::build(&out.canonical);
    artifacts::write_all(&args.out, &out.canonical, &named, &aggs)?;

    let counts = BuildCounts {
        posts: out.canonical.len(),
        workouts: out.canonical.iter().filter(|c| !c.is_rest_day).count(),
        rest_days: out.canonical.iter().filter(|c| c.is_rest_day).count(),
        skipped: out.skipped.len(),
        heroes: named.heroes.len(),
        girls: named.girls.len(),
    };
    counts.print();
    println!("Artifacts written to {}", args.out.display());
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
