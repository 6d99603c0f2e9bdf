mod classify;
mod db;
mod html;
mod jobs;
mod parser;
mod queue;
mod runner;
mod scrape;
mod server;

use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use crate::jobs::JobType;

const API_KEY_ENV: &str = "ALBERT_SCRAPER_API_KEY";

#[derive(Parser)]
#[command(name = "albert-scraper", about = "NYU bulletin catalog scraper")]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = db::DEFAULT_DB_PATH)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TriggerTarget {
    Majors,
    Courses,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Enqueue a discovery job without going through the HTTP API
    Trigger {
        #[arg(value_enum)]
        target: TriggerTarget,
    },
    /// Run the trigger API server
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
    /// Consume the job queue
    Work {
        /// Messages pulled per batch
        #[arg(short = 'b', long, default_value = "8")]
        batch_size: usize,
        /// Drain the queue and exit instead of polling forever
        #[arg(long)]
        once: bool,
    },
    /// Re-run the parsers over cached pages, no network
    Reparse {
        /// Max pages to reparse (default: all cached)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show pipeline statistics
    Stats,
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
        Commands::Init => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            println!("Schema ready at {}", cli.db);
            Ok(())
        }
        Commands::Trigger { target } => {
            let shared = db::open_shared(&cli.db)?;
            let (job_type, root) = match target {
                TriggerTarget::Majors => (JobType::DiscoverPrograms, server::program_root()),
                TriggerTarget::Courses => (JobType::DiscoverCourses, server::course_root()),
            };
            let id = server::trigger_discovery(&shared, job_type, &root)?;
            println!("Enqueued {} job {}", job_type, id);
            Ok(())
        }
        Commands::Serve { addr } => {
            let api_key = std::env::var(API_KEY_ENV)
                .map_err(|_| anyhow::anyhow!("{API_KEY_ENV} must be set to serve"))?;
            let state = server::AppState { db: db::open_shared(&cli.db)?, api_key };
            server::serve(state, &addr).await
        }
        Commands::Work { batch_size, once } => {
            let shared = db::open_shared(&cli.db)?;
            let dispatcher = runner::Dispatcher::new(shared.clone())?;
            let worker = queue::Worker::new(shared, dispatcher, batch_size);
            if once {
                let n = worker.run_until_idle().await?;
                println!("Handled {} messages.", n);
                Ok(())
            } else {
                worker.run().await
            }
        }
        Commands::Reparse { limit } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let pages = db::fetch_cached_pages(&conn, limit)?;
            if pages.is_empty() {
                println!("No cached pages. Run 'work' first.");
                return Ok(());
            }
            println!("Reparsing {} cached pages...", pages.len());
            let counts = reparse_pages(&conn, &pages)?;
            println!("Saved {} programs, {} courses.", counts.programs, counts.courses);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Jobs:       {}", s.jobs_total);
            println!("  pending:    {}", s.pending);
            println!("  processing: {}", s.processing);
            println!("  completed:  {}", s.completed);
            println!("  failed:     {}", s.failed);
            println!("Queued:     {}", s.queued);
            println!("Errors:     {}", s.errors);
            println!("Programs:   {}", s.programs);
            println!("Courses:    {}", s.courses);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ReparseCounts {
    programs: usize,
    courses: usize,
}

/// Page parsing is pure, so cached pages re-parse in parallel; only the
/// upserts run on this thread against the single connection.
fn reparse_pages(
    conn: &rusqlite::Connection,
    pages: &[db::CachedPage],
) -> anyhow::Result<ReparseCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    enum Parsed {
        Program(db::ProgramRecord, Vec<db::RequirementSection>),
        Courses(Vec<(db::CourseRecord, Vec<db::Clause>)>),
    }

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ReparseCounts { programs: 0, courses: 0 };

    for chunk in pages.chunks(100) {
        let results: Vec<Parsed> = chunk
            .par_iter()
            .map(|page| match page.job_type {
                JobType::Program => {
                    let (record, reqs) = scrape::program::parse_program_page(&page.html, &page.url);
                    Parsed::Program(record, reqs)
                }
                _ => Parsed::Courses(scrape::course::parse_course_page(&page.html, &page.url)),
            })
            .collect();

        for parsed in results {
            match parsed {
                Parsed::Program(record, reqs) => {
                    if db::upsert_program_with_requirements(conn, &record, &reqs)?.is_some() {
                        counts.programs += 1;
                    }
                }
                Parsed::Courses(records) => {
                    for (record, prereqs) in &records {
                        if db::upsert_course_with_prerequisites(conn, record, prereqs)?.is_some() {
                            counts.courses += 1;
                        }
                    }
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
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
