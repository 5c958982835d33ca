mod collab;
mod config;
mod db;
mod dedup;
mod error;
mod filters;
mod matcher;
mod message;
mod models;
mod normalize;
mod notify;
mod pipeline;
mod privacy;
mod scoring;
mod status;
mod store;
mod telemetry;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use collab::{JsonExtractor, KeywordClassifier};
use config::Config;
use db::Database;
use dedup::{DedupEntry, OverlayDedupStore};
use error::PipelineError;
use message::InboundMessage;
use models::{DecisionRecord, Eligibility, SignalLabel, Status};
use notify::LogNotifier;
use pipeline::{MessageOutcome, Pipeline, RunStats, StatusUpdate};
use serde_json::Value;
use std::path::{Path, PathBuf};
use store::{JobStore, MemoryJobStore};

#[derive(Parser)]
#[command(name = "potato")]
#[command(about = "Job posting eligibility, ranking and application status tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Decide a batch of extracted postings (JSON array)
    Process {
        /// Path to the extraction output
        file: PathBuf,

        /// Show decisions without recording anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply a classified status signal to a tracked job
    Signal {
        /// Posting URL (any variant that normalizes to the job's key)
        url: String,

        /// Confirmation, OAInvite, PhoneInvite, TechInvite, OfferLetter, Rejection or None
        label: String,
    },

    /// Classify a raw email (.eml) and apply it to a tracked job
    Message {
        /// Posting URL the message refers to
        url: String,

        /// Path to the raw message
        file: PathBuf,
    },

    /// Mark a job as ghosted
    Ghost {
        /// Posting URL
        url: String,
    },

    /// Forget filtered postings so they are re-evaluated on the next run
    ClearFiltered,

    /// List tracked jobs
    List {
        /// Filter by status (New, Applied, OA, Phone, Technical, Offer, Rejected, Ghosted)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a job and its status history
    Show {
        /// Posting URL
        url: String,
    },

    /// Print the normalized key for a URL
    Normalize {
        /// URL to normalize
        url: String,
    },

    /// Check a company name against the target-company list
    Match {
        /// Company name
        company: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Invalid configuration")?;
    telemetry::init(&config.log_level)?;
    let notifier = LogNotifier;

    match cli.command {
        Commands::Init => {
            let db = Database::open(&config.db_path())?;
            db.init()?;
            if let Some(path) = db.path() {
                println!("Database initialized at {}", path.display());
            }
        }

        Commands::Process { file, dry_run } => {
            let db = open_initialized(&config)?;
            let raws = read_batch(&file)?;

            if dry_run {
                let overlay = OverlayDedupStore::new(&db);
                let preview = MemoryJobStore::new();
                let (decisions, stats) = Pipeline::new(&config, &overlay, &notifier)
                    .process_batch(&raws, &JsonExtractor, Some(&preview));
                print_decisions(&decisions);
                print_stats(&stats);
                println!(
                    "\n(Dry run - {} jobs would be tracked, nothing was recorded)",
                    preview.list_jobs(None)?.len()
                );
            } else {
                let (decisions, stats) = Pipeline::new(&config, &db, &notifier)
                    .process_batch(&raws, &JsonExtractor, Some(&db));
                print_decisions(&decisions);
                print_stats(&stats);
            }
        }

        Commands::Signal { url, label } => {
            let db = open_initialized(&config)?;
            let label = parse_label(&label)?;
            let pipeline = Pipeline::new(&config, &db, &notifier);
            match pipeline.apply_signal(&db, &url, label) {
                Ok(Some(update)) => print_update(&update),
                Ok(None) => println!("No signal; status unchanged."),
                Err(e @ PipelineError::InvalidTransition { .. }) => println!("Ignored: {}", e),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Message { url, file } => {
            let db = open_initialized(&config)?;
            let raw = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let message = InboundMessage::parse(&raw)?;
            let pipeline = Pipeline::new(&config, &db, &notifier);
            match pipeline.apply_message(&db, &url, &message, &KeywordClassifier) {
                Ok(MessageOutcome::Applied(update)) => print_update(&update),
                Ok(MessageOutcome::NoSignal) => println!("Message carries no status signal."),
                Ok(MessageOutcome::Withheld(found)) => {
                    println!("Message skipped: sensitive content ({})", found)
                }
                Err(e @ PipelineError::InvalidTransition { .. }) => println!("Ignored: {}", e),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Ghost { url } => {
            let db = open_initialized(&config)?;
            let pipeline = Pipeline::new(&config, &db, &notifier);
            let update = pipeline.mark_ghosted(&db, &url)?;
            print_update(&update);
        }

        Commands::ClearFiltered => {
            let db = open_initialized(&config)?;
            let removed = Pipeline::new(&config, &db, &notifier).clear_filtered()?;
            println!("Cleared {} filtered postings.", removed);
        }

        Commands::List { status } => {
            let db = open_initialized(&config)?;
            let status = status
                .map(|s| s.parse::<Status>().map_err(|e| anyhow!(e)))
                .transpose()?;
            let jobs = db.list_jobs(status)?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!("{:<10} {:>5} {:<20} {:<30} {}", "STATUS", "SCORE", "COMPANY", "TITLE", "KEY");
                println!("{}", "-".repeat(100));
                for job in jobs {
                    let company = if job.dream_company {
                        format!("*{}", job.company)
                    } else {
                        job.company.clone()
                    };
                    println!(
                        "{:<10} {:>5} {:<20} {:<30} {}",
                        job.status,
                        job.score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                        truncate(&company, 18),
                        truncate(&job.title, 28),
                        job.key
                    );
                }
            }
        }

        Commands::Show { url } => {
            let db = open_initialized(&config)?;
            let key = normalize::normalize_url(&url)?;
            match db.get_job_record(&key)? {
                Some(job) => {
                    println!("{} - {}", job.company, job.title);
                    println!("Status: {}", job.status);
                    if let Some(score) = job.score {
                        println!("Score: {}", score);
                    }
                    if job.dream_company {
                        println!("Dream company: yes");
                    }
                    println!("URL: {}", job.url);
                    println!("Key: {}", job.key);
                    println!("Created: {}", job.created_at.format("%Y-%m-%d %H:%M"));
                    println!("Updated: {}", job.updated_at.format("%Y-%m-%d %H:%M"));

                    let history = db.status_history(&key)?;
                    if !history.is_empty() {
                        println!("\n--- History ---");
                        for change in history {
                            println!(
                                "{}  {} -> {} ({})",
                                change.changed_at.format("%Y-%m-%d %H:%M"),
                                change.from,
                                change.to,
                                change.cause
                            );
                        }
                    }
                }
                None => match db.dedup_entry(&key)? {
                    Some(DedupEntry::Filtered(reason)) => println!("{} was filtered: {}", key, reason),
                    Some(DedupEntry::Seen) => println!("{} was processed but is not tracked.", key),
                    None => println!("{} has not been seen.", key),
                },
            }
        }

        Commands::Normalize { url } => {
            println!("{}", normalize::normalize_url(&url)?);
        }

        Commands::Match { company } => {
            match matcher::best_match(&company, &config.profile.target_companies, config.dream_threshold) {
                Some(found) => println!(
                    "{} matches {} (similarity {}, threshold {})",
                    company, found.target, found.similarity, config.dream_threshold
                ),
                None => println!(
                    "{} matches no target company at threshold {}",
                    company, config.dream_threshold
                ),
            }
        }
    }

    Ok(())
}

fn open_initialized(config: &Config) -> Result<Database> {
    let db = Database::open(&config.db_path())?;
    db.ensure_initialized()?;
    Ok(db)
}

/// A JSON array of extraction results, or a single result object.
fn read_batch(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Ok(vec![value]),
        _ => Err(anyhow!("{} must hold a JSON array of postings", path.display())),
    }
}

fn parse_label(label: &str) -> Result<Option<SignalLabel>> {
    if label.eq_ignore_ascii_case("none") || label.eq_ignore_ascii_case("unknown") {
        return Ok(None);
    }
    label.parse::<SignalLabel>().map(Some).map_err(|e| anyhow!(e))
}

fn print_decisions(decisions: &[DecisionRecord]) {
    if decisions.is_empty() {
        println!("No new postings.");
        return;
    }
    println!("{:<8} {:>5} {:<20} {:<30} {}", "VERDICT", "SCORE", "COMPANY", "TITLE", "NOTES");
    println!("{}", "-".repeat(100));
    for decision in decisions {
        let (verdict, notes) = match &decision.eligibility {
            Eligibility::Pass => (
                if decision.dream_company.is_some() { "DREAM" } else { "PASS" },
                decision
                    .score
                    .as_ref()
                    .map(|s| s.notes.join("; "))
                    .unwrap_or_default(),
            ),
            Eligibility::Fail { reason, detail } => ("FILTER", format!("{}: {}", reason, detail)),
        };
        println!(
            "{:<8} {:>5} {:<20} {:<30} {}",
            verdict,
            decision
                .score
                .as_ref()
                .map(|s| s.total.to_string())
                .unwrap_or_else(|| "-".to_string()),
            truncate(&decision.company, 18),
            truncate(&decision.title, 28),
            notes
        );
    }
}

fn print_stats(stats: &RunStats) {
    println!("\nResults:");
    println!("  Listings seen:        {}", stats.listings_seen);
    println!("  Accepted:             {}", stats.accepted);
    println!("  Dream company hits:   {}", stats.dream_hits);
    println!("  Filtered out:         {}", stats.filtered_out);
    println!("  Already processed:    {}", stats.duplicates);
    println!("  Previously filtered:  {}", stats.previously_filtered);
    if stats.extraction_failures > 0 {
        println!("  Extraction failures:  {}", stats.extraction_failures);
    }
    if stats.invalid_urls > 0 {
        println!("  Invalid URLs:         {}", stats.invalid_urls);
    }
    if stats.errors > 0 {
        println!("  Errors:               {}", stats.errors);
    }
}

fn print_update(update: &StatusUpdate) {
    if update.changed {
        println!(
            "{} - {}: {} -> {}",
            update.company, update.title, update.from, update.to
        );
    } else {
        println!("{} - {}: already {}", update.company, update.title, update.to);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
