use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cohort_leaderboard::directory::Directory;
use cohort_leaderboard::models::{ScoreInput, VoteCategory};
use cohort_leaderboard::permissions::Capability;
use cohort_leaderboard::report::{self, format_teamwork};
use cohort_leaderboard::scoring::podium;
use cohort_leaderboard::{db, validate, Gated};

#[derive(Parser)]
#[command(name = "cohort-leaderboard")]
#[command(about = "Peer assessments, recognition votes and leaderboards for Group Scholar cohorts", long_about = None)]
struct Cli {
    /// Evaluation period the command works on
    #[arg(long, global = true, env = "ACTIVE_PERIOD", default_value = "Q1")]
    period: String,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import or update subjects from a CSV file
    ImportSubjects {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import assessments from a CSV file
    ImportAssessments {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import ballots from a CSV file
    ImportBallots {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one evaluator's scores for one subject
    Assess {
        #[arg(long)]
        evaluator: String,
        #[arg(long)]
        target: String,
        #[arg(long)]
        attitude: i32,
        #[arg(long)]
        teamwork: Option<i32>,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Cast both recognition ballots for a voter
    Vote {
        #[arg(long)]
        voter: String,
        /// Pick for most fun peer
        #[arg(long)]
        peer: String,
        /// Pick for favorite leader
        #[arg(long)]
        leader: String,
    },
    /// List subjects an evaluator has not scored yet, or a voter's candidates
    Pending {
        #[arg(long)]
        username: String,
    },
    /// Show the ranked leaderboard
    Leaderboard {
        #[arg(long)]
        viewer_role: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show vote counts for one category
    Tally {
        #[arg(long)]
        category: VoteCategory,
        #[arg(long)]
        viewer_role: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        viewer_role: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Release results for the period to every role
    Publish,
    /// Lock results for the period again
    Unpublish,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let directory = db::PgDirectory::new(pool.clone());
    let period = cli.period.as_str();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&directory, period).await?;
            println!("Seed data inserted for {period}.");
        }
        Commands::ImportSubjects { csv } => {
            let summary = db::import_subjects(&pool, &csv).await?;
            println!(
                "Imported {} subjects from {} ({} skipped).",
                summary.inserted,
                csv.display(),
                summary.rejected
            );
        }
        Commands::ImportAssessments { csv } => {
            let summary = db::import_assessments(&directory, period, &csv).await?;
            println!(
                "Inserted {} assessments from {} ({} rejected).",
                summary.inserted,
                csv.display(),
                summary.rejected
            );
        }
        Commands::ImportBallots { csv } => {
            let summary = db::import_ballots(&directory, period, &csv).await?;
            println!(
                "Inserted {} ballots from {} ({} rejected).",
                summary.inserted,
                csv.display(),
                summary.rejected
            );
        }
        Commands::Assess {
            evaluator,
            target,
            attitude,
            teamwork,
            feedback,
        } => {
            let scores = ScoreInput {
                attitude,
                teamwork,
                feedback,
            };
            let assessment =
                db::submit_assessment(&directory, period, &evaluator, &target, scores).await?;
            println!(
                "Recorded {evaluator} -> {target}: attitude {} teamwork {}.",
                assessment.attitude_score,
                assessment
                    .teamwork_score
                    .map_or_else(|| "-".to_string(), |value| value.to_string())
            );
        }
        Commands::Vote {
            voter,
            peer,
            leader,
        } => {
            db::submit_ballots(&directory, period, &voter, &peer, &leader).await?;
            println!("Ballots recorded for {voter} in {period}.");
        }
        Commands::Pending { username } => {
            let roster = directory.list_subjects().await?;
            let subject = validate::find_subject(&roster, &username)?;

            if subject.role.can(Capability::JudgeAttitude) {
                let assessments = directory.list_assessments(period).await?;
                let pending = validate::pending_targets(subject, &roster, &assessments, period);
                if pending.is_empty() {
                    println!("Everyone has been scored for {period}.");
                } else {
                    println!("Still to score in {period}:");
                    for target in pending {
                        println!("- {} ({}, {})", target.display_name, target.username, target.role);
                    }
                }
            }

            let ballots = directory.list_ballots(period).await?;
            if validate::has_voted(subject, &ballots, period) {
                println!("Ballots already cast for {period}.");
            } else {
                for category in VoteCategory::ALL {
                    println!("{} candidates:", category.title());
                    for candidate in validate::candidate_pool(subject, &roster, category) {
                        println!("- {} ({})", candidate.display_name, candidate.username);
                    }
                }
            }
        }
        Commands::Leaderboard {
            viewer_role,
            limit,
            json,
        } => {
            let board = cohort_leaderboard::get_leaderboard(&directory, period, &viewer_role).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
                return Ok(());
            }

            match board {
                Gated::Denied => println!("Results for {period} are not published yet."),
                Gated::Visible(entries) if entries.is_empty() => {
                    println!("No assessments found for {period}.");
                }
                Gated::Visible(entries) => {
                    println!("Top subjects by final score:");
                    for (rank, entry) in podium(&entries, limit).iter().enumerate() {
                        println!(
                            "{}. {} ({}, {}) final {:.2} | attitude {:.1} | teamwork {} | {} ratings",
                            rank + 1,
                            entry.subject.display_name,
                            entry.subject.role,
                            entry.subject.department,
                            entry.score.final_score,
                            entry.score.avg_attitude,
                            format_teamwork(entry.score.avg_teamwork),
                            entry.score.assessment_count
                        );
                    }
                }
            }
        }
        Commands::Tally {
            category,
            viewer_role,
            json,
        } => {
            let tally =
                cohort_leaderboard::get_vote_tally(&directory, period, category, &viewer_role)
                    .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tally)?);
                return Ok(());
            }

            match tally {
                Gated::Denied => println!("Votes for {period} are not published yet."),
                Gated::Visible(results) if results.is_empty() => {
                    println!("No {} ballots in {period}.", category.title());
                }
                Gated::Visible(results) => {
                    println!("{} for {period}:", category.title());
                    for result in results {
                        println!(
                            "- {} ({}): {}",
                            result.candidate.display_name, result.candidate.role, result.votes
                        );
                    }
                }
            }
        }
        Commands::Report { viewer_role, out } => {
            let status = db::period_status(&pool, period).await?;
            let board = cohort_leaderboard::get_leaderboard(&directory, period, &viewer_role).await?;
            let mut tallies = Vec::new();
            for category in VoteCategory::ALL {
                let tally =
                    cohort_leaderboard::get_vote_tally(&directory, period, category, &viewer_role)
                        .await?;
                tallies.push((category, tally));
            }

            let report = report::build_report(period, &status, &board, &tallies);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Publish => {
            db::set_published(&pool, period, true).await?;
            println!("Results for {period} are now visible to everyone.");
        }
        Commands::Unpublish => {
            db::set_published(&pool, period, false).await?;
            println!("Results for {period} are locked again.");
        }
    }

    Ok(())
}
