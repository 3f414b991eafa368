//! quizflow-report - quiz analytics from the command line
//!
//! Reads quizzes and results from the local database (or a JSON snapshot)
//! and prints summaries, leaderboards and CSV reports.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use quizflow_core::analytics::{
    compute_quiz_analytics, generate_detailed_csv_with, generate_detailed_report,
    generate_multi_quiz_csv_at, QuizAnalytics,
};
use quizflow_core::format::{format_seconds, option_letter};
use quizflow_core::{rank_students, Config, Database, QuizSource, Snapshot, StudentAnswer, StudentRanking};

#[derive(Parser, Debug)]
#[command(name = "quizflow-report")]
#[command(about = "Quiz analytics and CSV reports")]
#[command(version)]
struct Args {
    /// SQLite database to read (default: $XDG_DATA_HOME/quizflow/quizflow.db)
    #[arg(long, global = true, conflicts_with = "input")]
    db: Option<PathBuf>,

    /// Read from a JSON snapshot instead of the database
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a JSON snapshot into the database
    Import {
        /// Snapshot file with `quizzes` and `results`
        file: PathBuf,
    },

    /// Export the database as a JSON snapshot
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Detailed per-student CSV report for one quiz
    Detailed {
        #[arg(long)]
        quiz: String,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// CSV comparison across every quiz
    Multi {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Quiz statistics in the terminal
    Summary {
        #[arg(long)]
        quiz: String,
        /// Print JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Fast-answer leaderboard for one quiz
    Leaderboard {
        #[arg(long)]
        quiz: String,
        /// Print JSON instead
        #[arg(long)]
        json: bool,
    },

    /// Points for a single answer under the configured score table
    Score {
        /// Seconds between question start and submission
        #[arg(long, allow_negative_numbers = true)]
        elapsed: f64,
        /// Score an incorrect answer
        #[arg(long)]
        incorrect: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = match quizflow_core::logging::init(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {}", e);
            None
        }
    };
    tracing::debug!(command = ?args.command, "Running quizflow-report");

    match &args.command {
        Command::Import { file } => {
            if args.input.is_some() {
                anyhow::bail!("import writes to the database; --input cannot be used with it");
            }
            let db = open_database(args.db.as_deref())?;
            let snapshot = Snapshot::load(file)
                .with_context(|| format!("failed to read snapshot {}", file.display()))?;
            let stats = snapshot
                .import_into(&db)
                .context("failed to import snapshot")?;
            println!("Import complete:");
            println!("  Quizzes: {}", stats.quizzes);
            println!("  Results: {}", stats.results);
        }
        Command::Export { output } => {
            if args.input.is_some() {
                anyhow::bail!("export reads the database; --input cannot be used with it");
            }
            let db = open_database(args.db.as_deref())?;
            let json = Snapshot::export_from(&db)
                .and_then(|s| s.to_json())
                .context("failed to export snapshot")?;
            emit(&format!("{}\n", json), output.as_deref())?;
        }
        Command::Detailed { quiz, output } => {
            let source = open_source(&args)?;
            let quiz = source
                .fetch_quiz(quiz)
                .with_context(|| format!("failed to load quiz {}", quiz))?;
            let results = source
                .fetch_results(&quiz.id)
                .context("failed to load results")?;
            let report = generate_detailed_report(&quiz, &results);
            let csv = generate_detailed_csv_with(&report, &config.report.csv_options());
            emit(&csv, output.as_deref())?;
        }
        Command::Multi { output } => {
            let source = open_source(&args)?;
            let (quizzes, results) = source.fetch_all().context("failed to load quizzes")?;
            let csv = generate_multi_quiz_csv_at(
                &quizzes,
                &results,
                Utc::now(),
                &config.report.csv_options(),
            );
            emit(&csv, output.as_deref())?;
        }
        Command::Summary { quiz, json } => {
            let source = open_source(&args)?;
            let quiz = source
                .fetch_quiz(quiz)
                .with_context(|| format!("failed to load quiz {}", quiz))?;
            let results = source
                .fetch_results(&quiz.id)
                .context("failed to load results")?;
            let analytics = compute_quiz_analytics(&quiz, &results);
            if *json {
                println!("{}", serde_json::to_string_pretty(&analytics)?);
            } else {
                print_summary(&analytics);
            }
        }
        Command::Leaderboard { quiz, json } => {
            let source = open_source(&args)?;
            let quiz = source
                .fetch_quiz(quiz)
                .with_context(|| format!("failed to load quiz {}", quiz))?;
            let results = source
                .fetch_results(&quiz.id)
                .context("failed to load results")?;
            let answers: Vec<StudentAnswer> =
                results.into_iter().flat_map(|r| r.answers).collect();
            let rankings = rank_students(&answers);
            if *json {
                println!("{}", serde_json::to_string_pretty(&rankings)?);
            } else {
                print_leaderboard(&rankings);
            }
        }
        Command::Score { elapsed, incorrect } => {
            let table = config
                .scoring
                .table()
                .context("invalid score table in configuration")?;
            println!("{}", table.score(!incorrect, *elapsed));
        }
    }

    Ok(())
}

fn open_database(path: Option<&Path>) -> Result<Database> {
    let path = path.map_or_else(Config::database_path, Path::to_path_buf);
    let db = Database::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    db.migrate().context("failed to run migrations")?;
    Ok(db)
}

fn open_source(args: &Args) -> Result<Box<dyn QuizSource>> {
    match &args.input {
        Some(path) => {
            let snapshot = Snapshot::load(path)
                .with_context(|| format!("failed to read snapshot {}", path.display()))?;
            Ok(Box::new(snapshot))
        }
        None => Ok(Box::new(open_database(args.db.as_deref())?)),
    }
}

/// Write to `output`, or stdout when none is given.
fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn print_summary(analytics: &QuizAnalytics) {
    println!();
    println!("{}", analytics.quiz_title);
    println!("{}", "=".repeat(analytics.quiz_title.chars().count().max(20)));
    println!(
        "   Students: {:<10} Questions: {}",
        analytics.total_students, analytics.total_questions
    );
    println!(
        "   Average:  {:<10} Completion: {}%",
        format!("{}%", analytics.average_score),
        analytics.completion_rate
    );
    println!(
        "   Time per question: {}",
        format_seconds(analytics.time_analytics.average_time_per_question as f64)
    );
    println!();

    if analytics.questions.is_empty() {
        println!("  No questions in this quiz.");
        println!();
        return;
    }

    println!("QUESTIONS");
    for (i, question) in analytics.questions.iter().enumerate() {
        println!("   Q{} {}", i + 1, question.question_text);
        println!(
            "      Correct: {}  Difficulty: {}%  Discrimination: {}  Responses: {}",
            option_letter(question.correct_option),
            question.difficulty_score,
            question.discrimination_index,
            question.total_responses
        );
        let distribution = question
            .option_distribution
            .iter()
            .map(|o| format!("{} {} ({}%)", option_letter(o.option_index), o.count, o.percentage))
            .collect::<Vec<_>>()
            .join("  ");
        println!("      {}", distribution);
    }
    println!();
}

fn print_leaderboard(rankings: &[StudentRanking]) {
    if rankings.is_empty() {
        println!("No answers recorded for this quiz.");
        return;
    }

    println!("{:>4}  {:<24} {:>8} {:>8}", "Rank", "Student", "Points", "Correct");
    for row in rankings {
        println!(
            "{:>4}  {:<24} {:>8} {:>8}",
            row.rank, row.student_name, row.total_points, row.total_marks
        );
    }
}
