use anyhow::Result;
use clap::Parser;
use debate::AppConfig;
use eval::{BatchReport, BatchRunner, load_question_set};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Run the surgical debate over a question set and grade the final answers.
#[derive(Parser, Debug)]
#[command(name = "run_batch", version)]
struct Args {
    /// JSON array of question records
    #[arg(long)]
    questions: PathBuf,

    /// Directory for per-row logs and the batch report
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides concurrency.max_concurrent_sessions
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    println!("=== Surgical Debate Batch ===\n");

    let config = AppConfig::load_or_default(args.config.as_deref())?;
    let concurrency = args
        .concurrency
        .unwrap_or(config.concurrency.max_concurrent_sessions);
    let controller = Arc::new(debate::build_controller(&config)?);

    let records = load_question_set(&args.questions).await?;
    println!("Question set: {} rows\n", records.len());

    let runner = BatchRunner::new(controller, args.log_dir.clone(), concurrency);
    let report = runner.run(records).await?;

    print_results(&report);

    let report_path = args.log_dir.join("batch_report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    println!("\n✅ Report saved to {}", report_path.display());

    Ok(())
}

fn print_results(report: &BatchReport) {
    println!("\n=== RESULTS ===\n");
    println!("  Rows: {}", report.total_rows);
    println!("  Answered: {}", report.answered);
    println!("  Graded: {}", report.graded);
    println!("  Accuracy: {:.1}%", report.accuracy * 100.0);
    println!("  Accepted Initially: {:.1}%", report.accepted_initial_rate * 100.0);
    println!("  Avg Refinements: {:.2}", report.avg_refinements);
    println!("  Avg Latency: {:.0} ms", report.avg_latency_ms);
    println!("  P50 Latency: {:.0} ms", report.p50_latency_ms);
    println!("  P95 Latency: {:.0} ms", report.p95_latency_ms);
}
