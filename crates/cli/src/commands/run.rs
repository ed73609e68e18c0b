//! `bughunter run`: the full pipeline over one input CSV

use anyhow::{Context, Result};
use bughunter_scanners::{
    io, runner::UnitResult, PipelineConfig, PipelineFactory, VerdictStatus,
};
use clap::Args;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    #[arg(short, long, value_name = "CSV", default_value = "output.csv")]
    pub output: PathBuf,

    /// YAML or JSON pipeline configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also write the run summary (JSON for `.json`, Markdown otherwise)
    #[arg(long)]
    pub summary: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub docs_url: Option<String>,

    #[arg(long)]
    pub threshold: Option<f64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(short = 'j', long)]
    pub parallelism: Option<usize>,

    /// Per-call timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip cpplint, cppcheck and clang-tidy; RDI heuristics still run
    #[arg(long)]
    pub no_lint: bool,
}

impl RunArgs {
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_env()?;

        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(url) = &self.docs_url {
            config.docs.url = url.clone();
        }
        if let Some(threshold) = self.threshold {
            config.verification.confidence_threshold = threshold;
        }
        if let Some(retries) = self.max_retries {
            config.verification.max_retries = retries;
        }
        if let Some(parallelism) = self.parallelism {
            config.batch.parallelism = parallelism;
        }
        if let Some(timeout) = self.timeout {
            config.batch.call_timeout_secs = timeout;
        }
        if self.no_lint {
            config.lint.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub async fn execute(args: RunArgs) -> Result<()> {
    init_tracing(args.verbose);
    let start = Instant::now();

    let config = args.load_config()?;
    let records = io::read_units(&args.input)
        .with_context(|| format!("Failed to read input: {}", args.input.display()))?;

    println!("{}", "🔎 BugHunter: RDI bug localization".bright_blue().bold());
    println!("{}", "=".repeat(50).bright_blue());
    println!("📁 Input: {} ({} units)", args.input.display(), records.len());
    println!("📁 Output: {}", args.output.display());
    println!(
        "⚙️  Model: {} | threshold {} | retries {} | parallelism {}",
        config.llm.model,
        config.verification.confidence_threshold,
        config.verification.max_retries,
        config.batch.parallelism
    );

    let factory = PipelineFactory::from_config(config)?;
    let engine = factory.create_engine();

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining units");
            ctrl_c.cancel();
        }
    });

    let total = records.len();
    let mut done = 0;
    let report = engine
        .run_with_progress(records, cancel, |result| {
            done += 1;
            print_progress(done, total, result);
        })
        .await;

    io::write_output(&args.output, &report.rows())
        .with_context(|| format!("Failed to write output: {}", args.output.display()))?;

    if let Some(path) = &args.summary {
        write_summary(path, &report)?;
    }

    let counts = &report.summary().counts;
    println!(
        "\n✅ {} Processed {} units in {:.2}s",
        "SUCCESS:".bright_green().bold(),
        report.summary().total,
        start.elapsed().as_secs_f64()
    );
    println!(
        "   Confirmed: {}  Low confidence: {}  No bug: {}",
        counts.confirmed.to_string().green(),
        counts.low_confidence.to_string().yellow(),
        counts.no_bug
    );
    println!(
        "   Inconclusive: {}  Cancelled: {}  Errors: {}",
        counts.inconclusive,
        counts.cancelled,
        counts.error.to_string().red()
    );
    println!("   Judging rounds: {}", report.summary().total_rounds);
    println!("   Output: {}", args.output.display());

    Ok(())
}

fn print_progress(done: usize, total: usize, result: &UnitResult) {
    let verdict = &result.verdict;
    let status = match verdict.status() {
        VerdictStatus::Confirmed => "confirmed".green(),
        VerdictStatus::LowConfidence => "low confidence".yellow(),
        VerdictStatus::NoBug => "no bug".normal(),
        VerdictStatus::Inconclusive => "inconclusive".yellow(),
        VerdictStatus::Cancelled => "cancelled".dimmed(),
        VerdictStatus::Error => "error".red(),
    };
    println!(
        "  [{}/{}] {} → {} ({}, {} rounds)",
        done,
        total,
        verdict.unit_id(),
        result.row.bug_line,
        status,
        verdict.iterations()
    );
}

fn write_summary(path: &Path, report: &bughunter_scanners::BatchReport) -> Result<()> {
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let content = if is_json {
        report.to_json()?
    } else {
        report.to_markdown()
    };
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn test_flags_override_defaults() {
        let wrapper = Wrapper::parse_from([
            "bughunter",
            "--input",
            "in.csv",
            "--threshold",
            "0.6",
            "--max-retries",
            "1",
            "-j",
            "2",
            "--no-lint",
        ]);
        assert_eq!(wrapper.args.output, PathBuf::from("output.csv"));

        let config = wrapper.args.load_config().unwrap();
        assert_eq!(config.verification.confidence_threshold, 0.6);
        assert_eq!(config.verification.max_retries, 1);
        assert_eq!(config.batch.parallelism, 2);
        assert!(!config.lint.enabled);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let wrapper = Wrapper::parse_from(["bughunter", "-i", "in.csv", "--threshold", "1.5"]);
        assert!(wrapper.args.load_config().is_err());
    }
}
