//! `bughunter evaluate`: offline accuracy of a predictions file

use anyhow::{Context, Result};
use bughunter_scanners::{evaluate, io, EvaluationReport};
use clap::Args;
use colored::*;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Labelled input CSV (with a `Correct Code` column)
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Output CSV produced by `bughunter run`
    #[arg(short, long, value_name = "CSV")]
    pub predictions: PathBuf,

    #[arg(long)]
    pub json: bool,

    /// List the units whose prediction missed
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(args: EvaluateArgs) -> Result<()> {
    let records = io::read_units(&args.input)
        .with_context(|| format!("Failed to read input: {}", args.input.display()))?;
    let predictions = io::read_output(&args.predictions)
        .with_context(|| format!("Failed to read predictions: {}", args.predictions.display()))?;

    let report = evaluate(&records, &predictions);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&report))?);
        return Ok(());
    }

    println!("{}", "📊 BugHunter evaluation".bright_cyan().bold());
    println!("{}", "=".repeat(50).bright_cyan());
    println!("Evaluated: {}", report.evaluated());
    println!("Skipped:   {}", report.skipped);
    println!(
        "Hits:      {} ({:.1}%)",
        report.hits(),
        report.hit_rate() * 100.0
    );
    println!(
        "Exact:     {} ({:.1}%)",
        report.exact(),
        report.exact_rate() * 100.0
    );

    if args.verbose {
        let misses: Vec<_> = report.misses().collect();
        if !misses.is_empty() {
            println!("\n{}", "Misses:".yellow().bold());
            for score in misses {
                println!(
                    "  {} expected {:?}, predicted {:?}",
                    score.id, score.expected, score.predicted
                );
            }
        }
    }

    Ok(())
}

fn summary_json(report: &EvaluationReport) -> serde_json::Value {
    serde_json::json!({
        "evaluated": report.evaluated(),
        "skipped": report.skipped,
        "hits": report.hits(),
        "exact": report.exact(),
        "hit_rate": report.hit_rate(),
        "exact_rate": report.exact_rate(),
    })
}
