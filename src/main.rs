use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod export;
mod filter;
mod issues;
mod load;
mod models;
mod report;
mod rolling;
mod stats;

use filter::Filters;
use models::Metric;

#[derive(Parser)]
#[command(name = "campaign-outlier-analyzer")]
#[command(about = "Retail campaign performance outlier analyzer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score per-retailer outliers and list campaigns needing review
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = load::DEFAULT_SHEET)]
        sheet: String,
        /// Restrict to these retailers (repeatable)
        #[arg(long)]
        retailer: Vec<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Keep only campaigns flagged on this metric
        #[arg(long)]
        metric: Option<Metric>,
        /// Case-insensitive line item substring
        #[arg(long)]
        search: Option<String>,
        /// Write the flagged list as CSV
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = load::DEFAULT_SHEET)]
        sheet: String,
        #[arg(long, default_value_t = rolling::DEFAULT_WINDOW)]
        window: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Scan one metric for rolling-window anomalies
    Anomalies {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = load::DEFAULT_SHEET)]
        sheet: String,
        #[arg(long)]
        metric: Metric,
        #[arg(long, default_value_t = rolling::DEFAULT_WINDOW)]
        window: usize,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            sheet,
            retailer,
            from,
            to,
            metric,
            search,
            out,
            limit,
            json,
        } => {
            let records = load::load_records(&input, &sheet)?;
            let scored = stats::score_records(&records);
            let filters = Filters {
                retailers: retailer,
                from,
                to,
                metric,
                search,
            };
            let flagged = filter::flagged_subset(&scored, &filters);

            if flagged.is_empty() {
                println!("No campaigns flagged for review.");
                return Ok(());
            }

            if json {
                let rows: Vec<export::FlaggedRow> =
                    flagged.iter().map(export::FlaggedRow::from_scored).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                let mut ranked: Vec<&models::ScoredRecord> = flagged.iter().collect();
                ranked.sort_by(|a, b| {
                    b.worst_abs_z()
                        .partial_cmp(&a.worst_abs_z())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                println!("Campaigns needing review ({} total):", flagged.len());
                for scored in ranked.iter().take(limit) {
                    println!(
                        "- {} {} / {}: {} -> {}",
                        scored.record.date,
                        scored.record.retailer,
                        scored.record.line_item,
                        scored.broken_metrics,
                        scored.suggested_fix.as_deref().unwrap_or("-")
                    );
                }
            }

            if let Some(out) = out {
                let written = export::write_csv_file(&out, &flagged)?;
                println!("Flagged list written to {} ({written} rows).", out.display());
            }
        }
        Commands::Report {
            input,
            sheet,
            window,
            out,
        } => {
            let records = load::load_records(&input, &sheet)?;
            let scored = stats::score_records(&records);
            let flagged = filter::flagged_subset(&scored, &Filters::default());
            let smoothed: Vec<(Metric, Vec<models::RollingPoint>)> = Metric::ALL
                .iter()
                .map(|&metric| (metric, rolling::smooth(&records, metric, window)))
                .collect();
            let report = report::build_report(
                &input.display().to_string(),
                &records,
                &flagged,
                &smoothed,
                window,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Anomalies {
            input,
            sheet,
            metric,
            window,
            json,
        } => {
            let records = load::load_records(&input, &sheet)?;
            let points = rolling::smooth(&records, metric, window);

            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
                return Ok(());
            }

            let anomalies: Vec<&models::RollingPoint> =
                points.iter().filter(|point| point.anomaly).collect();
            if anomalies.is_empty() {
                println!(
                    "No {metric} anomalies across {} points (window {window}).",
                    points.len()
                );
                return Ok(());
            }

            println!(
                "{} {metric} anomalies across {} points (window {window}):",
                anomalies.len(),
                points.len()
            );
            for point in anomalies {
                println!(
                    "- {}: value {:.4}, rolling mean {:.4}, rolling MAD {:.4}",
                    point.date,
                    point.value,
                    point.rolling_mean.unwrap_or(f64::NAN),
                    point.rolling_mad.unwrap_or(f64::NAN)
                );
            }
        }
    }

    Ok(())
}
