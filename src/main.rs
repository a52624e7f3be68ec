use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tabled::{settings::Style, Table, Tabled};

use intervalrs::config::{parse_metric_list, AppConfig};
use intervalrs::export::{self, csv as csv_export, json as json_export, text as text_export};
use intervalrs::import::{load_intervals, parse_interval_arg, ImportManager};
use intervalrs::intervals::IntervalSelection;
use intervalrs::logging::{init_logging, DiagnosticReport, LogFormat};
use intervalrs::metrics::MetricFactory;
use intervalrs::models::{RideFile, Units};
use intervalrs::split::RideSplitter;
use intervalrs::summary::{IntervalSummary, SelectionSummary};

/// intervalrs - Interval Summary CLI
///
/// Summarises selected intervals of a ride. Overlapping intervals are merged
/// so every sample counts once, and the rest of the ride is summarised as the
/// excluded stream.
#[derive(Parser)]
#[command(name = "intervalrs")]
#[command(version)]
#[command(about = "Interval summary and ride splitting", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format (pretty, json, compact)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<LogFormat>,

    /// Save a diagnostic report when the command fails
    #[arg(long, global = true)]
    diagnostics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Interval sources shared by `summary` and `split`
#[derive(clap::Args)]
struct SelectionArgs {
    /// Ride file (CSV, GPX, FIT, JSON)
    #[arg(short, long, value_name = "FILE")]
    ride: PathBuf,

    /// Interval as START..STOP[=NAME]; seconds, m:ss or h:mm:ss
    #[arg(short, long = "interval", value_name = "RANGE")]
    intervals: Vec<String>,

    /// JSON file holding an array of intervals
    #[arg(long = "intervals", value_name = "FILE")]
    interval_file: Option<PathBuf>,

    /// Also select the intervals stored in the ride (e.g. FIT laps)
    #[arg(long)]
    ride_intervals: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Text,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise the selected intervals of a ride
    Summary {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Comma-separated metric symbols (default from config)
        #[arg(short, long)]
        metrics: Option<String>,

        /// Display units (metric, imperial)
        #[arg(short, long)]
        units: Option<Units>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the included and excluded streams of a selection
    Split {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output for samples inside the selection (.csv or .json)
        #[arg(long, value_name = "FILE")]
        included: Option<PathBuf>,

        /// Output for samples outside the selection (.csv or .json)
        #[arg(long, value_name = "FILE")]
        excluded: Option<PathBuf>,
    },

    /// List available metrics
    Metrics {
        /// Units used for the unit column
        #[arg(short, long)]
        units: Option<Units>,
    },

    /// Show or create the configuration file
    Config {
        /// Print the active configuration
        #[arg(short, long)]
        list: bool,

        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    let mut log_config = config.logging.clone().with_verbosity(cli.verbose);
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    init_logging(&log_config)?;

    let operation = command_name(&cli.command);
    let started = Instant::now();
    let result = run(cli.command, &config, cli.config.as_deref());

    if let Err(e) = &result {
        tracing::error!(error = %e, operation, "Command failed");
        if cli.diagnostics {
            let mut report = DiagnosticReport::new(operation);
            report.set_duration(started.elapsed());
            report.add_context("args", std::env::args().collect::<Vec<_>>().join(" "));
            report.add_error(e);
            match report.save_default() {
                Ok(path) => eprintln!("{}", format!("Diagnostic report: {}", path.display()).dimmed()),
                Err(save_err) => eprintln!("{} {}", "Could not save diagnostics:".yellow(), save_err),
            }
        }
    }

    result
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Summary { .. } => "summary",
        Commands::Split { .. } => "split",
        Commands::Metrics { .. } => "metrics",
        Commands::Config { .. } => "config",
    }
}

fn run(command: Commands, config: &AppConfig, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Summary {
            selection,
            metrics,
            units,
            format,
            output,
        } => {
            let factory = config.metric_factory()?;
            let (ride, intervals) = load_selection(&selection)?;

            let symbols = match metrics {
                Some(list) => parse_metric_list(&list),
                None => config.summary.metric_symbols(),
            };
            for symbol in symbols.iter().filter(|s| !factory.contains(s)) {
                eprintln!("{} unknown metric '{}' ignored", "warning:".yellow(), symbol);
            }

            let units = units.unwrap_or(config.summary.units);
            let summary = IntervalSummary::new(&factory, config.metric_context(), symbols, units);
            let report = summary.summarize_selection(&ride, &intervals)?;

            match output {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    // Table styling is for terminals; files get the plain text report
                    let format = match format {
                        OutputFormat::Table => OutputFormat::Text,
                        other => other,
                    };
                    write_report(&report, format, &mut file)?;
                    println!("{} {}", "✓ Report written to".green(), path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    write_report(&report, format, &mut stdout.lock())?;
                }
            }
        }

        Commands::Split {
            selection,
            included,
            excluded,
        } => {
            if included.is_none() && excluded.is_none() {
                anyhow::bail!("Nothing to write: pass --included and/or --excluded");
            }

            let (ride, intervals) = load_selection(&selection)?;
            let split = RideSplitter::split(&ride, &intervals)?;

            for (path, stream, label) in [
                (included, &split.included, "included"),
                (excluded, &split.excluded, "excluded"),
            ] {
                if let Some(path) = path {
                    export::export_ride(stream, &path)
                        .with_context(|| format!("Failed to write {} stream", label))?;
                    println!(
                        "{} {} samples {} to {}",
                        "✓".green(),
                        stream.samples.len(),
                        label,
                        path.display()
                    );
                }
            }
        }

        Commands::Metrics { units } => {
            let factory = config.metric_factory()?;
            print_metrics(&factory, units.unwrap_or(config.summary.units));
        }

        Commands::Config { list, init } => {
            if init {
                let mut fresh = AppConfig::default();
                let path = match config_path {
                    Some(path) => {
                        fresh.save_to_file(path)?;
                        path.to_path_buf()
                    }
                    None => fresh.save_default()?,
                };
                println!("{} {}", "✓ Configuration written to".green(), path.display());
            }
            if list || !init {
                let toml = toml::to_string_pretty(config)
                    .context("Failed to serialize configuration")?;
                println!("{}", toml);
            }
        }
    }

    Ok(())
}

fn load_selection(args: &SelectionArgs) -> Result<(RideFile, IntervalSelection)> {
    let ride = ImportManager::new()
        .import_file(&args.ride)
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .with_context(|| format!("Failed to load ride {}", args.ride.display()))?;

    let mut selection = IntervalSelection::default();
    for (i, arg) in args.intervals.iter().enumerate() {
        let interval = parse_interval_arg(arg, i).map_err(|e| anyhow::anyhow!(e.user_message()))?;
        selection.push(interval)?;
    }
    if let Some(path) = &args.interval_file {
        for interval in load_intervals(path)
            .with_context(|| format!("Failed to load intervals from {}", path.display()))?
        {
            selection.push(interval)?;
        }
    }
    if args.ride_intervals {
        for interval in &ride.intervals {
            selection.push(interval.clone())?;
        }
    }

    tracing::info!(
        ride = %ride.id,
        samples = ride.samples.len(),
        intervals = selection.len(),
        "Selection loaded"
    );
    Ok((ride, selection))
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Metric")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Units")]
    units: String,
}

fn write_report<W: Write>(report: &SelectionSummary, format: OutputFormat, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Json => json_export::write_json(report, out)?,
        OutputFormat::Csv => csv_export::write_summary(report, out)?,
        OutputFormat::Text => text_export::write_summary_report(report, out)?,
        OutputFormat::Table => {
            if let Some(placeholder) = report.placeholder() {
                writeln!(out, "{}", placeholder.italic().dimmed())?;
                return Ok(());
            }
            for block in report.blocks() {
                writeln!(out, "{}", block.name.bold().cyan())?;
                let rows: Vec<ReportRow> = block
                    .rows
                    .iter()
                    .map(|r| ReportRow {
                        name: r.name.clone(),
                        value: r.display.clone(),
                        units: r.units.clone(),
                    })
                    .collect();
                let mut table = Table::new(rows);
                table.with(Style::rounded());
                writeln!(out, "{}\n", table)?;
            }
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Units")]
    units: String,
    #[tabled(rename = "Depends on")]
    dependencies: String,
}

fn print_metrics(factory: &MetricFactory, units: Units) {
    let rows: Vec<MetricRow> = factory
        .metrics()
        .map(|m| MetricRow {
            symbol: m.symbol().to_string(),
            name: m.name().to_string(),
            units: m.units(units).to_string(),
            dependencies: m.dependencies().join(", "),
        })
        .collect();

    println!("{}", format!("{} metrics", rows.len()).bold());
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}
