//! Multiple Change Detector CLI Application
//!
//! Command-line interface for the change-detector library. It adds:
//! - Positional `N T E NTHR` arguments and flags
//! - Optional TOML configuration
//! - Logging setup (diagnostics on stderr, events on stdout)
//! - The `analyze` subcommand for captured event streams

use anyhow::{bail, Context, Result};
use change_detector::analysis::{check_handshake, latency_report, read_events};
use change_detector::{AckMode, Supervisor, WriterSink};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

mod config;

/// Multiple Change Detector - report signal activations with usec timestamps
#[derive(Parser, Debug)]
#[command(name = "change-detector")]
#[command(about = "Generate random signal changes and detect activations", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Number of signals to monitor
    #[arg(value_name = "N", required_unless_present = "config")]
    signals: Option<usize>,

    /// Time multiplier: signals change every T to 10 * T usec
    #[arg(value_name = "T")]
    time_multiplier: Option<u64>,

    /// Execution duration in seconds
    #[arg(value_name = "E")]
    execution_time: Option<u64>,

    /// Number of detector threads
    #[arg(value_name = "NTHR")]
    threads: Option<usize>,

    /// Acknowledgement mode: none, spin or condvar
    #[arg(long, value_name = "MODE")]
    ack: Option<AckMode>,

    /// Seed for the signal generator
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Pause before stopping detectors when acknowledgement is off
    #[arg(long, value_name = "USEC")]
    grace_us: Option<u64>,

    /// Path to configuration file (TOML) with run defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print a JSON run summary on stderr
    #[arg(long)]
    summary: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all diagnostics except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Measure detection latency in a captured event stream
    Analyze {
        /// Event stream to read (default: stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Fail if a signal is activated twice without a detection in between
        #[arg(long)]
        check_ack: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("Change Detector CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using detector library v{}", change_detector::VERSION);

    match &args.command {
        Some(Command::Analyze {
            input,
            check_ack,
            json,
        }) => analyze_mode(input.as_ref(), *check_ack, *json),
        None => run_mode(&args),
    }
}

/// Run generator and detectors, streaming events to stdout
fn run_mode(args: &Args) -> Result<()> {
    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };

    let overrides = config::Overrides {
        signals: args.signals,
        time_multiplier_us: args.time_multiplier,
        execution_time_secs: args.execution_time,
        requested_threads: args.threads,
        ack: args.ack,
        grace_period_us: args.grace_us,
        seed: args.seed,
    };

    let Some(detector_config) = file_config.resolve(&overrides) else {
        Args::command()
            .error(ErrorKind::MissingRequiredArgument, "number of signals N is required")
            .exit();
    };
    if let Err(err) = detector_config.validate() {
        Args::command().error(ErrorKind::ValueValidation, err).exit();
    }

    let sink = WriterSink::new(io::stdout());
    let supervisor = Supervisor::new(detector_config, &sink)?;
    let summary = supervisor.run().context("Detector run failed")?;

    if args.summary {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// Read a captured stream and report latency
fn analyze_mode(input: Option<&PathBuf>, check_ack: bool, json: bool) -> Result<()> {
    let events = match input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open event stream: {:?}", path))?;
            read_events(BufReader::new(file))
        }
        None => read_events(io::stdin().lock()),
    }
    .context("Failed to read event stream")?;
    log::info!("Read {} events", events.len());

    let report = latency_report(&events);
    if report.dropped_trailing {
        log::warn!("Odd number of events, ignoring the last one");
    }
    if !report.unmatched_signals.is_empty() {
        log::warn!(
            "{} signals have unequal change/detection counts",
            report.unmatched_signals.len()
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if check_ack {
        let violations = check_handshake(&events);
        for violation in violations.iter().take(10) {
            log::error!("{}", violation);
        }
        if !violations.is_empty() {
            bail!("{} acknowledgement violations", violations.len());
        }
        log::info!("Acknowledgement check passed");
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_positional_arguments() {
        let args = Args::try_parse_from(["change-detector", "200", "1000", "5", "8", "--ack", "spin"]).unwrap();
        assert_eq!(args.signals, Some(200));
        assert_eq!(args.time_multiplier, Some(1000));
        assert_eq!(args.execution_time, Some(5));
        assert_eq!(args.threads, Some(8));
        assert_eq!(args.ack, Some(AckMode::Spin));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_missing_signal_count_is_usage_error() {
        let err = Args::try_parse_from(["change-detector"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_non_numeric_signal_count_rejected() {
        assert!(Args::try_parse_from(["change-detector", "lots"]).is_err());
    }

    #[test]
    fn test_analyze_subcommand() {
        let args = Args::try_parse_from(["change-detector", "analyze", "out.log", "--check-ack"]).unwrap();
        match args.command {
            Some(Command::Analyze { input, check_ack, json }) => {
                assert_eq!(input, Some(PathBuf::from("out.log")));
                assert!(check_ack);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
