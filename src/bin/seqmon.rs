//! Command-line front end for planning, boundary tables and replaying looks.
//!
//! # Usage
//!
//! ```bash
//! # Sample size, duration and look schedule for a design
//! seqmon plan design.json --traffic 5000 --start-date 2024-03-04
//!
//! # Boundary table
//! seqmon boundaries --method obrien-fleming --looks 4 --alpha 0.05
//!
//! # Replay recorded interim snapshots through the monitor
//! seqmon replay design.json looks.jsonl --log decisions.jsonl
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `warn`).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use seqmon::interim::read_replay;
use seqmon::output::{
    format_boundaries, format_decision, format_plan, format_recommendation, to_json_pretty,
    DecisionSink, JsonlDecisionLog,
};
use seqmon::{
    evaluate_guardrails, plan, recommend, BlackoutPeriod, DecisionCriteria, ExperimentDesign,
    LookRecord, MonitorConfig, PlannerConfig, SequentialMonitor,
};
use seqmon_core::spending::equally_spaced;
use seqmon_core::{BoundarySet, EffectEstimator, SpendingFamily};

/// Sequential monitoring for controlled experiments
#[derive(Parser, Debug)]
#[command(name = "seqmon")]
#[command(about = "Plan, monitor and decide group-sequential A/B tests")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print JSON instead of the terminal summary
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample size, duration and look schedule for a design
    Plan {
        /// Experiment design (JSON)
        design: PathBuf,

        /// Eligible units per day across both arms
        #[arg(long, default_value = "10000")]
        traffic: f64,

        /// Days of linear ramp-up before full traffic
        #[arg(long)]
        ramp_days: Option<u32>,

        /// Share of full traffic on the first ramp day
        #[arg(long, default_value = "0.1")]
        ramp_start: f64,

        /// Planned start date (YYYY-MM-DD); assigns a date to each look
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Calendar day of each look, comma-separated (e.g. "7,14,21,28")
        #[arg(long, value_delimiter = ',')]
        look_days: Option<Vec<u32>>,

        /// Longest acceptable run in days
        #[arg(long, default_value = "90")]
        max_days: u32,

        /// Suggest start dates after this date (YYYY-MM-DD)
        #[arg(long)]
        suggest_from: Option<NaiveDate>,

        /// Avoid the default retail calendar when suggesting start dates
        #[arg(long)]
        retail_blackouts: bool,
    },

    /// Boundary table for a spending family
    Boundaries {
        /// Boundary family
        #[arg(long, value_enum, default_value = "obrien-fleming")]
        method: Method,

        /// Planned looks K
        #[arg(long, default_value = "4")]
        looks: usize,

        /// Overall two-sided significance level
        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Information fractions, comma-separated (default: equally spaced)
        #[arg(long, value_delimiter = ',')]
        fractions: Option<Vec<f64>>,
    },

    /// Replay recorded interim snapshots through the monitor
    Replay {
        /// Experiment design (JSON)
        design: PathBuf,

        /// Interim snapshots, one JSON object per line with a `look` field
        looks: PathBuf,

        /// Append decisions and the recommendation to this JSON Lines file
        #[arg(long)]
        log: Option<PathBuf>,

        /// Effect estimator for terminal decisions
        #[arg(long, value_enum, default_value = "median-unbiased")]
        estimator: Estimator,

        /// Minimum business-relevant effect for a launch
        #[arg(long, default_value = "0")]
        practical_threshold: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Method {
    ObrienFleming,
    Pocock,
    /// Lan-DeMets with O'Brien-Fleming-type spending
    LanDemetsObf,
    /// Lan-DeMets with Pocock-type spending
    LanDemetsPocock,
}

impl From<Method> for SpendingFamily {
    fn from(m: Method) -> Self {
        match m {
            Method::ObrienFleming => SpendingFamily::ObrienFleming,
            Method::Pocock => SpendingFamily::Pocock,
            Method::LanDemetsObf => SpendingFamily::lan_demets_obrien_fleming(),
            Method::LanDemetsPocock => SpendingFamily::lan_demets_pocock(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Estimator {
    Naive,
    MedianUnbiased,
}

impl From<Estimator> for EffectEstimator {
    fn from(e: Estimator) -> Self {
        match e {
            Estimator::Naive => EffectEstimator::Naive,
            Estimator::MedianUnbiased => EffectEstimator::MedianUnbiased,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> seqmon::Result<()> {
    match args.command {
        Command::Plan {
            design,
            traffic,
            ramp_days,
            ramp_start,
            start_date,
            look_days,
            max_days,
            suggest_from,
            retail_blackouts,
        } => {
            let design = load_design(&design)?;
            let mut config = PlannerConfig::new(traffic).max_duration_days(max_days);
            if let Some(days) = ramp_days {
                config = config.traffic_ramp(days, ramp_start);
            }
            if let Some(date) = start_date {
                config = config.start_date(date);
            }
            if let Some(days) = look_days {
                config = config.look_days(days);
            }
            if let Some(reference) = suggest_from {
                config = config.reference_date(reference);
                if retail_blackouts {
                    for period in BlackoutPeriod::retail_calendar(reference) {
                        config = config.blackout(period);
                    }
                }
            }
            let plan = plan(&design, &config)?;
            if args.json {
                println!("{}", to_json_pretty(&plan)?);
            } else {
                print!("{}", format_plan(&plan));
            }
        }

        Command::Boundaries {
            method,
            looks,
            alpha,
            fractions,
        } => {
            let fractions = match fractions {
                Some(f) => f,
                None => equally_spaced(looks)?,
            };
            let set = BoundarySet::solve(&method.into(), &fractions, alpha)?;
            if args.json {
                println!("{}", to_json_pretty(&set)?);
            } else {
                print!("{}", format_boundaries(&set));
            }
        }

        Command::Replay {
            design,
            looks,
            log,
            estimator,
            practical_threshold,
        } => {
            let design = load_design(&design)?;
            let entries = read_replay(BufReader::new(File::open(&looks)?))?;
            let config = MonitorConfig::new().estimator(estimator.into());
            let mut monitor = SequentialMonitor::new(design.clone(), config)?;
            let mut sink = match log {
                Some(path) => Some(JsonlDecisionLog::new(BufWriter::new(File::create(path)?))),
                None => None,
            };

            let mut logged = 0;
            for entry in &entries {
                let statuses = evaluate_guardrails(&design, &entry.statistics);
                match monitor.evaluate_look(entry.look, &entry.statistics, &statuses) {
                    Ok(decision) => {
                        if args.json {
                            println!("{}", to_json_pretty(&decision)?);
                        } else {
                            print!("{}", format_decision(&decision));
                        }
                    }
                    Err(e) if e.is_recoverable() => {
                        eprintln!("look {} deferred: {e}", entry.look);
                    }
                    Err(e) => return Err(e),
                }
                if let Some(sink) = sink.as_mut() {
                    for record in &monitor.history()[logged..] {
                        sink.record_look(record)?;
                    }
                }
                logged = monitor.history().len();
                if monitor.terminal_decision().is_some() {
                    break;
                }
            }

            let Some(terminal) = monitor.terminal_decision() else {
                let evaluated = monitor
                    .history()
                    .iter()
                    .filter(|r| matches!(r, LookRecord::Decision(_)))
                    .count();
                eprintln!("no terminal decision after {evaluated} evaluated looks");
                return Ok(());
            };
            let criteria = DecisionCriteria::new().practical_threshold(practical_threshold);
            let record = recommend(&design, terminal, &[], &[], &criteria)?;
            if let Some(sink) = sink.as_mut() {
                sink.record_recommendation(&record)?;
            }
            if args.json {
                println!("{}", to_json_pretty(&record)?);
            } else {
                print!("{}", format_recommendation(&record));
            }
        }
    }
    Ok(())
}

fn load_design(path: &Path) -> seqmon::Result<ExperimentDesign> {
    ExperimentDesign::from_json(&fs::read_to_string(path)?)
}
