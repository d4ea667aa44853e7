#![deny(warnings)]

//! Command-line front end: margin scenarios over a budget workbook.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use persistence::{save_json_atomic, WorkingCopy};
use serde::Serialize;
use sheet_doc::Workbook;
use sim_core::{load_catalog, parse_percent, Catalog, Category, EngineConfig, Lever, SimulationRequest};
use sim_runtime::{PremiumSimulator, Reporter, ScenarioEngine, StatementReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "margin-sim", version, about = "Margin scenarios on a budget workbook")]
struct Cli {
    /// Workbook to open (.json or .xlsx). The built-in sample when omitted.
    #[arg(long, short, global = true)]
    workbook: Option<PathBuf>,

    /// YAML file overriding the engine defaults.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Write the resulting working copy to this JSON file.
    #[arg(long, global = true)]
    save: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the recognised articles and the detected table layout.
    List,
    /// Move one lever and solve the other to keep the row profit.
    Simulate {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Also derive the income-statement effect.
        #[arg(long)]
        statement: bool,
    },
    /// Move one lever and offset the profit change through the premium.
    Premium {
        #[command(flatten)]
        scenario: ScenarioArgs,
    },
    /// Evaluate a range of percentages without touching the workbook.
    Sweep {
        #[arg(long)]
        category: Category,
        #[arg(long)]
        article: String,
        #[arg(long, default_value = "quantity")]
        lever: Lever,
        #[arg(long, default_value_t = -20.0, allow_negative_numbers = true)]
        from: f64,
        #[arg(long, default_value_t = 20.0, allow_negative_numbers = true)]
        to: f64,
        #[arg(long, default_value_t = 5.0)]
        step: f64,
    },
    /// Read the budget income statement.
    Statement {
        /// Every labelled line instead of the seven propagated ones.
        #[arg(long)]
        extended: bool,
    },
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    /// MP, PFP, PFV or PFA.
    #[arg(long)]
    category: Category,
    /// Article name as written in the product sheet, e.g. "MP 1".
    #[arg(long)]
    article: String,
    #[arg(long)]
    lever: Lever,
    /// Signed percentage; "3,5" and "3.5" are both accepted.
    #[arg(long, value_parser = percent_arg, allow_hyphen_values = true)]
    percent: f64,
}

impl ScenarioArgs {
    fn request(&self) -> SimulationRequest {
        SimulationRequest {
            category: self.category,
            article: self.article.clone(),
            lever: self.lever,
            percent: self.percent,
        }
    }
}

fn percent_arg(text: &str) -> Result<f64, String> {
    parse_percent(text).map_err(|e| e.to_string())
}

fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Persist the mutated document. With a session the working copy is updated
/// first and exported from there; the original file is never written.
fn save(session: Option<&WorkingCopy>, wb: &Workbook, dest: &Path) -> Result<()> {
    match session {
        Some(session) => {
            session.save(wb).context("saving working copy")?;
            session
                .export(dest)
                .with_context(|| format!("exporting to {}", dest.display()))?;
        }
        None => {
            let mut out = wb.clone();
            out.refresh_cached();
            save_json_atomic(&out, dest)
                .with_context(|| format!("writing {}", dest.display()))?;
        }
    }
    info!(dest = %dest.display(), "workbook saved");
    Ok(())
}

fn run(cli: &Cli, config: EngineConfig, wb: &mut Workbook, catalog: &Catalog) -> Result<()> {
    match &cli.command {
        Command::List => print_json(catalog),
        Command::Simulate {
            scenario,
            statement,
        } => {
            let report = Reporter::new(config)
                .run(wb, catalog, &scenario.request(), *statement)
                .context("running scenario")?;
            print_json(&report)
        }
        Command::Premium { scenario } => {
            let result = PremiumSimulator::new(config)
                .run(wb, catalog, &scenario.request())
                .context("running premium compensation")?;
            print_json(&result)
        }
        Command::Sweep {
            category,
            article,
            lever,
            from,
            to,
            step,
        } => {
            let row = catalog.find(*category, article)?;
            let percents = sim_econ::percent_range(*from, *to, *step);
            anyhow::ensure!(!percents.is_empty(), "empty percentage range {from}..={to} step {step}");
            let points = ScenarioEngine::new(config)
                .sweep(wb, row, *lever, percents)
                .context("computing sweep")?;
            print_json(&points)
        }
        Command::Statement { extended } => {
            let reader = StatementReader::new(&config);
            if *extended {
                print_json(&reader.extended_view(wb)?)
            } else {
                print_json(&reader.read_snapshot(wb)?)
            }
        }
    }
}

fn main() -> Result<()> {
    // Logging setup; RUST_LOG overrides the info default
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "starting CLI");
    let config = load_config(cli.config.as_deref())?;

    let session = match &cli.workbook {
        Some(path) => Some(
            WorkingCopy::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => None,
    };
    let mut wb = match &session {
        Some(session) => {
            info!(
                original = %session.original().display(),
                opened_at = %session.opened_at(),
                "using working copy"
            );
            session.load()?
        }
        None => sim_runtime::sample::workbook(),
    };

    let catalog = load_catalog(&wb, &config).context("building article catalog")?;
    info!(articles = catalog.len(), header_row = catalog.schema.header_row, "catalog ready");

    run(&cli, config, &mut wb, &catalog)?;

    if let Some(dest) = &cli.save {
        save(session.as_ref(), &wb, dest)?;
    }
    Ok(())
}
