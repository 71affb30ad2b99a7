use anyhow::Result;
use clap::Parser;
use snapdiff::application::filter::FilterOrder;
use snapdiff::application::pipeline::Outcome;
use snapdiff::presentation::cli_summary::{print_change_summary, print_perf_summary};
use snapdiff::{AppConfig, ConfigOverrides, LogLevel, StdinSignal};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "snapdiff",
    version,
    about = "Snapshot your database, do something in the app, and see exactly what changed."
)]
struct Cli {
    /// Database host
    #[arg(short = 'S', long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Database name (file path for sqlite)
    #[arg(short = 'd', long = "database")]
    database: Option<String>,

    #[arg(short = 'U', long)]
    user: Option<String>,

    #[arg(short = 'P', long)]
    password: Option<String>,

    /// postgres, mysql, mariadb or sqlite
    #[arg(long)]
    driver: Option<String>,

    /// Schema that qualifies every table
    #[arg(short = 't', long)]
    tenant: Option<String>,

    /// Drop noisy entries (duplicate recordsets, row counts, billing events)
    #[arg(short = 'f', long, num_args = 0..=1, default_missing_value = "true")]
    filter: Option<bool>,

    /// Normalise paths and reshape entries into {kind, path, old, new}
    #[arg(short = 'm', long, num_args = 0..=1, default_missing_value = "true")]
    summarize: Option<bool>,

    /// Run the filter before or after summarising
    #[arg(long, value_name = "before|after")]
    filter_order: Option<FilterOrder>,

    /// Only snapshot these tables
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Order every table's rows by this column
    #[arg(long)]
    order_by: Option<String>,

    /// json or text
    #[arg(long)]
    format: Option<String>,

    /// Print change counts and timings to stderr
    #[arg(long)]
    timings: bool,

    /// TOML config file (defaults to the per-user config file if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            driver: self.driver.clone(),
            host: self.host.clone(),
            port: self.port,
            dbname: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            tenant: self.tenant.clone(),
            filter: self.filter,
            summarize: self.summarize,
            filter_order: self.filter_order,
            tables: (!self.tables.is_empty()).then(|| self.tables.clone()),
            order_by: self.order_by.clone(),
            format: self.format.clone(),
            timings: self.timings.then_some(true),
        }
    }

    fn log_level(&self) -> LogLevel {
        match (self.verbose, self.quiet) {
            (true, _) => LogLevel::Debug,
            (_, true) => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    snapdiff::init_tracing(cli.log_level());

    let cfg = AppConfig::load(cli.config.as_deref(), &cli.overrides())?;
    let (report, perf) = snapdiff::run(&cfg, &StdinSignal::stdin()).await?;

    println!("{}", report.rendered);

    if cfg.output.timings {
        if let Outcome::Changes(entries) = &report.outcome {
            print_change_summary(entries);
        }
        print_perf_summary(&perf);
    }

    Ok(())
}
