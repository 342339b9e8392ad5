use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deprisk::{
    cache::Cache,
    checker::{OsvChecker, SeedChecker, VulnerabilityChecker},
    config::{Config, VulnSource},
    license::{load_license_seed, LicensePolicy},
    model::ScanReport,
    output::{print_report, render_json, OutputFormat},
    registry::NpmRegistry,
    scan::Pipeline,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const SCORE_ABOVE_THRESHOLD: u8 = 2;
}

#[derive(Parser)]
#[command(name = "deprisk")]
#[command(
    author,
    version,
    about = "Score npm lockfiles for vulnerabilities, license policy and staleness"
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a lockfile or a project directory
    Scan {
        /// package-lock.json, pnpm-lock.yaml, or a directory containing one
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Vulnerability source (osv, seed)
        #[arg(short, long)]
        source: Option<String>,

        /// Directory with vulnerabilities.json and licenses.json
        #[arg(long)]
        seed_dir: Option<PathBuf>,

        /// JSON license policy replacing the built-in table
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Skip npm registry lookups for staleness and release age
        #[arg(long)]
        no_staleness: bool,

        /// Write the JSON report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Clear cache before scanning
        #[arg(long)]
        clear_cache: bool,

        /// Exit with status 2 if the risk score is above this value
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        fail_above: Option<u8>,
    },

    /// Show the effective license policy
    Policy {
        /// JSON policy file to show instead of the configured one
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the registry cache
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct ScanOptions {
    path: PathBuf,
    format: OutputFormat,
    source: VulnSource,
    seed_dir: PathBuf,
    check_staleness: bool,
    output: Option<PathBuf>,
    fail_above: Option<u8>,
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = Config::load()?;

    match cli.command {
        Commands::Scan {
            path,
            format,
            source,
            seed_dir,
            policy,
            no_staleness,
            output,
            clear_cache,
            fail_above,
        } => {
            if clear_cache {
                Cache::with_ttl_hours(config.cache_ttl_hours).clear()?;
            }
            if policy.is_some() {
                config.license.policy_file = policy;
            }

            let format = format.unwrap_or_else(|| config.default_format.clone());
            let source = match source {
                Some(s) => VulnSource::from_str(&s).map_err(anyhow::Error::msg)?,
                None => config.vuln_source,
            };
            let options = ScanOptions {
                path,
                format: OutputFormat::from_str(&format).map_err(anyhow::Error::msg)?,
                source,
                seed_dir: seed_dir.unwrap_or_else(|| config.seed_dir.clone()),
                check_staleness: !no_staleness && config.check_staleness,
                output,
                fail_above: fail_above.or(config.fail_above),
            };
            run_scan(&config, options).await
        }
        Commands::Policy { file } => {
            if file.is_some() {
                config.license.policy_file = file;
            }
            print_policy(&config.license.build_policy()?);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = Cache::new();
            let removed = cache.clear()?;
            println!("Cache cleared ({} entries).", removed);
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn build_pipeline(config: &Config, options: &ScanOptions) -> Result<Pipeline> {
    let checker: Box<dyn VulnerabilityChecker> = match options.source {
        VulnSource::Seed => Box::new(
            SeedChecker::from_dir(&options.seed_dir).context("Failed to load vulnerability seed")?,
        ),
        VulnSource::Osv => Box::new(OsvChecker::with_base_url(config.osv_api_url.as_str())?),
    };
    debug!(checker = checker.name(), "vulnerability source selected");

    let mut pipeline = Pipeline::new(checker)
        .with_policy(config.license.build_policy()?)
        .with_ignore(config.ignore.clone())
        .with_license_seed(
            load_license_seed(&options.seed_dir).context("Failed to load license seed")?,
        );

    if options.check_staleness {
        let cache = Cache::with_ttl_hours(config.cache_ttl_hours);
        pipeline = pipeline.with_registry(Box::new(NpmRegistry::new(
            config.registry_url.as_str(),
            Some(cache),
        )?));
    }
    Ok(pipeline)
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Reading lockfile...");
    Ok(pb)
}

async fn run_scan(config: &Config, options: ScanOptions) -> Result<u8> {
    let is_interactive = options.format == OutputFormat::Table;
    let mut pipeline = build_pipeline(config, &options)?;

    let progress = if is_interactive { Some(spinner()?) } else { None };
    if let Some(pb) = progress.clone() {
        pipeline = pipeline.with_progress(move |stage| pb.set_message(stage.to_string()));
    }

    let report = pipeline.scan_path(&options.path).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let report = report?;

    if let Some(path) = &options.output {
        // Report files are always JSON, whatever the console format.
        std::fs::write(path, render_json(&report)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if is_interactive {
            println!("Report written to: {}", path.display());
        }
    } else {
        print_report(&report, options.format)?;
    }

    Ok(determine_exit_code(&report, options.fail_above))
}

fn determine_exit_code(report: &ScanReport, fail_above: Option<u8>) -> u8 {
    match fail_above {
        Some(threshold) if report.score.total > threshold => exit_codes::SCORE_ABOVE_THRESHOLD,
        _ => exit_codes::SUCCESS,
    }
}

#[derive(Tabled)]
struct PolicyRow {
    #[tabled(rename = "License")]
    spdx: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn print_policy(policy: &LicensePolicy) {
    let rows: Vec<PolicyRow> = policy
        .entries()
        .into_iter()
        .map(|(spdx, status)| PolicyRow {
            spdx: spdx.to_string(),
            status: status.to_string(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("Licenses not listed are treated as 'warn'.");
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'deprisk config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
