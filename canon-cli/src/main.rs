//! Canon - list packages and search canonical resources from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing_subscriber::EnvFilter;

use canon_core::{
    CanonicalManager, IndexEntry, ManagerConfig, PackageInfo, PackageStatus, SearchCriteria,
};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "canon",
    about = "Index versioned resource packages and search them by canonical URL",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Configuration file (YAML or JSON)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Override the working directory
    #[clap(long, global = true)]
    working_dir: Option<PathBuf>,

    /// Override the registry URL
    #[clap(long, global = true)]
    registry: Option<String>,

    /// Package to make available (name@version); repeatable
    #[clap(long = "package", short = 'p', global = true)]
    packages: Vec<String>,

    /// Package directory to scan in place; repeatable
    #[clap(long = "local", global = true)]
    local: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List indexed packages
    Packages {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search index entries
    Search {
        /// Exact canonical URL
        #[clap(long)]
        url: Option<String>,

        /// Resource type
        #[clap(long = "type")]
        type_name: Option<String>,

        /// Resource kind
        #[clap(long)]
        kind: Option<String>,

        /// Resource version
        #[clap(long)]
        version: Option<String>,

        /// Owning package name
        #[clap(long = "in-package")]
        package: Option<String>,

        /// Keep only entries whose canonical URL contains this text
        #[clap(long)]
        contains: Option<String>,

        /// Maximum number of results
        #[clap(long)]
        limit: Option<usize>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Resolve a canonical URL to its preferred entry
    Resolve {
        /// Canonical URL
        url: String,

        /// Exact resource version instead of the highest
        #[clap(long)]
        version: Option<String>,

        /// Print the resource content instead of the index entry
        #[clap(long)]
        resource: bool,
    },
}

fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr) // Critical: logs to stderr, not stdout
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr) // Critical: logs to stderr, not stdout
            .init();
    }
}

fn build_config(cli: &Cli) -> Result<ManagerConfig> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::load_from_path(path)?,
        None => ManagerConfig::default(),
    };

    if let Some(dir) = &cli.working_dir {
        config.working_dir = dir.clone();
    }
    if let Some(registry) = &cli.registry {
        config.registry = registry.clone();
    }
    config.packages.extend(cli.packages.iter().cloned());
    config.local_packages.extend(cli.local.iter().cloned());

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let config = build_config(&cli)?;
    tracing::debug!(
        "Working directory {}, registry {}",
        config.working_dir.display(),
        config.registry
    );
    let mut manager = CanonicalManager::new(config).context("Failed to create manager")?;

    let report = manager.init().await;
    for failed in report.failed() {
        let reason = match &failed.status {
            PackageStatus::Invalid { reason } | PackageStatus::FetchFailed { reason } => {
                reason.clone()
            }
            PackageStatus::Scanned(outcome) => format!("{outcome:?}"),
        };
        eprintln!("warning: {} unavailable: {}", failed.source, reason);
    }

    let result = match cli.command {
        Command::Packages { json } => execute_packages(&manager, json),
        Command::Search {
            url,
            type_name,
            kind,
            version,
            package,
            contains,
            limit,
            json,
        } => {
            let criteria = SearchCriteria {
                url,
                type_name,
                kind,
                version,
                package,
            };
            execute_search(&manager, &criteria, contains.as_deref(), limit, json)
        }
        Command::Resolve {
            url,
            version,
            resource,
        } => execute_resolve(&manager, &url, version.as_deref(), resource),
    };

    manager.destroy();
    result
}

/// Table row for package listings
#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Canonical")]
    canonical: String,
    #[tabled(rename = "FHIR Versions")]
    fhir_versions: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&PackageInfo> for PackageRow {
    fn from(info: &PackageInfo) -> Self {
        Self {
            name: info.id.name.clone(),
            version: info.id.version.clone(),
            canonical: info.canonical.clone().unwrap_or_default(),
            fhir_versions: info.fhir_versions.join(", "),
            path: info.path.display().to_string(),
        }
    }
}

fn execute_packages(manager: &CanonicalManager, json_output: bool) -> Result<()> {
    let packages = manager.packages();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    if packages.is_empty() {
        println!("No packages indexed.");
        return Ok(());
    }

    let rows: Vec<PackageRow> = packages.into_iter().map(PackageRow::from).collect();
    print_table(rows);
    Ok(())
}

/// Table row for search results
#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Type")]
    type_name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Package")]
    package: String,
}

impl From<&IndexEntry> for EntryRow {
    fn from(entry: &IndexEntry) -> Self {
        Self {
            url: entry.url.clone().unwrap_or_default(),
            type_name: entry
                .type_name
                .clone()
                .or_else(|| entry.resource_type.clone())
                .unwrap_or_default(),
            kind: entry.kind.clone().unwrap_or_default(),
            version: entry.version.clone().unwrap_or_default(),
            package: entry.package.id.to_string(),
        }
    }
}

fn execute_search(
    manager: &CanonicalManager,
    criteria: &SearchCriteria,
    contains: Option<&str>,
    limit: Option<usize>,
    json_output: bool,
) -> Result<()> {
    let mut results = manager.search_entries(criteria);

    if let Some(text) = contains {
        results.retain(|entry| entry.url.as_deref().is_some_and(|url| url.contains(text)));
    }
    if let Some(limit) = limit {
        results.truncate(limit);
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    let count = results.len();
    let rows: Vec<EntryRow> = results.into_iter().map(EntryRow::from).collect();
    print_table(rows);
    println!("\n{count} entries");
    Ok(())
}

fn execute_resolve(
    manager: &CanonicalManager,
    url: &str,
    version: Option<&str>,
    resource: bool,
) -> Result<()> {
    let entry = match version {
        Some(version) => manager.cache().resolve_version(url, version),
        None => manager.resolve(url),
    }
    .with_context(|| format!("No entry found for {url}"))?;

    if resource {
        let content = manager.read_resource(entry)?;
        println!("{}", serde_json::to_string_pretty(&content)?);
    } else {
        println!("{}", serde_json::to_string_pretty(entry)?);

        let versions = manager.cache().versions_of(url);
        if versions.len() > 1 {
            eprintln!("Other versions available: {}", versions.join(", "));
        }
    }

    Ok(())
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let mut table = Table::new(rows);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    println!("{table}");
}
