use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;

use libyear::cache::VersionStore;
use libyear::config::{self, CONCURRENCY_ENV, Config, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
use libyear::output::{CsvOutput, JsonOutput, Output, TableOutput};
use libyear::registry::vcs::VcsRegistry;
use libyear::resolve::Command;
use libyear::source::ManifestSource;

#[derive(Parser)]
#[command(name = "libyear")]
#[command(version, about = "Calculate dependency staleness metrics for Go modules")]
struct Cli {
    /// Path to a go.mod file. When omitted, the manifest is read from stdin
    /// if it is piped.
    path: Option<PathBuf>,

    /// Fetch the go.mod file from this URL.
    #[arg(long, conflicts_with_all = ["path", "pkg"])]
    url: Option<String>,

    /// Analyze a package by module path, optionally pinned ('path@vX.Y.Z');
    /// its go.mod is fetched from the registry.
    #[arg(long, conflicts_with = "path")]
    pkg: Option<String>,

    /// Print the report as CSV instead of an aligned table.
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Print the report as JSON instead of an aligned table.
    #[arg(long)]
    json: bool,

    /// Persist fetched publish times across runs.
    #[arg(long)]
    cache: bool,

    /// Location of the persisted cache file (implies defaults under the
    /// user cache directory otherwise).
    #[arg(long, requires = "cache")]
    cache_file_path: Option<PathBuf>,

    /// Directory for git clones of private modules.
    #[arg(long)]
    vcs_cache_dir: Option<PathBuf>,

    /// Whole-run timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Query versions through 'go list -m' instead of the module proxy.
    #[arg(long)]
    go_list: bool,

    /// Include dependencies marked '// indirect'.
    #[arg(long)]
    indirect: bool,

    /// Drop dependencies that are already up to date from the report.
    #[arg(long)]
    skip_fresh: bool,

    /// Also compute the number of releases between current and latest.
    #[arg(long)]
    releases: bool,

    /// Also compute the version-component delta between current and latest.
    #[arg(long)]
    versions: bool,

    /// Probe '/vN' module paths to find releases on newer major lines.
    #[arg(long)]
    find_latest_major: bool,

    /// Measure libyear from the declared version's own publish time even
    /// when the latest release lives on a newer major line.
    #[arg(long, requires = "find_latest_major")]
    no_libyear_compensation: bool,

    /// Treat the newest release published at or before this date as
    /// "latest" (YYYY-MM-DD or RFC 3339).
    #[arg(long, conflicts_with = "find_latest_major", value_parser = parse_cutoff)]
    released_before: Option<DateTime<Utc>>,

    /// Number of dependencies resolved in parallel.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log filter directive, e.g. 'info' or 'libyear=debug'.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let source = manifest_source(&cli)?;
    let output: Box<dyn Output> = if cli.json {
        Box::new(JsonOutput)
    } else if cli.csv {
        Box::new(CsvOutput)
    } else {
        Box::new(TableOutput)
    };

    let config = Config {
        concurrency: cli
            .concurrency
            .or_else(concurrency_from_env)
            .unwrap_or(DEFAULT_CONCURRENCY),
        include_indirect: cli.indirect,
        skip_fresh: cli.skip_fresh,
        releases: cli.releases,
        versions: cli.versions,
        find_latest_major: cli.find_latest_major,
        no_libyear_compensation: cli.no_libyear_compensation,
        released_before: cli.released_before,
        goproxy_url: goproxy_from_env(),
        private_patterns: std::env::var("GOPRIVATE").unwrap_or_default(),
    };

    let mut builder = Command::builder(source, output)
        .with_go_list(cli.go_list)
        .with_config(config.clone());

    if cli.cache {
        let cache_file = cli
            .cache_file_path
            .clone()
            .unwrap_or_else(config::default_cache_file);
        let store = VersionStore::open(&cache_file)
            .with_context(|| format!("failed to open cache file {}", cache_file.display()))?;
        builder = builder.with_store(std::sync::Arc::new(store));
    }

    if !config.private_patterns.is_empty() || cli.vcs_cache_dir.is_some() {
        let vcs_dir = cli
            .vcs_cache_dir
            .clone()
            .unwrap_or_else(config::default_vcs_cache_dir);
        builder = builder.with_vcs_registry(std::sync::Arc::new(VcsRegistry::new(
            vcs_dir,
            &config.private_patterns,
        )));
    }

    let command = builder.build();
    tokio::select! {
        result = tokio::time::timeout(Duration::from_secs(cli.timeout), command.run()) => {
            match result {
                Ok(run_result) => run_result?,
                Err(_) => anyhow::bail!("resolution did not finish within {}s", cli.timeout),
            }
        }
        _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
    }
    Ok(())
}

fn manifest_source(cli: &Cli) -> anyhow::Result<ManifestSource> {
    if let Some(url) = &cli.url {
        return Ok(ManifestSource::Url(url.clone()));
    }
    if let Some(pkg) = &cli.pkg {
        return Ok(ManifestSource::Pkg(pkg.clone()));
    }
    if let Some(path) = &cli.path {
        return Ok(ManifestSource::File(path.clone()));
    }
    use std::io::IsTerminal;
    if std::io::stdin().is_terminal() {
        anyhow::bail!("no go.mod given: pass a path, --url, --pkg, or pipe the file on stdin");
    }
    Ok(ManifestSource::Stdin)
}

fn parse_cutoff(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(time) = raw.parse::<DateTime<Utc>>() {
        return Ok(time);
    }
    raw.parse::<chrono::NaiveDate>()
        .map(|date| date.and_hms_opt(0, 0, 0).unwrap().and_utc())
        .map_err(|e| format!("invalid date '{raw}': {e} (expected YYYY-MM-DD or RFC 3339)"))
}

fn concurrency_from_env() -> Option<usize> {
    let raw = std::env::var(CONCURRENCY_ENV).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring invalid {CONCURRENCY_ENV}={raw}");
            None
        }
    }
}

/// First usable proxy URL from GOPROXY, which may be a comma or pipe
/// separated list mixing URLs with 'direct' and 'off' keywords.
fn goproxy_from_env() -> Option<String> {
    let raw = std::env::var("GOPROXY").ok()?;
    raw.split([',', '|'])
        .map(str::trim)
        .find(|entry| !entry.is_empty() && *entry != "direct" && *entry != "off")
        .map(str::to_string)
}
