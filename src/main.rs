use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use t3scan::{
    bulletin::{self, Crawler},
    cache::Cache,
    config::Config,
    engine::{AuditEngine, AuditOptions, IntegrityScope},
    model::{AuditReport, FindingKind},
    output::{format_result_to_string, print_result, OutputFormat},
    registry::{FeedSource, FileFeed, RegistryIndex, RemoteFeed},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const INSECURE: u8 = 2;
    pub const MODIFIED: u8 = 3;
    pub const OUTDATED: u8 = 4;
}

#[derive(Parser)]
#[command(name = "t3scan")]
#[command(
    author,
    version,
    about = "Audit TYPO3 installations for insecure, outdated and modified extensions"
)]
struct Cli {
    /// Log per-extension decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan installations below a directory
    Scan {
        /// Directory below which installations are searched
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Directory levels between the path and each typo3conf directory
        #[arg(short, long)]
        depth: Option<usize>,

        /// Report extensions with a known insecure version
        #[arg(long)]
        search_insecure: bool,

        /// Report extensions with a newer registry release
        #[arg(long)]
        search_outdated: bool,

        /// Report extensions whose files differ from their checksums
        #[arg(long)]
        warn_modified: bool,

        /// Leave modified extensions out of the insecure and outdated reports
        #[arg(long)]
        ignore_modified: bool,

        /// Only verify checksums of extensions known to the registry
        #[arg(long)]
        modified_only_registered: bool,

        /// Comma separated list of `key` or `key=version` exceptions
        #[arg(long)]
        ignore_extensions: Option<String>,

        /// Registry feed URL
        #[arg(long, conflicts_with = "feed_file")]
        feed_url: Option<String>,

        /// Local copy of extensions.xml(.gz)
        #[arg(long)]
        feed_file: Option<PathBuf>,

        /// Download the feed even if a cached copy is fresh
        #[arg(long)]
        refresh: bool,

        /// Output format (text, table, json, sarif)
        #[arg(short, long)]
        format: Option<String>,

        /// Write output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with a non-zero code if findings of this kind are present
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,

        /// Scan installations one after another
        #[arg(long)]
        no_parallel: bool,
    },

    /// Collect insecure extension versions from the security bulletins
    Crawl {
        /// Bulletin index to start from
        #[arg(long, default_value = bulletin::DEFAULT_BASE_PATH)]
        base_path: String,

        /// Prefix for the relative links found on the pages
        #[arg(long, default_value = bulletin::DEFAULT_BASE_URL)]
        base_url: String,

        /// JSON file to write
        #[arg(short, long, default_value = bulletin::DEFAULT_OUTPUT)]
        output: PathBuf,
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

    /// Clear the cache
    ClearCache,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailOn {
    Insecure,
    Outdated,
    Modified,
    Any,
}

/// Scan flags after merging with the config file.
struct ScanArgs {
    root: PathBuf,
    depth: usize,
    options: AuditOptions,
    config: Config,
    feed_file: Option<PathBuf>,
    refresh: bool,
    format: OutputFormat,
    output: Option<PathBuf>,
    fail_on: Option<FailOn>,
    parallel: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(fallback)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let mut config = Config::load()?;

    match cli.command {
        Commands::Scan {
            path,
            depth,
            search_insecure,
            search_outdated,
            warn_modified,
            ignore_modified,
            modified_only_registered,
            ignore_extensions,
            feed_url,
            feed_file,
            refresh,
            format,
            output,
            fail_on,
            no_parallel,
        } => {
            if path.is_some() {
                config.root = path;
            }
            if depth.is_some() {
                config.depth = depth;
            }
            if let Some(list) = ignore_extensions {
                config.ignore_extensions = list;
            }
            if let Some(url) = feed_url {
                config.feed_url = url;
            }
            config.search_insecure |= search_insecure;
            config.search_outdated |= search_outdated;
            config.warn_modified |= warn_modified;
            config.ignore_modified |= ignore_modified;
            config.modified_only_registered |= modified_only_registered;

            let (root, depth) = config.target()?;
            let format_str = format.unwrap_or_else(|| config.default_format.clone());
            let format = OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;

            run_scan(ScanArgs {
                root,
                depth,
                options: config.audit_options(),
                config,
                feed_file,
                refresh,
                format,
                output,
                fail_on,
                parallel: !no_parallel,
            })
            .await
        }
        Commands::Crawl {
            base_path,
            base_url,
            output,
        } => {
            run_crawl(&base_path, &base_url, &output).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = Cache::with_ttl_hours(config.cache_ttl_hours);
            cache.clear()?;
            println!("Cache cleared.");
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn spinner(enabled: bool, message: &str) -> Result<Option<ProgressBar>> {
    if !enabled {
        return Ok(None);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(Some(pb))
}

/// Whether any enabled pass consults the registry.
fn needs_registry(options: &AuditOptions) -> bool {
    options.search_insecure
        || options.search_outdated
        || (options.modified.requires_check()
            && options.integrity_scope == IntegrityScope::RegisteredOnly)
}

fn feed_source(args: &ScanArgs) -> Result<Box<dyn FeedSource>> {
    if let Some(path) = &args.feed_file {
        return Ok(Box::new(FileFeed::new(path)));
    }

    let timeout = Duration::from_secs(args.config.fetch_timeout_secs);
    let mut feed = RemoteFeed::new(args.config.feed_url.clone(), timeout)?;
    if !args.refresh {
        feed = feed.with_cache(Cache::with_ttl_hours(args.config.cache_ttl_hours));
    }
    Ok(Box::new(feed))
}

async fn run_scan(args: ScanArgs) -> Result<u8> {
    let interactive = args.format.is_interactive();

    let registry = if needs_registry(&args.options) {
        let source = feed_source(&args)?;
        let progress = spinner(interactive, &format!("Loading {}...", source.describe()))?;
        let registry = RegistryIndex::load(source.as_ref()).await?;
        if let Some(pb) = progress {
            pb.finish_with_message(format!("Loaded {} registry extensions", registry.len()));
        }
        registry
    } else {
        debug!("No enabled pass needs the registry, skipping feed");
        RegistryIndex::default()
    };

    let engine = Arc::new(AuditEngine::new(
        registry,
        args.config.ignore_rules(),
        args.options,
    ));

    let progress = spinner(interactive, "Scanning installations...")?;
    let snapshot = if args.parallel {
        engine.scan_concurrent(&args.root, args.depth).await?
    } else {
        engine.scan(&args.root, args.depth)?
    };
    let report = engine.report(snapshot);
    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Scanned {} installations",
            report.installations.len()
        ));
    }

    // Handle output
    if let Some(path) = &args.output {
        let rendered = format_result_to_string(&report, args.format)?;
        std::fs::write(path, rendered)?;
        if interactive {
            println!("Results written to: {}", path.display());
        }
    } else {
        print_result(&report, args.format)?;
    }

    Ok(determine_exit_code(&report, args.fail_on))
}

/// Determine the exit code based on findings and --fail-on setting
fn determine_exit_code(report: &AuditReport, fail_on: Option<FailOn>) -> u8 {
    let Some(fail_on) = fail_on else {
        return exit_codes::SUCCESS;
    };

    let candidates: &[(FindingKind, u8)] = match fail_on {
        FailOn::Insecure => &[(FindingKind::Insecure, exit_codes::INSECURE)],
        FailOn::Modified => &[(FindingKind::Modified, exit_codes::MODIFIED)],
        FailOn::Outdated => &[(FindingKind::Outdated, exit_codes::OUTDATED)],
        FailOn::Any => &[
            (FindingKind::Insecure, exit_codes::INSECURE),
            (FindingKind::Modified, exit_codes::MODIFIED),
            (FindingKind::Outdated, exit_codes::OUTDATED),
        ],
    };

    candidates
        .iter()
        .find(|(kind, _)| report.has(*kind))
        .map(|(_, code)| *code)
        .unwrap_or(exit_codes::SUCCESS)
}

async fn run_crawl(base_path: &str, base_url: &str, output: &Path) -> Result<()> {
    let crawler = Crawler::new(base_path, base_url)?;
    let list = crawler.crawl().await?;
    bulletin::write_list(&list, output)?;
    info!(extensions = list.len(), path = %output.display(), "Wrote insecure list");
    println!(
        "Wrote {} insecure extensions to {}",
        list.len(),
        output.display()
    );
    Ok(())
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

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 't3scan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
