//! ferrosync - one-way SFTP directory mirroring
//!
//! Mirrors a local directory onto one or more remote servers, uploading new
//! and changed files and optionally deleting remote files that no longer
//! exist locally.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use ferrosync_config::{ConfigLoader, ProjectConfig, SyncConfig};
use ferrosync_sync::{EventLevel, EventSink, FnSink, NoopSink, SyncOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod connector;
mod display;
mod json_output;

use connector::Connector;
use json_output::{RunReport, ServerReport};

const REDACTED: &str = "<redacted>";

/// ferrosync - one-way SFTP directory mirroring
#[derive(Parser, Debug)]
#[command(
    name = "ferrosync",
    version = env!("CARGO_PKG_VERSION"),
    about = "One-way SFTP directory mirroring",
    long_about = "ferrosync mirrors a local directory onto remote servers over SFTP.\n\
                  Files are compared by MD5 fingerprint; only new and changed files are\n\
                  uploaded, and remote extras are deleted on request."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode - detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror a local directory onto a single server
    Sync(SyncArgs),
    /// Mirror the configured directory onto every configured server
    Run {
        /// Output results in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show configuration
    Config {
        /// Show the default configuration instead of the effective one
        #[arg(long)]
        default: bool,
    },
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Local directory to mirror
    local: PathBuf,
    /// Remote directory receiving the mirror
    remote: String,
    /// Server host name or address
    #[arg(long)]
    host: String,
    /// Login user
    #[arg(short, long)]
    user: String,
    /// SSH port
    #[arg(short, long, default_value_t = ferrosync_config::DEFAULT_PORT)]
    port: u16,
    /// Login password
    #[arg(long, env = "FERROSYNC_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Private key file used for public key login
    #[arg(long, value_name = "FILE")]
    private_key: Option<PathBuf>,
    /// Passphrase protecting the private key
    #[arg(long)]
    passphrase: Option<String>,
    /// Delete remote files that no longer exist locally
    #[arg(long)]
    delete: bool,
    /// Connection retries after the first attempt
    #[arg(long, default_value_t = 3)]
    retries: u32,
    /// Seconds to wait between connection attempts
    #[arg(long, value_name = "SECS", default_value_t = 1)]
    retry_delay: u64,
    /// Sync into this local directory (e.g. an sshfs mount) instead of over SFTP
    #[arg(long, value_name = "DIR")]
    mount_root: Option<PathBuf>,
    /// Output results in JSON format
    #[arg(long)]
    json: bool,
}

impl SyncArgs {
    /// Server configuration for this invocation, with shared settings from `project`
    fn to_sync_config(&self, project: &ProjectConfig) -> Result<SyncConfig> {
        let mut builder = SyncConfig::builder(&self.host, &self.user)
            .port(self.port)
            .retries(self.retries, Duration::from_secs(self.retry_delay))
            .timeouts(project.timeouts.to_config())
            .download_threshold(project.download_threshold)
            .follow_symlinks(project.follow_symlinks);

        if let Some(password) = &self.password {
            builder = builder.password(password);
        }
        if let Some(path) = &self.private_key {
            let key = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read private key {}", path.display()))?;
            builder = builder.private_key(key);
        }
        if let Some(passphrase) = &self.passphrase {
            builder = builder.passphrase(passphrase);
        }
        if let Some(root) = &self.mount_root {
            builder = builder.mounted(root);
        }

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let project = load_config(cli.config.as_deref())?;
    init_logging(&cli, &project)?;

    info!("Starting ferrosync v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync(args) => {
            let config = args.to_sync_config(&project)?;
            let mut report = RunReport::new(
                args.local.display().to_string(),
                args.remote.clone(),
            );
            let quiet = cli.quiet || args.json;
            report
                .servers
                .push(sync_server(config, &args.local, &args.remote, args.delete, quiet).await);
            finish(&report, args.json)
        }
        Commands::Run { json } => run_all(&project, cli.quiet || json, json).await,
        Commands::Config { default } => {
            let shown = if default {
                ProjectConfig::default()
            } else {
                redacted(&project)
            };
            print!("{}", ConfigLoader::render(&shown, None)?);
            Ok(())
        }
    }
}

/// Load the configuration file given on the command line, or the default one
fn load_config(path: Option<&Path>) -> Result<ProjectConfig> {
    let project = match path {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => ConfigLoader::load_default().context("Failed to load configuration")?,
    };
    Ok(project)
}

/// Initialize logging based on CLI flags and the configured logging section
fn init_logging(cli: &Cli, project: &ProjectConfig) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        project.logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    if project.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Sync every configured server one after another
async fn run_all(project: &ProjectConfig, quiet: bool, json: bool) -> Result<()> {
    let local = project
        .local_dir
        .as_deref()
        .context("No local_dir configured")?;
    let remote = project
        .remote_dir
        .as_deref()
        .context("No remote_dir configured")?;
    let configs = project.sync_configs()?;

    let mut report = RunReport::new(local.display().to_string(), remote);
    for config in configs {
        if !quiet {
            println!(
                "{} Syncing {} to {}:{}",
                style("→").cyan(),
                style(local.display()).yellow(),
                style(&config.host).cyan(),
                style(remote).yellow()
            );
        }
        let server = sync_server(config, local, remote, project.delete, quiet).await;
        report.servers.push(server);
    }

    finish(&report, json)
}

/// Run one full pass against one server
async fn sync_server(
    config: SyncConfig,
    local: &Path,
    remote: &str,
    delete: bool,
    quiet: bool,
) -> ServerReport {
    let host = config.host.clone();
    let connector = match Connector::for_config(&config) {
        Ok(connector) => connector,
        Err(e) => {
            return ServerReport {
                host,
                result: None,
                error: Some(e.to_string()),
            }
        }
    };

    let spinner = display::create_spinner(quiet, &format!("Connecting to {}...", config.address()));
    let sink: Arc<dyn EventSink> = match &spinner {
        Some(pb) => {
            let pb = pb.clone();
            Arc::new(FnSink::new(move |level, message: &str| match level {
                EventLevel::Info => pb.set_message(message.to_string()),
                EventLevel::Error => {
                    pb.println(format!("{} {}", style("✗").red(), style(message).red()));
                }
            }))
        }
        None => Arc::new(NoopSink),
    };

    let mut orchestrator = SyncOrchestrator::new(connector, config).with_event_sink(sink);
    let outcome = orchestrator.sync(local, remote, delete).await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    match outcome {
        Ok(result) => ServerReport {
            host,
            result: Some(result),
            error: None,
        },
        Err(e) => ServerReport {
            host,
            result: None,
            error: Some(e.to_string()),
        },
    }
}

/// Print the report and turn failed servers into a non-zero exit
fn finish(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        for server in &report.servers {
            match (&server.result, &server.error) {
                (Some(result), _) => display::print_sync_result(result),
                (None, Some(error)) => display::print_server_failure(&server.host, error),
                (None, None) => {}
            }
        }
    }

    let failed = report.failed_servers();
    if failed > 0 {
        bail!("{} of {} servers failed", failed, report.servers.len());
    }
    Ok(())
}

/// Copy of `project` with every secret replaced
fn redacted(project: &ProjectConfig) -> ProjectConfig {
    let mut shown = project.clone();
    for server in &mut shown.servers {
        for secret in [
            &mut server.password,
            &mut server.private_key,
            &mut server.passphrase,
        ] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
    }
    shown
}
