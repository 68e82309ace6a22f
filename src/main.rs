//! BrokenLink Scanner main entry point
//!
//! This is the command-line interface for the broken-link scanner. Findings
//! (or the error payload) are written to stdout as JSON; logs go to stderr.

use anyhow::Context;
use brokenlink_scanner::config::{default_config, load_config};
use brokenlink_scanner::output::{format_summary, summarize, write_error_json, write_findings_json};
use brokenlink_scanner::{Cooperation, ScanOptions, Scanner, SiteCredentials};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// BrokenLink Scanner: a bounded broken-link and missing-asset auditor
///
/// Crawls a single site breadth-first, checking every page and same-origin
/// asset it finds, while respecting robots.txt and per-host pacing.
#[derive(Parser, Debug)]
#[command(name = "brokenlink-scanner")]
#[command(version)]
#[command(about = "A polite broken-link scanner", long_about = None)]
struct Cli {
    /// Start URL of the scan
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fail instead of escalating to a rendered browser fetch
    #[arg(long)]
    no_browser_fallback: bool,

    /// The scanner's address is allow-listed by the site (doubles the budget)
    #[arg(long)]
    whitelist_ip: bool,

    /// Username for sites behind HTTP authentication
    #[arg(long, requires = "password")]
    user: Option<String>,

    /// Password for sites behind HTTP authentication
    #[arg(long, requires = "user")]
    password: Option<String>,

    /// API key sent as the X-API-Key header
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Print a summary of the findings to stderr
    #[arg(long)]
    summary: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn scan_options(&self) -> ScanOptions {
        let site_credentials = match (&self.user, &self.password) {
            (Some(user), Some(pass)) => Some(SiteCredentials {
                user: user.clone(),
                pass: pass.clone(),
            }),
            _ => None,
        };

        ScanOptions {
            cooperation: Cooperation {
                whitelist_ip: self.whitelist_ip,
                site_credentials,
                api_key: self.api_key.clone(),
            },
            allow_browser_fallback: !self.no_browser_fallback,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => default_config().context("Invalid default configuration")?,
    };

    let scanner = Scanner::new(config).context("Failed to initialize scanner")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling scan");
            on_signal.cancel();
        }
    });

    let stdout = std::io::stdout().lock();
    match scanner
        .scan_with_cancel(&cli.url, cli.scan_options(), cancel)
        .await
    {
        Ok(findings) => {
            write_findings_json(stdout, &findings, cli.pretty)
                .context("Failed to write findings")?;
            if cli.summary {
                eprint!("{}", format_summary(&summarize(&findings)));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!("Scan failed: {}", err);
            write_error_json(stdout, &err, cli.pretty).context("Failed to write error")?;
            if cli.summary {
                if let Some(partial) = err.partial_findings() {
                    eprint!("{}", format_summary(&summarize(partial)));
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "brokenlink_scanner=info,warn",
            1 => "brokenlink_scanner=debug,info",
            2 => "brokenlink_scanner=trace,debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_options() {
        let cli = Cli::parse_from([
            "brokenlink-scanner",
            "https://example.com",
            "--whitelist-ip",
            "--no-browser-fallback",
            "--user",
            "u",
            "--password",
            "p",
            "--api-key",
            "k",
        ]);
        let options = cli.scan_options();
        assert!(options.cooperation.whitelist_ip);
        assert!(!options.allow_browser_fallback);
        assert_eq!(options.cooperation.api_key.as_deref(), Some("k"));
        assert_eq!(
            options.cooperation.site_credentials.map(|c| c.user),
            Some("u".to_string())
        );
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["brokenlink-scanner", "https://example.com"]);
        let options = cli.scan_options();
        assert_eq!(options, ScanOptions::default());
    }

    #[test]
    fn test_user_requires_password() {
        assert!(Cli::try_parse_from(["brokenlink-scanner", "https://x.com", "--user", "u"]).is_err());
    }
}
