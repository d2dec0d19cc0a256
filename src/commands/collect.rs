use super::Host;
use super::common::{ColorMode, LogLevel, init_logging};
use crate::Result;
use crate::config::Config;
use crate::facts::{ClientOptions, CollectionResult, Collector, FetchError, RateLimitedClient};
use crate::reports::{RunReport, generate_console, write_outputs};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::app_err;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "   collect";

/// Fallback token variable, checked when neither `--github-token` nor `GITHUB_TOKEN` is set.
const PAT_ENV_VAR: &str = "GITHUB_PAT";

#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// GitHub username whose profile and repositories are collected
    #[arg(value_name = "USERNAME", env = "GITHUB_USERNAME")]
    pub username: String,

    /// GitHub personal access token [falls back to GITHUB_PAT]
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Directory where the JSON documents are written
    #[arg(long, short = 'o', value_name = "DIR", default_value = ".")]
    pub output_dir: Utf8PathBuf,

    /// Path to configuration file (default is `gh-census.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,

    /// Skip the credential and quota check before collecting
    #[arg(long)]
    pub no_preflight: bool,

    /// Also print a table of repository scores
    #[arg(long)]
    pub console: bool,
}

pub async fn process_collect<H: Host>(host: &mut H, args: &CollectArgs) -> Result<()> {
    init_logging(args.log_level);

    let config = Config::load(Utf8Path::new("."), args.config.as_deref())?;
    let token = resolve_token(args.github_token.as_deref(), |key| std::env::var(key).ok());
    let client = Arc::new(RateLimitedClient::new(ClientOptions::from_config(&config, token.as_deref()))?);
    let collector = Collector::new(client, &config);

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let outcome = collect(&collector, args, &cancel).await;
    ctrl_c.abort();

    let report = RunReport::from_outcome(&args.username, &outcome);

    match outcome {
        Ok(result) => {
            let files = write_outputs(&result, &args.output_dir)?;
            log::debug!(target: LOG_TARGET, "Scores written to '{}'", files.scores);

            if args.console {
                let mut console_output = String::new();
                generate_console(&result, args.color.use_colors(), &mut console_output)?;
                let _ = write!(host.output(), "{console_output}");
            }

            let _ = writeln!(host.output(), "{}", serde_json::to_string(&report)?);
            Ok(())
        }

        Err(e) => {
            let _ = writeln!(host.output(), "{}", serde_json::to_string(&report)?);
            let _ = writeln!(host.error(), "❌ Collection for '{}' failed: {e}", args.username);
            host.exit(report.exit_code());
            Err(app_err!("collection for '{}' failed: {e}", args.username))
        }
    }
}

async fn collect(collector: &Collector, args: &CollectArgs, cancel: &CancellationToken) -> Result<CollectionResult, FetchError> {
    if !args.no_preflight {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FetchError::Cancelled),
            status = collector.preflight() => {
                let _ = status?;
            }
        }
    }

    collector.run(&args.username, cancel).await
}

/// An explicit token wins; otherwise `GITHUB_PAT` is consulted. Blank values count as unset.
fn resolve_token(explicit: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    let non_blank = |token: &String| !token.trim().is_empty();
    explicit
        .map(str::to_owned)
        .filter(non_blank)
        .or_else(|| lookup(PAT_ENV_VAR).filter(non_blank))
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::warn!(target: LOG_TARGET, "Interrupted, cancelling collection");
        cancel.cancel();
    }
}
