//! CLI entry point for the rangeload tool.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rangeload_core::download::{ProxySetting, TlsOptions};
use rangeload_core::{
    ClientConfig, DownloadError, DownloadOptions, Downloader, RetryBudget, RetryPolicy,
    TransferOutcome, UnknownSizePolicy,
};
use tracing::{debug, error, info};

mod cli;
mod exit_handler;
mod progress_display;

use cli::Args;
use exit_handler::determine_exit_outcome;
use progress_display::IndicatifProgress;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let result = run(&args).await;
    if let Err(e) = &result {
        error!("{e:#}");
    }
    ExitCode::from(determine_exit_outcome(&result).code())
}

async fn run(args: &Args) -> Result<()> {
    let config = client_config(args)?;
    let options = DownloadOptions {
        directory: args.output_dir.clone(),
        filename: args.name.clone(),
        sanitize: !args.no_sanitize,
        retry: RetryPolicy::new(RetryBudget::try_from(args.retries)?),
        unknown_size: if args.require_size {
            UnknownSizePolicy::Fail
        } else {
            UnknownSizePolicy::Proceed
        },
    };
    let downloader = Downloader::from_config(&args.url, &config, options)?;

    let visible = !args.quiet && !args.json && io::stderr().is_terminal();
    let progress = IndicatifProgress::new(visible);
    let outcome = downloader.download(&progress).await;
    progress.finish();
    let outcome = outcome?;

    report(args, &outcome)
}

fn client_config(args: &Args) -> Result<ClientConfig, DownloadError> {
    let mut config = ClientConfig::default()
        .with_timeouts(
            Duration::from_secs(args.connect_timeout),
            Duration::from_secs(args.read_timeout),
        )
        .with_gzip(!args.no_gzip)
        .with_cookies(args.cookies)
        .with_max_redirects(args.max_redirects);

    if let Some(user_agent) = &args.user_agent {
        config = config.with_user_agent(user_agent.clone());
    }
    if let Some(proxy) = &args.proxy {
        config = config.with_proxy(ProxySetting::Url(proxy.clone()));
    } else if args.no_proxy {
        config = config.with_proxy(ProxySetting::Disabled);
    }
    for (name, value) in &args.headers {
        config = config.with_header(name.clone(), value.clone());
    }
    if let Some((user, password)) = args.basic_auth() {
        config = config.with_basic_auth(user, password);
    }

    let mut root_certificates_pem = Vec::with_capacity(args.ca_cert.len());
    for path in &args.ca_cert {
        let pem = std::fs::read(path).map_err(|e| {
            DownloadError::invalid_config(format!("CA certificate {}: {e}", path.display()))
        })?;
        root_certificates_pem.push(pem);
    }
    if !root_certificates_pem.is_empty() || args.insecure {
        config = config.with_tls(TlsOptions {
            root_certificates_pem,
            accept_invalid_certs: args.insecure,
        });
    }

    Ok(config)
}

fn report(args: &Args, outcome: &TransferOutcome) -> Result<()> {
    if args.json {
        let json = serde_json::to_string(outcome).context("failed to serialize outcome")?;
        println!("{json}");
        return Ok(());
    }

    if outcome.already_complete {
        info!(
            path = %outcome.path.display(),
            bytes = outcome.total_bytes,
            "already downloaded"
        );
    } else {
        info!(
            path = %outcome.path.display(),
            bytes = outcome.total_bytes,
            transferred = outcome.bytes_transferred,
            resumed_from = outcome.resumed_from,
            retries = outcome.retries,
            "download complete"
        );
    }
    Ok(())
}
