//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use rangeload_core::download::constants::{CONNECT_TIMEOUT_SECS, MAX_REDIRECTS, READ_TIMEOUT_SECS};

/// Download a single file over HTTP, resuming interrupted transfers.
///
/// Running the same command again after an interruption continues from the
/// bytes already on disk; a complete file is left untouched.
#[derive(Parser, Debug)]
#[command(name = "rangeload")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the file to download
    pub url: String,

    /// Directory to save into (must already exist)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// File name to save as (used verbatim; default is derived from the URL)
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Retries after the first attempt (-1 for unlimited)
    #[arg(short = 'r', long, default_value_t = 0, allow_negative_numbers = true, value_parser = clap::value_parser!(i64).range(-1..=i64::from(u32::MAX)))]
    pub retries: i64,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: u64,

    /// Timeout between body reads in seconds
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout: u64,

    /// Disable transparent gzip decoding
    #[arg(long)]
    pub no_gzip: bool,

    /// Keep the file name exactly as given (no character substitution or length cap)
    #[arg(long)]
    pub no_sanitize: bool,

    /// Override the User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Proxy URL for all requests
    #[arg(long, conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Ignore proxy environment variables
    #[arg(long)]
    pub no_proxy: bool,

    /// Keep cookies set by the server for the follow-up requests
    #[arg(long)]
    pub cookies: bool,

    /// Extra request header as 'Name: Value' (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Basic-auth credentials as 'user[:password]'
    #[arg(long)]
    pub user: Option<String>,

    /// Extra PEM root certificate to trust (repeatable)
    #[arg(long)]
    pub ca_cert: Vec<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Maximum redirects to follow (0 disables redirects)
    #[arg(long, default_value_t = MAX_REDIRECTS)]
    pub max_redirects: usize,

    /// Fail instead of downloading when the server does not report a size
    #[arg(long)]
    pub require_size: bool,

    /// Print the transfer outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Splits `--user` into user name and optional password.
    pub fn basic_auth(&self) -> Option<(String, Option<String>)> {
        let user = self.user.as_deref()?;
        Some(match user.split_once(':') {
            Some((name, password)) => (name.to_string(), Some(password.to_string())),
            None => (user.to_string(), None),
        })
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header '{raw}' must look like 'Name: Value'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header '{raw}' has an empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
