//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::claims::Claim;
use crate::config::{Config, ConfigError, SigningAlgorithm};
use crate::password::{HashParams, HashVersion};

/// Environment variable holding the signing key.
pub const SIGNING_KEY_ENV: &str = "WARDEN_SIGNING_KEY";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "warden",
    about = "Issue tokens, hash passwords, and mint entity ids"
)]
pub struct Args {
    /// Path to file containing the signing key. Prefer the WARDEN_SIGNING_KEY env var instead
    #[arg(long)]
    pub signing_key_file: Option<String>,

    /// HMAC algorithm for access tokens
    #[arg(long, default_value = "hs256")]
    pub algorithm: SigningAlgorithm,

    /// Value of the `iss` claim
    #[arg(long, env = "WARDEN_ISSUER", default_value = crate::config::DEFAULT_ISSUER)]
    pub issuer: String,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "300")]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "1209600")]
    pub refresh_token_ttl: u64,

    /// Do not issue refresh tokens
    #[arg(long)]
    pub no_refresh_token: bool,

    /// Base URL of email verification links
    #[arg(
        long,
        env = "WARDEN_VERIFICATION_LINK_BASE",
        default_value = "http://localhost:8080/verify-email"
    )]
    pub verification_link_base: String,

    /// Base URL of password reset links
    #[arg(
        long,
        env = "WARDEN_RESET_LINK_BASE",
        default_value = "http://localhost:8080/reset-password"
    )]
    pub reset_link_base: String,

    /// Layout version written by new password hashes (0 = legacy)
    #[arg(long, default_value = "1", value_parser = parse_hash_version)]
    pub hash_version: HashVersion,

    /// Argon2 memory cost in KiB
    #[arg(long, default_value = "19456")]
    pub hash_memory_kib: u32,

    /// Argon2 iterations
    #[arg(long, default_value = "2")]
    pub hash_iterations: u32,

    /// Argon2 parallelism
    #[arg(long, default_value = "1")]
    pub hash_parallelism: u32,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Issue an access token (and refresh token) for a set of claims
    Issue {
        /// Claim as name=value; may be repeated, names may repeat
        #[arg(short, long = "claim")]
        claims: Vec<Claim>,
    },
    /// Validate an access token and print its claims
    Inspect { token: String },
    /// Hash a password read from stdin and print it as base64
    HashPassword,
    /// Verify a password read from stdin against a base64 stored hash
    VerifyPassword { hash: String },
    /// Print new entity ids
    NewId {
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
    /// Render an email verification message
    VerificationEmail(EmailArgs),
    /// Render a password reset message
    ResetEmail(EmailArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct EmailArgs {
    /// Token to embed in the link
    #[arg(long)]
    pub token: String,

    /// Hours until the link expires
    #[arg(long, default_value = "24", allow_negative_numbers = true)]
    pub hours: i64,

    /// Hand the message to the log sender for this address instead of printing it
    #[arg(long)]
    pub to: Option<String>,
}

fn parse_hash_version(s: &str) -> Result<HashVersion, String> {
    s.parse::<u8>()
        .ok()
        .and_then(HashVersion::from_tag)
        .ok_or_else(|| format!("Unknown hash version: {}", s))
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Load the signing key from the environment or a file.
pub fn load_signing_key(signing_key_file: Option<&str>) -> Result<Vec<u8>, ConfigError> {
    if let Ok(key) = std::env::var(SIGNING_KEY_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(SIGNING_KEY_ENV) };
        return Ok(key.trim().as_bytes().to_vec());
    }

    let Some(path) = signing_key_file else {
        return Err(ConfigError::MissingSigningKey);
    };

    let content = std::fs::read(path).map_err(|source| ConfigError::SigningKeyFile {
        path: path.to_string(),
        source,
    })?;
    info!(path = %path, "Signing key loaded from file");
    Ok(content.trim_ascii().to_vec())
}

/// Build the validated configuration from arguments and the signing key.
pub fn build_config(args: &Args, signing_key: Vec<u8>) -> Result<Config, ConfigError> {
    Config::builder(signing_key)
        .algorithm(args.algorithm)
        .issuer(args.issuer.clone())
        .access_token_lifetime(Duration::from_secs(args.access_token_ttl))
        .issue_refresh_token(!args.no_refresh_token)
        .refresh_token_lifetime(Duration::from_secs(args.refresh_token_ttl))
        .verification_link_base(args.verification_link_base.clone())
        .reset_link_base(args.reset_link_base.clone())
        .hash_version(args.hash_version)
        .hash_params(HashParams {
            memory_kib: args.hash_memory_kib,
            iterations: args.hash_iterations,
            parallelism: args.hash_parallelism,
        })
        .build()
}
