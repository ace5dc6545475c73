use std::io::{Read, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use warden::Identity;
use warden::cli::{Args, Command, EmailArgs, build_config, init_logging, load_signing_key};
use warden::config::ConfigError;
use warden::email::{EmailSender, EmailTemplate, LogEmailSender};

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args.log_format);

    let signing_key = match load_signing_key(args.signing_key_file.as_deref()) {
        Ok(key) => key,
        Err(ConfigError::MissingSigningKey) => {
            error!(
                "Signing key is required. Set WARDEN_SIGNING_KEY environment variable (recommended) or use --signing-key-file"
            );
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "Failed to load signing key");
            return ExitCode::FAILURE;
        }
    };

    let config = match build_config(&args, signing_key) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let identity = Identity::new(Arc::new(config));

    match run(&identity, args.command) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(identity: &Identity, command: Command) -> Result<ExitCode> {
    let mut out = std::io::stdout().lock();

    match command {
        Command::Issue { claims } => {
            let issued = identity.tokens().issue(Some(claims.as_slice()))?;
            info!(claims = claims.len(), "Issued access token");
            serde_json::to_writer_pretty(&mut out, &issued)?;
            writeln!(out)?;
        }
        Command::Inspect { token } => {
            let token = identity.tokens().validate_access_token(&token)?;
            let email_verified = token.is_email_verified();
            let report = json!({
                "issuer": token.issuer,
                "issued_at": token.issued_at,
                "expires_at": token.expires_at,
                "email_verified": email_verified,
                "claims": token.claims,
            });
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
        Command::HashPassword => {
            let password = read_password()?;
            let stored = identity.passwords().hash(&password)?;
            writeln!(out, "{}", STANDARD.encode(stored))?;
        }
        Command::VerifyPassword { hash } => {
            let stored = STANDARD
                .decode(hash.trim())
                .context("Stored hash is not valid base64")?;
            let password = read_password()?;
            let outcome = identity.verify_password(&password, &stored);
            writeln!(out, "{}", outcome)?;
            if !outcome.is_success() {
                return Ok(ExitCode::from(2));
            }
        }
        Command::NewId { count } => {
            for _ in 0..count {
                writeln!(out, "{}", identity.ids().next_id())?;
            }
        }
        Command::VerificationEmail(args) => {
            let template = identity
                .templates()
                .verification_template(&args.token, args.hours)?;
            deliver(&args, &template, &mut out)?;
        }
        Command::ResetEmail(args) => {
            let template = identity
                .templates()
                .reset_template(&args.token, args.hours)?;
            deliver(&args, &template, &mut out)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn deliver(args: &EmailArgs, template: &EmailTemplate, out: &mut impl Write) -> Result<()> {
    match &args.to {
        Some(to) => LogEmailSender.send(to, template),
        None => {
            serde_json::to_writer_pretty(&mut *out, template)?;
            writeln!(out)?;
            Ok(())
        }
    }
}

/// Read a password from stdin, dropping the trailing line break only.
fn read_password() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read password from stdin")?;

    let password = input
        .strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(input.as_str());
    if password.is_empty() {
        bail!("No password provided on stdin");
    }
    Ok(password.to_string())
}
