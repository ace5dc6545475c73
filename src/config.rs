//! Process-wide configuration, validated once at startup.
//!
//! A [`Config`] is immutable after [`ConfigBuilder::build`]. Components take
//! what they need from it at construction time; reloading means building a
//! new `Config` and new components from it.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretSlice};
use thiserror::Error;
use url::Url;

use crate::password::{HashParams, HashVersion};

/// Shortest accepted HMAC signing key, in bytes.
pub const MIN_SIGNING_KEY_LENGTH: usize = 32;

/// Default access token lifetime: 5 minutes
pub const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Default refresh token lifetime: 2 weeks
pub const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(14 * 24 * 60 * 60);

pub const DEFAULT_ISSUER: &str = "warden";

/// HMAC algorithm used to sign access tokens.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigningAlgorithm {
    #[default]
    Hs256,
    Hs384,
    Hs512,
}

impl SigningAlgorithm {
    pub fn jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            SigningAlgorithm::Hs256 => jsonwebtoken::Algorithm::HS256,
            SigningAlgorithm::Hs384 => jsonwebtoken::Algorithm::HS384,
            SigningAlgorithm::Hs512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

/// Fatal configuration problems. These are raised at startup, never per call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("signing key is required")]
    MissingSigningKey,
    #[error("signing key is shorter than 32 bytes ({0} bytes given)")]
    SigningKeyTooShort(usize),
    #[error("failed to read signing key file {path}: {source}")]
    SigningKeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is not a valid link base ({url}): {reason}")]
    InvalidLinkBase {
        name: &'static str,
        url: String,
        reason: &'static str,
    },
    #[error("invalid password hash parameters: {0}")]
    InvalidHashParams(#[from] argon2::Error),
    #[error("{0} must be greater than zero")]
    ZeroLifetime(&'static str),
}

/// Read-only inputs to the identity core.
#[derive(Debug)]
pub struct Config {
    signing_key: SecretSlice<u8>,
    pub algorithm: SigningAlgorithm,
    /// Value of the `iss` claim in every access token
    pub issuer: String,
    pub access_token_lifetime: Duration,
    pub issue_refresh_token: bool,
    pub refresh_token_lifetime: Duration,
    pub verification_link_base: Url,
    pub reset_link_base: Url,
    /// Version written by new password hashes
    pub current_hash_version: HashVersion,
    /// Argon2 parameters written by new version 1 hashes
    pub current_hash_params: HashParams,
}

impl Config {
    pub fn builder(signing_key: impl Into<Vec<u8>>) -> ConfigBuilder {
        ConfigBuilder::new(signing_key.into())
    }

    pub fn signing_key(&self) -> &[u8] {
        self.signing_key.expose_secret()
    }
}

/// Builder for [`Config`]; every value has a default except the signing key.
pub struct ConfigBuilder {
    signing_key: Vec<u8>,
    algorithm: SigningAlgorithm,
    issuer: String,
    access_token_lifetime: Duration,
    issue_refresh_token: bool,
    refresh_token_lifetime: Duration,
    verification_link_base: String,
    reset_link_base: String,
    current_hash_version: HashVersion,
    current_hash_params: HashParams,
}

impl ConfigBuilder {
    fn new(signing_key: Vec<u8>) -> Self {
        Self {
            signing_key,
            algorithm: SigningAlgorithm::default(),
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
            issue_refresh_token: true,
            refresh_token_lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
            verification_link_base: "http://localhost:8080/verify-email".to_string(),
            reset_link_base: "http://localhost:8080/reset-password".to_string(),
            current_hash_version: HashVersion::V1,
            current_hash_params: HashParams::default(),
        }
    }

    #[must_use]
    pub fn algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    #[must_use]
    pub fn access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn issue_refresh_token(mut self, issue: bool) -> Self {
        self.issue_refresh_token = issue;
        self
    }

    #[must_use]
    pub fn refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn verification_link_base(mut self, url: impl Into<String>) -> Self {
        self.verification_link_base = url.into();
        self
    }

    #[must_use]
    pub fn reset_link_base(mut self, url: impl Into<String>) -> Self {
        self.reset_link_base = url.into();
        self
    }

    #[must_use]
    pub fn hash_version(mut self, version: HashVersion) -> Self {
        self.current_hash_version = version;
        self
    }

    #[must_use]
    pub fn hash_params(mut self, params: HashParams) -> Self {
        self.current_hash_params = params;
        self
    }

    /// Validate every value and produce the immutable configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        if self.signing_key.is_empty() {
            return Err(ConfigError::MissingSigningKey);
        }
        if self.signing_key.len() < MIN_SIGNING_KEY_LENGTH {
            return Err(ConfigError::SigningKeyTooShort(self.signing_key.len()));
        }
        if self.access_token_lifetime.is_zero() {
            return Err(ConfigError::ZeroLifetime("access token lifetime"));
        }
        if self.issue_refresh_token && self.refresh_token_lifetime.is_zero() {
            return Err(ConfigError::ZeroLifetime("refresh token lifetime"));
        }

        self.current_hash_params.to_argon2()?;

        let verification_link_base =
            parse_link_base("verification link base", &self.verification_link_base)?;
        let reset_link_base = parse_link_base("reset link base", &self.reset_link_base)?;

        Ok(Config {
            signing_key: SecretSlice::from(self.signing_key),
            algorithm: self.algorithm,
            issuer: self.issuer,
            access_token_lifetime: self.access_token_lifetime,
            issue_refresh_token: self.issue_refresh_token,
            refresh_token_lifetime: self.refresh_token_lifetime,
            verification_link_base,
            reset_link_base,
            current_hash_version: self.current_hash_version,
            current_hash_params: self.current_hash_params,
        })
    }
}

/// Links must be absolute, able to carry a query, and use HTTPS unless they
/// point at the local machine.
fn parse_link_base(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason| ConfigError::InvalidLinkBase {
        name,
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|_| invalid("not an absolute URL"))?;

    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a query"));
    }

    let is_https = url.scheme() == "https";
    let is_local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
    if !is_https && !(is_local && url.scheme() == "http") {
        return Err(invalid("must use HTTPS for non-localhost hosts"));
    }

    Ok(url)
}
