pub mod claims;
pub mod cli;
pub mod config;
pub mod email;
pub mod ids;
pub mod jwt;
pub mod password;

use std::sync::Arc;

use claims::Claim;
use config::Config;
use email::EmailTemplates;
use ids::{IdGenerator, TimeOrderedIds};
use jwt::{IssuedToken, TokenError, TokenIssuer};
use password::{PasswordError, PasswordHasher, PasswordVerifier, VerificationOutcome};
use thiserror::Error;
use tracing::{info, warn};

/// The identity core: every component built from one configuration.
///
/// All components are read-only after construction, so an `Identity` can be
/// shared across threads behind an `Arc` without locking.
pub struct Identity {
    config: Arc<Config>,
    tokens: TokenIssuer,
    passwords: PasswordHasher,
    templates: EmailTemplates,
    ids: Arc<dyn IdGenerator>,
}

/// Outcome of a password login.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Password accepted and a session issued. `rehashed` holds a new stored
    /// hash when the old one used outdated parameters.
    Issued {
        token: IssuedToken,
        rehashed: Option<Vec<u8>>,
    },
    /// Password rejected. Callers must not reveal which variant occurred.
    Rejected(VerificationOutcome),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl Identity {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            tokens: TokenIssuer::new(&config),
            passwords: PasswordHasher::new(&config),
            templates: EmailTemplates::new(&config),
            ids: Arc::new(TimeOrderedIds),
            config,
        }
    }

    /// Replace the default time-ordered id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    pub fn templates(&self) -> &EmailTemplates {
        &self.templates
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    pub fn verify_password(&self, password: &str, stored_hash: &[u8]) -> VerificationOutcome {
        self.passwords.verify(password, stored_hash)
    }

    /// Verify a password and, on success, issue a session for `claims`.
    pub fn login(
        &self,
        password: &str,
        stored_hash: &[u8],
        claims: &[Claim],
    ) -> Result<LoginOutcome, IdentityError> {
        let outcome = self.verify_password(password, stored_hash);

        match outcome {
            VerificationOutcome::Success | VerificationOutcome::SuccessRehashNeeded => {}
            VerificationOutcome::Fail => {
                info!(outcome = %outcome, "Password rejected");
                return Ok(LoginOutcome::Rejected(outcome));
            }
            VerificationOutcome::VersionNotFound | VerificationOutcome::LengthMismatch => {
                warn!(outcome = %outcome, "Stored password hash is malformed");
                return Ok(LoginOutcome::Rejected(outcome));
            }
        }

        let rehashed = if outcome.needs_rehash() {
            info!("Rehashing password with current parameters");
            Some(self.passwords.hash(password)?)
        } else {
            None
        };

        let token = self.tokens.issue(Some(claims))?;
        Ok(LoginOutcome::Issued { token, rehashed })
    }
}
