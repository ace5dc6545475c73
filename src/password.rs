//! Password hashing and verification outcome classification.
//!
//! A stored hash is a byte string whose first byte is a version tag:
//!
//! - `0x00` (legacy): `salt[16] || argon2id[32]`, fixed parameters
//!   m=4096 KiB, t=3, p=1.
//! - `0x01`: `m_cost u32 BE || t_cost u32 BE || p_cost u32 BE || salt[16] || argon2id[32]`.
//!
//! Verification reports one of five [`VerificationOutcome`]s so callers can
//! tell a plain mismatch apart from malformed input and can rehash on login
//! when a hash was produced with outdated parameters.

use std::fmt;

use argon2::password_hash::Output;
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;

pub const SALT_LENGTH: usize = 16;
pub const OUTPUT_LENGTH: usize = 32;

/// Size of the encoded m/t/p parameter block in version 1 hashes.
const PARAMS_LENGTH: usize = 12;

/// Layout version of a stored password hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashVersion {
    /// Fixed legacy parameters, not stored in the hash
    V0,
    /// Parameters stored alongside the salt
    V1,
}

impl HashVersion {
    pub fn tag(self) -> u8 {
        match self {
            HashVersion::V0 => 0x00,
            HashVersion::V1 => 0x01,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(HashVersion::V0),
            0x01 => Some(HashVersion::V1),
            _ => None,
        }
    }

    /// Bytes that must follow the tag for this version.
    pub fn payload_len(self) -> usize {
        match self {
            HashVersion::V0 => SALT_LENGTH + OUTPUT_LENGTH,
            HashVersion::V1 => PARAMS_LENGTH + SALT_LENGTH + OUTPUT_LENGTH,
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl HashParams {
    /// Parameters implied by version 0 hashes.
    pub const LEGACY: HashParams = HashParams {
        memory_kib: 4096,
        iterations: 3,
        parallelism: 1,
    };

    /// Upper bound on costs read from a stored hash, independent of the
    /// configured parameters.
    pub const MAX_STORED: HashParams = HashParams {
        memory_kib: 1024 * 1024,
        iterations: 16,
        parallelism: 16,
    };

    /// Whether any cost exceeds the matching cost in `ceiling`.
    pub fn exceeds(&self, ceiling: &HashParams) -> bool {
        self.memory_kib > ceiling.memory_kib
            || self.iterations > ceiling.iterations
            || self.parallelism > ceiling.parallelism
    }

    /// Per-cost maximum of `self` and `other`.
    fn max_each(&self, other: &HashParams) -> HashParams {
        HashParams {
            memory_kib: self.memory_kib.max(other.memory_kib),
            iterations: self.iterations.max(other.iterations),
            parallelism: self.parallelism.max(other.parallelism),
        }
    }

    pub fn to_argon2(&self) -> Result<Params, argon2::Error> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(OUTPUT_LENGTH),
        )
    }
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Result of checking a password against a stored hash.
///
/// Only [`Success`](Self::Success) and
/// [`SuccessRehashNeeded`](Self::SuccessRehashNeeded) authorize a session.
/// `VersionNotFound` and `LengthMismatch` must be reported to end users as an
/// ordinary failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum VerificationOutcome {
    /// The password does not match
    Fail,
    /// The stored hash has an unknown version tag
    VersionNotFound,
    /// The stored hash has the wrong length for its version
    LengthMismatch,
    /// The password matches
    Success,
    /// The password matches but the hash uses outdated parameters
    SuccessRehashNeeded,
}

impl VerificationOutcome {
    pub fn is_success(self) -> bool {
        matches!(
            self,
            VerificationOutcome::Success | VerificationOutcome::SuccessRehashNeeded
        )
    }

    pub fn needs_rehash(self) -> bool {
        self == VerificationOutcome::SuccessRehashNeeded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerificationOutcome::Fail => "fail",
            VerificationOutcome::VersionNotFound => "version_not_found",
            VerificationOutcome::LengthMismatch => "length_mismatch",
            VerificationOutcome::Success => "success",
            VerificationOutcome::SuccessRehashNeeded => "success_rehash_needed",
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(#[from] argon2::Error),
}

/// Classifies a password check against a stored hash.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, password: &str, stored: &[u8]) -> VerificationOutcome;
}

/// Argon2id hasher producing and verifying the versioned layout.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    version: HashVersion,
    params: HashParams,
}

impl PasswordHasher {
    pub fn new(config: &Config) -> Self {
        Self::with_params(config.current_hash_version, config.current_hash_params)
    }

    /// Hasher writing `version`; `params` only apply to version 1.
    pub fn with_params(version: HashVersion, params: HashParams) -> Self {
        Self { version, params }
    }

    pub fn version(&self) -> HashVersion {
        self.version
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<Vec<u8>, PasswordError> {
        let mut salt = [0u8; SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);

        let params = match self.version {
            HashVersion::V0 => HashParams::LEGACY,
            HashVersion::V1 => self.params,
        };
        let output = derive(password.as_bytes(), &salt, &params)?;

        let mut stored = Vec::with_capacity(1 + self.version.payload_len());
        stored.push(self.version.tag());
        if self.version == HashVersion::V1 {
            stored.extend_from_slice(&params.memory_kib.to_be_bytes());
            stored.extend_from_slice(&params.iterations.to_be_bytes());
            stored.extend_from_slice(&params.parallelism.to_be_bytes());
        }
        stored.extend_from_slice(&salt);
        stored.extend_from_slice(&output);
        Ok(stored)
    }
}

impl PasswordVerifier for PasswordHasher {
    fn verify(&self, password: &str, stored: &[u8]) -> VerificationOutcome {
        let Some((&tag, payload)) = stored.split_first() else {
            warn!("Stored password hash is empty");
            return VerificationOutcome::VersionNotFound;
        };

        let Some(version) = HashVersion::from_tag(tag) else {
            warn!(tag, "Unknown password hash version");
            return VerificationOutcome::VersionNotFound;
        };

        if payload.len() != version.payload_len() {
            warn!(
                tag,
                expected = version.payload_len(),
                actual = payload.len(),
                "Password hash payload has unexpected length"
            );
            return VerificationOutcome::LengthMismatch;
        }

        let (params, rest) = match version {
            HashVersion::V0 => (HashParams::LEGACY, payload),
            HashVersion::V1 => {
                let (header, rest) = payload.split_at(PARAMS_LENGTH);
                let params = HashParams {
                    memory_kib: read_u32(&header[0..4]),
                    iterations: read_u32(&header[4..8]),
                    parallelism: read_u32(&header[8..12]),
                };
                (params, rest)
            }
        };
        let (salt, expected) = rest.split_at(SALT_LENGTH);

        let ceiling = self.params.max_each(&HashParams::MAX_STORED);
        if params.exceeds(&ceiling) {
            warn!(
                memory_kib = params.memory_kib,
                iterations = params.iterations,
                parallelism = params.parallelism,
                "Stored password hash parameters exceed the allowed cost"
            );
            return VerificationOutcome::Fail;
        }

        let derived = match derive(password.as_bytes(), salt, &params) {
            Ok(derived) => derived,
            Err(e) => {
                warn!(error = %e, "Stored password hash has unusable parameters");
                return VerificationOutcome::Fail;
            }
        };

        if !outputs_match(&derived, expected) {
            return VerificationOutcome::Fail;
        }

        let current = version == self.version
            && (version == HashVersion::V0 || params == self.params);
        if current {
            VerificationOutcome::Success
        } else {
            VerificationOutcome::SuccessRehashNeeded
        }
    }
}

fn derive(
    password: &[u8],
    salt: &[u8],
    params: &HashParams,
) -> Result<[u8; OUTPUT_LENGTH], argon2::Error> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
    let mut output = [0u8; OUTPUT_LENGTH];
    argon2.hash_password_into(password, salt, &mut output)?;
    Ok(output)
}

/// Constant-time comparison via `Output`'s `PartialEq`.
fn outputs_match(derived: &[u8], expected: &[u8]) -> bool {
    match (Output::new(derived), Output::new(expected)) {
        (Ok(derived), Ok(expected)) => derived == expected,
        _ => false,
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}
