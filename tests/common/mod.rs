#![allow(dead_code)]

use std::sync::Arc;

use warden::Identity;
use warden::config::{Config, ConfigBuilder};
use warden::password::HashParams;

pub const TEST_SIGNING_KEY: &[u8] = b"integration-test-signing-key-0123456789";

/// Cheap Argon2 parameters so hashing tests stay fast.
pub const FAST_PARAMS: HashParams = HashParams {
    memory_kib: 64,
    iterations: 1,
    parallelism: 1,
};

pub const VERIFICATION_BASE: &str = "https://app.example.com/account/verify";
pub const RESET_BASE: &str = "https://app.example.com/account/reset";

/// Builder preloaded with test key, fast hashing and example.com link bases.
pub fn test_config() -> ConfigBuilder {
    Config::builder(TEST_SIGNING_KEY)
        .hash_params(FAST_PARAMS)
        .verification_link_base(VERIFICATION_BASE)
        .reset_link_base(RESET_BASE)
}

pub fn test_identity() -> Identity {
    identity_from(test_config())
}

pub fn identity_from(builder: ConfigBuilder) -> Identity {
    Identity::new(Arc::new(builder.build().expect("Invalid test config")))
}
