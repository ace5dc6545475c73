//! Tests for password verification outcome classification.

mod common;

use common::{FAST_PARAMS, identity_from, test_config, test_identity};
use warden::password::{
    HashParams, HashVersion, PasswordHasher, PasswordVerifier, VerificationOutcome,
};

const PASSWORDS: &[&str] = &[
    "hunter2",
    "correct horse battery staple",
    "pässwörd with ünïcode",
    " leading and trailing spaces ",
    "x",
];

#[test]
fn test_current_params_verify_success() {
    let identity = test_identity();

    for password in PASSWORDS {
        let stored = identity.passwords().hash(password).unwrap();
        assert_eq!(
            identity.verify_password(password, &stored),
            VerificationOutcome::Success,
            "password {:?}",
            password
        );
    }
}

#[test]
fn test_wrong_password_fails() {
    let identity = test_identity();
    let stored = identity.passwords().hash("hunter2").unwrap();

    for attempt in ["hunter3", "Hunter2", "hunter2 ", ""] {
        assert_eq!(
            identity.verify_password(attempt, &stored),
            VerificationOutcome::Fail
        );
    }
}

#[test]
fn test_deprecated_params_need_rehash() {
    let identity = test_identity();
    let deprecated = PasswordHasher::with_params(
        HashVersion::V1,
        HashParams {
            memory_kib: 32,
            iterations: 1,
            parallelism: 1,
        },
    );

    let stored = deprecated.hash("hunter2").unwrap();
    assert_eq!(
        identity.verify_password("hunter2", &stored),
        VerificationOutcome::SuccessRehashNeeded
    );
    assert_eq!(
        identity.verify_password("hunter3", &stored),
        VerificationOutcome::Fail
    );
}

#[test]
fn test_legacy_version_needs_rehash() {
    let identity = test_identity();
    let legacy = PasswordHasher::with_params(HashVersion::V0, FAST_PARAMS);

    let stored = legacy.hash("hunter2").unwrap();
    assert_eq!(stored[0], 0x00);
    assert_eq!(stored.len(), 1 + 16 + 32);

    assert_eq!(
        identity.verify_password("hunter2", &stored),
        VerificationOutcome::SuccessRehashNeeded
    );
    assert_eq!(
        legacy.verify("hunter2", &stored),
        VerificationOutcome::Success
    );
}

#[test]
fn test_legacy_compat_mode() {
    let compat = identity_from(test_config().hash_version(HashVersion::V0));

    let stored = compat.passwords().hash("hunter2").unwrap();
    assert_eq!(stored[0], 0x00);
    assert_eq!(
        compat.verify_password("hunter2", &stored),
        VerificationOutcome::Success
    );

    // A newer-layout hash is still accepted but flagged
    let current = test_identity().passwords().hash("hunter2").unwrap();
    assert_eq!(
        compat.verify_password("hunter2", &current),
        VerificationOutcome::SuccessRehashNeeded
    );
}

#[test]
fn test_unknown_version_regardless_of_password() {
    let identity = test_identity();
    let mut stored = identity.passwords().hash("hunter2").unwrap();

    for tag in [0x02u8, 0x03, 0x7f, 0xff] {
        stored[0] = tag;
        for password in ["hunter2", "wrong", ""] {
            assert_eq!(
                identity.verify_password(password, &stored),
                VerificationOutcome::VersionNotFound
            );
        }
    }

    assert_eq!(
        identity.verify_password("hunter2", &[]),
        VerificationOutcome::VersionNotFound
    );
}

#[test]
fn test_truncated_or_extended_payload() {
    let identity = test_identity();

    for version in [HashVersion::V0, HashVersion::V1] {
        let hasher = PasswordHasher::with_params(version, FAST_PARAMS);
        let stored = hasher.hash("hunter2").unwrap();

        let truncated = &stored[..stored.len() - 1];
        assert_eq!(
            identity.verify_password("hunter2", truncated),
            VerificationOutcome::LengthMismatch
        );

        let mut extended = stored.clone();
        extended.push(0);
        assert_eq!(
            identity.verify_password("hunter2", &extended),
            VerificationOutcome::LengthMismatch
        );

        // Tag only
        assert_eq!(
            identity.verify_password("hunter2", &stored[..1]),
            VerificationOutcome::LengthMismatch
        );
    }
}

#[test]
fn test_corrupted_output_fails() {
    let identity = test_identity();
    let mut stored = identity.passwords().hash("hunter2").unwrap();

    let last = stored.len() - 1;
    stored[last] ^= 0x01;
    assert_eq!(
        identity.verify_password("hunter2", &stored),
        VerificationOutcome::Fail
    );
}

#[test]
fn test_only_success_variants_authorize() {
    let all = [
        VerificationOutcome::Fail,
        VerificationOutcome::VersionNotFound,
        VerificationOutcome::LengthMismatch,
        VerificationOutcome::Success,
        VerificationOutcome::SuccessRehashNeeded,
    ];

    let authorized: Vec<_> = all.into_iter().filter(|o| o.is_success()).collect();
    assert_eq!(
        authorized,
        vec![
            VerificationOutcome::Success,
            VerificationOutcome::SuccessRehashNeeded
        ]
    );
}
