// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use base64::Engine as _;
use cilo_core::FakeClock;
use ssh_key::{Algorithm, HashAlg, LineEnding, PrivateKey};

struct Fixture {
    auth: AuthState<FakeClock>,
    clock: FakeClock,
    key: PrivateKey,
    public_key: String,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let key = PrivateKey::random(&mut ssh_key::rand_core::OsRng, Algorithm::Ed25519).unwrap();
    let public_key = key.public_key().to_openssh().unwrap();
    let authorized = dir.path().join("authorized_keys");
    std::fs::write(&authorized, format!("# cilo test keys\n{public_key}\n")).unwrap();
    let clock = FakeClock::new();
    Fixture {
        auth: AuthState::new(authorized, clock.clone()),
        clock,
        key,
        public_key,
        _dir: dir,
    }
}

fn sign(key: &PrivateKey, challenge: &str) -> String {
    let nonce = base64::engine::general_purpose::STANDARD.decode(challenge).unwrap();
    key.sign(SSH_SIG_NAMESPACE, HashAlg::Sha256, &nonce)
        .unwrap()
        .to_pem(LineEnding::LF)
        .unwrap()
}

#[test]
fn full_challenge_response_issues_a_session() {
    let f = fixture();
    let (challenge, expires_at) = f.auth.challenge(&f.public_key);
    assert!(expires_at > f.clock.now());

    let signature = sign(&f.key, &challenge);
    let session = f.auth.connect(&f.public_key, &challenge, &signature, "sshsig").unwrap();

    assert!(f.auth.validate(&session.token));
    assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
}

#[test]
fn unauthorized_key_is_rejected_even_with_valid_signature() {
    let f = fixture();
    let stranger = PrivateKey::random(&mut ssh_key::rand_core::OsRng, Algorithm::Ed25519).unwrap();
    let stranger_pub = stranger.public_key().to_openssh().unwrap();

    let (challenge, _) = f.auth.challenge(&stranger_pub);
    let signature = sign(&stranger, &challenge);
    let err = f.auth.connect(&stranger_pub, &challenge, &signature, "sshsig").unwrap_err();
    assert!(matches!(err, AgentError::Auth));
}

#[test]
fn signature_by_a_different_key_fails() {
    let f = fixture();
    let other = PrivateKey::random(&mut ssh_key::rand_core::OsRng, Algorithm::Ed25519).unwrap();
    let (challenge, _) = f.auth.challenge(&f.public_key);
    let forged = sign(&other, &challenge);
    let err = f.auth.connect(&f.public_key, &challenge, &forged, "sshsig").unwrap_err();
    assert!(matches!(err, AgentError::Auth));
}

#[test]
fn challenges_are_single_use() {
    let f = fixture();
    let (challenge, _) = f.auth.challenge(&f.public_key);
    let signature = sign(&f.key, &challenge);
    f.auth.connect(&f.public_key, &challenge, &signature, "sshsig").unwrap();
    let err = f.auth.connect(&f.public_key, &challenge, &signature, "sshsig").unwrap_err();
    assert!(matches!(err, AgentError::Auth));
}

#[test]
fn expired_challenges_are_rejected() {
    let f = fixture();
    let (challenge, _) = f.auth.challenge(&f.public_key);
    let signature = sign(&f.key, &challenge);
    f.clock.advance(std::time::Duration::from_secs(6 * 60));
    let err = f.auth.connect(&f.public_key, &challenge, &signature, "sshsig").unwrap_err();
    assert!(matches!(err, AgentError::Auth));
}

#[test]
fn challenge_is_bound_to_the_requesting_key() {
    let f = fixture();
    let other = PrivateKey::random(&mut ssh_key::rand_core::OsRng, Algorithm::Ed25519).unwrap();
    let other_pub = other.public_key().to_openssh().unwrap();

    // Nonce issued for one key, presented with another
    let (challenge, _) = f.auth.challenge(&other_pub);
    let signature = sign(&f.key, &challenge);
    let err = f.auth.connect(&f.public_key, &challenge, &signature, "sshsig").unwrap_err();
    assert!(matches!(err, AgentError::Auth));
}

#[test]
fn unknown_signature_format_is_a_validation_error() {
    let f = fixture();
    let (challenge, _) = f.auth.challenge(&f.public_key);
    let err = f.auth.connect(&f.public_key, &challenge, "sig", "pgp").unwrap_err();
    assert!(matches!(err, AgentError::Validation(_)));
}

#[test]
fn sessions_expire_and_disconnect_revokes() {
    let f = fixture();
    let (challenge, _) = f.auth.challenge(&f.public_key);
    let signature = sign(&f.key, &challenge);
    let session = f.auth.connect(&f.public_key, &challenge, &signature, "sshsig").unwrap();

    assert!(f.auth.validate(&session.token));
    assert!(f.auth.disconnect(&session.token));
    assert!(!f.auth.validate(&session.token));

    let (challenge, _) = f.auth.challenge(&f.public_key);
    let signature = sign(&f.key, &challenge);
    let session = f.auth.connect(&f.public_key, &challenge, &signature, "sshsig").unwrap();
    f.clock.advance(std::time::Duration::from_secs(25 * 3600));
    assert!(!f.auth.validate(&session.token));
}
