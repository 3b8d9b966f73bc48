// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn issued_sessions_are_unique_hex_tokens() {
    let now = Utc::now();
    let a = Session::issue("ssh-ed25519 AAAA", now);
    let b = Session::issue("ssh-ed25519 AAAA", now);
    assert_ne!(a.token, b.token);
    assert_eq!(a.token.len(), 64);
    assert!(a.token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn sessions_expire_after_24h() {
    let now = Utc::now();
    let session = Session::issue("key", now);
    assert!(!session.is_expired(now));
    assert!(!session.is_expired(now + Duration::hours(23)));
    assert!(session.is_expired(now + Duration::hours(24)));
}
