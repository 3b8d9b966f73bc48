// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn dropin_delegates_the_suffix_to_loopback() {
    let content = resolved_dropin("test", 5354);
    assert!(content.contains("[Resolve]"));
    assert!(content.contains("DNS=127.0.0.1:5354"));
    assert!(content.contains("Domains=~test"));
}

#[test]
fn resolver_dir_file_names_port_and_loopback() {
    let content = resolver_dir_file(5354);
    assert_eq!(content, "nameserver 127.0.0.1\nport 5354\n");
}

#[test]
fn integration_paths_per_host_class() {
    assert_eq!(
        integration_path(HostClass::SystemdResolved, "test"),
        PathBuf::from("/etc/systemd/resolved.conf.d/cilo.conf")
    );
    assert_eq!(
        integration_path(HostClass::ResolverDir, "test"),
        PathBuf::from("/etc/resolver/test")
    );
}
