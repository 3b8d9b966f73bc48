// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample() -> CloudAuth {
    CloudAuth {
        server: "https://cilo.example.com".to_string(),
        api_key: "cilo_secret".to_string(),
        team_id: Some("team-1".to_string()),
    }
}

#[test]
fn save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join(".cilo");
    save(&home, &sample()).unwrap();
    let loaded = load(&home).unwrap();
    assert_eq!(loaded.server, "https://cilo.example.com");
    assert_eq!(loaded.api_key, "cilo_secret");
    assert_eq!(loaded.team_id.as_deref(), Some("team-1"));
}

#[test]
fn missing_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(load(dir.path()), Err(AuthStoreError::Missing)));
}

#[test]
fn incomplete_file_is_treated_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join(".cilo");
    save(&home, &CloudAuth { server: String::new(), api_key: "k".into(), team_id: None })
        .unwrap();
    assert!(matches!(load(&home), Err(AuthStoreError::Missing)));

    save(&home, &CloudAuth { server: "s".into(), api_key: String::new(), team_id: None })
        .unwrap();
    assert!(matches!(load(&home), Err(AuthStoreError::Missing)));
}

#[test]
fn garbage_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join(".cilo");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::write(home.join("cloud-auth.json"), "not json").unwrap();
    assert!(matches!(load(&home), Err(AuthStoreError::Corrupt(_))));
}

#[test]
fn clear_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join(".cilo");
    save(&home, &sample()).unwrap();
    clear(&home).unwrap();
    clear(&home).unwrap();
    assert!(matches!(load(&home), Err(AuthStoreError::Missing)));
}

#[cfg(unix)]
#[test]
fn permissions_are_private() {
    use std::os::unix::fs::PermissionsExt;
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join(".cilo");
    save(&home, &sample()).unwrap();

    let dir_mode = std::fs::metadata(&home).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700);
    let file_mode =
        std::fs::metadata(home.join("cloud-auth.json")).unwrap().permissions().mode();
    assert_eq!(file_mode & 0o777, 0o600);
}
