// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "dev" },
    mixed_case = { "Dev-Env_2" },
    digits = { "123" },
    underscore = { "_" },
    hyphen = { "-" },
)]
fn accepts_valid_names(name: &str) {
    assert_eq!(validate_name(name), Ok(()));
}

#[parameterized(
    dot = { "my.env", '.' },
    slash = { "a/b", '/' },
    space = { "my env", ' ' },
    unicode = { "dév", 'é' },
    shell_meta = { "env;rm", ';' },
)]
fn rejects_invalid_characters(name: &str, bad: char) {
    assert_eq!(
        validate_name(name),
        Err(NameError::InvalidChar(name.to_string(), bad))
    );
}

#[test]
fn rejects_empty() {
    assert_eq!(validate_name(""), Err(NameError::Empty));
}

#[test]
fn rejects_overlong() {
    let name = "a".repeat(NAME_MAX_LEN + 1);
    assert_eq!(validate_name(&name), Err(NameError::TooLong(name.clone())));
}

#[test]
fn accepts_max_length() {
    let name = "a".repeat(NAME_MAX_LEN);
    assert_eq!(validate_name(&name), Ok(()));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn valid_alphabet_always_accepted(name in "[A-Za-z0-9_-]{1,48}") {
            prop_assert_eq!(validate_name(&name), Ok(()));
        }

        #[test]
        fn accepted_names_never_contain_shell_or_path_meta(name in ".{1,64}") {
            if validate_name(&name).is_ok() {
                for c in ['/', '.', ';', '$', '`', ' ', '\n'] {
                    prop_assert!(!name.contains(c));
                }
            }
        }
    }
}
