// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn specs() -> Vec<RuleSpec> {
    rule_specs("cilo0", "10.100.0.0/24".parse().unwrap())
}

#[test]
fn rule_set_covers_overlay_nat_and_return_path() {
    let specs = specs();
    assert_eq!(specs.len(), 5);

    // Overlay in/out
    assert!(specs.iter().any(|r| r.chain == "INPUT" && r.args.contains(&"cilo0".to_string())));
    assert!(specs.iter().any(|r| r.chain == "FORWARD" && r.args[0] == "-i"));
    assert!(specs.iter().any(|r| r.chain == "FORWARD" && r.args[0] == "-o"));

    // NAT from the peer subnet
    let nat = specs.iter().find(|r| r.table == Some("nat")).unwrap();
    assert_eq!(nat.chain, "POSTROUTING");
    assert!(nat.args.contains(&"10.100.0.0/24".to_string()));
    assert!(nat.args.contains(&"MASQUERADE".to_string()));

    // Established/related accept
    assert!(specs
        .iter()
        .any(|r| r.args.contains(&"ESTABLISHED,RELATED".to_string())));
}

#[test]
fn check_and_add_args_differ_only_in_action() {
    for rule in specs() {
        let check = rule.cli_args("-C");
        let add = rule.cli_args("-A");
        assert_eq!(check.len(), add.len());
        let diffs: Vec<_> =
            check.iter().zip(add.iter()).filter(|(c, a)| c != a).collect();
        assert_eq!(diffs, vec![(&"-C".to_string(), &"-A".to_string())]);
    }
}

#[test]
fn nat_rules_carry_the_table_flag_first() {
    let nat = specs().into_iter().find(|r| r.table == Some("nat")).unwrap();
    let args = nat.cli_args("-A");
    assert_eq!(&args[..4], &["-t", "nat", "-A", "POSTROUTING"]);
}
