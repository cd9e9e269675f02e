//! Property tests: every registered parser is a total function. Arbitrary
//! input may produce issues or a typed error, never a panic.

use std::path::Path;

use proptest::prelude::*;

use super::*;

const ALL_IDS: &[&str] = &[
    "ruff",
    "mypy",
    "bandit",
    "semgrep",
    "pip-audit",
    "gitleaks",
    "complexipy",
    "refurb",
    "skylos",
    "creosote",
    "pytest",
    "text",
];

proptest! {
    #[test]
    fn parsers_total_on_arbitrary_text(
        input in ".*",
        exit_code in proptest::option::of(-1i32..4),
    ) {
        let registry = ParserRegistry::builtin();
        for id in ALL_IDS {
            let parser = registry.get(id).unwrap();
            let raw = RawOutput {
                tool: id,
                stdout: &input,
                stderr: &input,
                exit_code,
                workspace_root: Path::new("/quench-proptest-no-such-dir"),
            };
            // Ok or Err are both acceptable; panicking is not.
            let _ = parser.parse(&raw);
        }
    }

    #[test]
    fn parsers_total_on_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let text = String::from_utf8_lossy(&bytes);
        let registry = ParserRegistry::builtin();
        for id in ALL_IDS {
            let parser = registry.get(id).unwrap();
            let raw = RawOutput {
                tool: id,
                stdout: &text,
                stderr: "",
                exit_code: Some(1),
                workspace_root: Path::new("/quench-proptest-no-such-dir"),
            };
            let _ = parser.parse(&raw);
        }
    }

    #[test]
    fn parse_twice_yields_identical_ids(input in ".*") {
        let registry = ParserRegistry::builtin();
        for id in ["ruff", "mypy", "pytest", "refurb", "skylos", "creosote", "text"] {
            let parser = registry.get(id).unwrap();
            let raw = RawOutput {
                tool: id,
                stdout: &input,
                stderr: "",
                exit_code: Some(1),
                workspace_root: Path::new("/w"),
            };
            let first = parser.parse(&raw);
            let second = parser.parse(&raw);
            match (first, second) {
                (Ok(a), Ok(b)) => {
                    let a_ids: Vec<_> = a.iter().map(|i| i.id.clone()).collect();
                    let b_ids: Vec<_> = b.iter().map(|i| i.id.clone()).collect();
                    prop_assert_eq!(a_ids, b_ids);
                }
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "parser '{}' not deterministic", id),
            }
        }
    }
}
