// SPDX-License-Identifier: MPL-2.0

//! A tiny text format for dependency graphs used as test fixtures.
//!
//! One line per `(package, version)` pair:
//!
//! ```text
//! # comment
//! name version dep:singleton:V dep:range:LO:HI ...
//! ```
//!
//! Blank lines and `#` comments are skipped. The version of the line whose
//! package is named `root` becomes the root version of the run.

use version_solver::{resolve, resolve_naive, OfflineDependencyProvider, Ranges, ResolveError};

type NumVS = Ranges<u32>;
type TestProvider = OfflineDependencyProvider<String, NumVS>;

fn parse_constraint(spec: &str) -> NumVS {
    let mut parts = spec.split(':');
    let kind = parts.next().expect("missing constraint kind");
    match kind {
        "singleton" => {
            let v: u32 = parts
                .next()
                .expect("singleton needs a version")
                .parse()
                .expect("singleton version must be an integer");
            Ranges::singleton(v)
        }
        "range" => {
            let lo: u32 = parts
                .next()
                .expect("range needs a lower bound")
                .parse()
                .expect("range bounds must be integers");
            let hi: u32 = parts
                .next()
                .expect("range needs an upper bound")
                .parse()
                .expect("range bounds must be integers");
            Ranges::between(lo, hi)
        }
        other => panic!("unknown constraint kind: {other}"),
    }
}

fn load_dependencies(input: &str) -> (TestProvider, u32) {
    let mut provider = TestProvider::new();
    let mut root_version = 0u32;
    for (line_number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let package = fields
            .next()
            .unwrap_or_else(|| panic!("line {}: missing package", line_number + 1));
        let version: u32 = fields
            .next()
            .unwrap_or_else(|| panic!("line {}: missing version", line_number + 1))
            .parse()
            .unwrap_or_else(|_| panic!("line {}: version must be an integer", line_number + 1));
        if package == "root" {
            root_version = version;
        }
        let deps = fields.map(|spec| {
            let (name, constraint) = spec
                .split_once(':')
                .unwrap_or_else(|| panic!("line {}: invalid dep spec {spec}", line_number + 1));
            (name.to_string(), parse_constraint(constraint))
        });
        provider.add_dependencies(package.to_string(), version, deps);
    }
    (provider, root_version)
}

#[test]
fn loads_packages_versions_and_constraints() {
    let (provider, root_version) = load_dependencies(
        "\
# a comment, then a blank line

root 1 foo:range:10:20 bar:range:10:20
foo 11 bar:range:20:30
foo 10
bar 10
bar 11
bar 20
",
    );
    assert_eq!(root_version, 1);
    let mut packages: Vec<_> = provider.packages().cloned().collect();
    packages.sort();
    assert_eq!(packages, ["bar", "foo", "root"]);
    let bar_versions: Vec<u32> = provider
        .versions(&"bar".to_string())
        .unwrap()
        .copied()
        .collect();
    assert_eq!(bar_versions, [10, 11, 20]);
}

#[test]
fn both_solvers_agree_on_a_loaded_graph() {
    let (provider, root_version) = load_dependencies(
        "\
root 1 foo:range:10:20 bar:range:10:20
foo 11 bar:range:20:30
foo 10
bar 10
bar 11
bar 20
",
    );
    let cdcl = resolve(&provider, "root".to_string(), root_version).unwrap();
    let naive = resolve_naive(&provider, "root".to_string(), root_version).unwrap();
    assert_eq!(cdcl, naive);
    assert_eq!(cdcl[&"foo".to_string()], 10);
    assert_eq!(cdcl[&"bar".to_string()], 11);
}

#[test]
fn singleton_constraints_pin_versions() {
    let (provider, root_version) = load_dependencies(
        "\
root 3 lib:singleton:2
lib 1
lib 2
lib 3
",
    );
    let solution = resolve(&provider, "root".to_string(), root_version).unwrap();
    assert_eq!(solution[&"lib".to_string()], 2);
}

#[test]
fn unsatisfiable_graphs_fail_in_both_solvers() {
    let (provider, root_version) = load_dependencies(
        "\
root 1 foo:singleton:1 bar:singleton:1
foo 1 shared:range:1:2
bar 1 shared:range:2:3
shared 1
shared 2
",
    );
    assert!(matches!(
        resolve(&provider, "root".to_string(), root_version),
        Err(ResolveError::NoSolution(_))
    ));
    assert!(matches!(
        resolve_naive(&provider, "root".to_string(), root_version),
        Err(ResolveError::NoSolution(_))
    ));
}
