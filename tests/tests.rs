// SPDX-License-Identifier: MPL-2.0

//! Regression tests for determinism, dead ends and statistics plumbing.

use std::cmp::Reverse;

use version_solver::{
    resolve, Dependencies, DependencyProvider, OfflineDependencyProvider, Package,
    PackageResolutionStatistics, Ranges, ResolveError, VersionSet,
};

type NumVS = Ranges<u32>;

/// Two independent resolver runs over the same provider must agree, here on
/// a graph where b 1 would pull in an old c but b 0 leaves c free.
#[test]
fn repeated_runs_return_the_same_solution() {
    let mut provider = OfflineDependencyProvider::<_, NumVS>::new();
    provider.add_dependencies("a", 0u32, [("b", Ranges::full()), ("c", Ranges::full())]);
    provider.add_dependencies("b", 0u32, []);
    provider.add_dependencies("b", 1u32, [("c", Ranges::between(0u32, 1u32))]);
    provider.add_dependencies("c", 0u32, []);
    provider.add_dependencies("c", 2u32, []);

    let reference = resolve(&provider, "a", 0u32).unwrap();
    for _ in 0..10 {
        assert_eq!(resolve(&provider, "a", 0u32).unwrap(), reference);
    }
}

/// A dependency on an empty version set can never be satisfied, directly or
/// through an intermediate package.
#[test]
fn empty_dependency_range_is_unsolvable() {
    let mut provider = OfflineDependencyProvider::<_, NumVS>::new();
    provider.add_dependencies("a", 0u32, [("b", Ranges::empty())]);
    assert!(matches!(
        resolve(&provider, "a", 0u32),
        Err(ResolveError::NoSolution(_))
    ));

    provider.add_dependencies("c", 0u32, [("a", Ranges::full())]);
    assert!(matches!(
        resolve(&provider, "c", 0u32),
        Err(ResolveError::NoSolution(_))
    ));
}

/// A version may depend on its own package: consistently (any version of
/// itself) or contradictorily (a different version of itself).
#[test]
fn self_dependencies() {
    let mut provider = OfflineDependencyProvider::<_, NumVS>::new();
    provider.add_dependencies("a", 0u32, [("a", Ranges::full())]);
    let solution = resolve(&provider, "a", 0u32).unwrap();
    assert_eq!(solution["a"], 0);

    provider.add_dependencies("a", 66u32, [("a", Ranges::singleton(111u32))]);
    assert!(matches!(
        resolve(&provider, "a", 66u32),
        Err(ResolveError::NoSolution(_))
    ));
}

/// Test that prioritization is deterministic: with a provider that never
/// differentiates priorities, ties fall back to package allocation order,
/// which only depends on the provider's data.
#[test]
fn same_result_with_flat_priorities() {
    struct UnprioritizingDependencyProvider<P: Package, VS: VersionSet> {
        dependency_provider: OfflineDependencyProvider<P, VS>,
    }

    impl<P: Package, VS: VersionSet> UnprioritizingDependencyProvider<P, VS> {
        fn new() -> Self {
            Self {
                dependency_provider: OfflineDependencyProvider::new(),
            }
        }

        fn add_dependencies<I: IntoIterator<Item = (P, VS)>>(
            &mut self,
            package: P,
            version: impl Into<VS::V>,
            dependencies: I,
        ) {
            self.dependency_provider
                .add_dependencies(package, version, dependencies);
        }
    }

    impl<P: Package, VS: VersionSet> DependencyProvider for UnprioritizingDependencyProvider<P, VS> {
        type P = P;
        type V = VS::V;
        type VS = VS;
        type M = String;
        type Priority = u32;

        fn choose_version(&self, package: &P, range: &VS) -> Option<VS::V> {
            self.dependency_provider.choose_version(package, range)
        }

        fn prioritize(
            &self,
            _package: &Self::P,
            _range: &Self::VS,
            _package_statistics: &PackageResolutionStatistics,
        ) -> Self::Priority {
            0
        }

        fn get_dependencies(&self, package: &P, version: &VS::V) -> Dependencies<P, VS, Self::M> {
            self.dependency_provider.get_dependencies(package, version)
        }
    }

    let mut dependency_provider = UnprioritizingDependencyProvider::<_, NumVS>::new();

    let package_count: u32 = 100;
    let x = (0..package_count)
        .map(|i| (i.to_string(), Ranges::full()))
        .collect::<Vec<_>>();
    dependency_provider.add_dependencies("root".to_string(), 1u32, x);

    // Version 2 of any package pins every other package to version 1, so
    // exactly one package ends up at version 2: the one decided first.
    for i in 0..package_count {
        let x = (0..package_count)
            .filter(|j| *j != i)
            .map(|i| (i.to_string(), Ranges::<u32>::singleton(1u32)))
            .collect::<Vec<_>>();
        dependency_provider.add_dependencies(i.to_string(), 2u32, x);
        dependency_provider.add_dependencies(i.to_string(), 1u32, []);
    }

    let name = "root".to_string();
    let ver: u32 = 1;
    let first = resolve(&dependency_provider, name.clone(), ver).unwrap();
    assert_eq!(
        first.values().filter(|v| **v == 2).count(),
        1,
        "exactly one package can be at version 2"
    );
    for _ in 0..3 {
        assert_eq!(
            resolve(&dependency_provider, name.clone(), ver).unwrap(),
            first
        );
    }
}

/// The conflict statistics passed to `prioritize` must stay at zero on a
/// conflict-free resolution and grow on a backtracking one.
#[test]
fn conflict_statistics_reach_prioritize() {
    use std::cell::Cell;

    struct CountingProvider {
        inner: OfflineDependencyProvider<&'static str, NumVS>,
        max_conflict_count: Cell<u32>,
    }

    impl DependencyProvider for CountingProvider {
        type P = &'static str;
        type V = u32;
        type VS = NumVS;
        type M = String;
        type Priority = (u32, Reverse<usize>);

        fn choose_version(&self, package: &Self::P, range: &Self::VS) -> Option<u32> {
            self.inner.choose_version(package, range)
        }

        fn prioritize(
            &self,
            package: &Self::P,
            range: &Self::VS,
            package_statistics: &PackageResolutionStatistics,
        ) -> Self::Priority {
            self.max_conflict_count.set(
                self.max_conflict_count
                    .get()
                    .max(package_statistics.conflict_count()),
            );
            self.inner.prioritize(package, range, package_statistics)
        }

        fn get_dependencies(
            &self,
            package: &Self::P,
            version: &Self::V,
        ) -> Dependencies<Self::P, Self::VS, Self::M> {
            self.inner.get_dependencies(package, version)
        }
    }

    // Conflict-free graph.
    let mut inner = OfflineDependencyProvider::new();
    inner.add_dependencies("root", 1u32, [("a", Ranges::full())]);
    inner.add_dependencies("a", 1u32, []);
    let provider = CountingProvider {
        inner,
        max_conflict_count: Cell::new(0),
    };
    resolve(&provider, "root", 1u32).unwrap();
    assert_eq!(provider.max_conflict_count.get(), 0);

    // Backtracking graph: all higher versions of a dead-end on b.
    let mut inner = OfflineDependencyProvider::new();
    inner.add_dependencies(
        "root",
        1u32,
        [("a", Ranges::full()), ("b", Ranges::singleton(1u32))],
    );
    for v in 1u32..5 {
        inner.add_dependencies("a", v, [("b", Ranges::singleton(2u32))]);
    }
    inner.add_dependencies("a", 0u32, []);
    inner.add_dependencies("b", 1u32, []);
    inner.add_dependencies("b", 2u32, []);
    let provider = CountingProvider {
        inner,
        max_conflict_count: Cell::new(0),
    };
    let solution = resolve(&provider, "root", 1u32).unwrap();
    assert_eq!(solution["a"], 0);
    assert!(provider.max_conflict_count.get() > 0);
}
