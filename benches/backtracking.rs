// SPDX-License-Identifier: MPL-2.0

//! This bench monitors the performance of backtracking and term intersection.
//!
//! Dependencies are constructed in a way that all versions need to be tested before finding a solution.

use criterion::*;
use version_solver::OfflineDependencyProvider;
use version_range::Ranges;

/// Each version of each package depends on a single version of the next
/// package, and only the lowest chain of versions works out: a long walk of
/// decisions, conflicts and backjumps. Sibling dependency clauses never
/// merge here since each version points at a different singleton.
fn backtracking_singletons(c: &mut Criterion, package_count: u32, version_count: u32) {
    let mut dependency_provider = OfflineDependencyProvider::<u32, Ranges<u32>>::new();

    dependency_provider.add_dependencies(0u32, 0u32, [(1u32, Ranges::full())]);
    dependency_provider.add_dependencies(1u32, 0u32, []);

    for n in 1..package_count {
        for v in 1..version_count {
            dependency_provider.add_dependencies(n, v, [(n + 1, Ranges::singleton(v))]);
        }
    }

    c.bench_function("backtracking_singletons", |b| {
        b.iter(|| {
            let _ = version_solver::resolve(&dependency_provider, 0u32, 0u32);
        })
    });
}

/// Same walk, but each version requires a range of the next package, so the
/// sibling dependency clauses collapse through merging and the clause
/// database stays small while the solver steps down through versions.
fn backtracking_ranges(c: &mut Criterion, package_count: u32, version_count: u32) {
    let mut dependency_provider = OfflineDependencyProvider::<u32, Ranges<u32>>::new();

    dependency_provider.add_dependencies(0u32, 0u32, [(1u32, Ranges::full())]);
    dependency_provider.add_dependencies(1u32, 0u32, []);

    for n in 1..package_count {
        for v in 1..version_count {
            let r = Ranges::higher_than(version_count - v);
            dependency_provider.add_dependencies(n, v, [(n + 1, r)]);
        }
    }

    c.bench_function("backtracking_ranges", |b| {
        b.iter(|| {
            let _ = version_solver::resolve(&dependency_provider, 0u32, 0u32);
        })
    });
}

fn bench_group(c: &mut Criterion) {
    backtracking_singletons(c, 100, 500);
    backtracking_ranges(c, 5, 200);
}

criterion_group!(benches, bench_group);
criterion_main!(benches);
