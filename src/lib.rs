// SPDX-License-Identifier: MPL-2.0

//! Conflict-driven version solving.
//!
//! Given a root package with a version, and a provider able to list the
//! available versions of every package together with their dependency
//! constraints, [resolve] computes a consistent assignment of one version
//! per package satisfying all transitive constraints, or proves that no such
//! assignment exists.
//!
//! The algorithm is a conflict-driven clause-learning search in the style of
//! [PubGrub](https://github.com/dart-lang/pub/blob/master/doc/solver.md):
//! constraints are represented as incompatibilities (clauses over signed
//! version ranges), consequences are derived by unit propagation, and every
//! conflict is resolved into a learned incompatibility before backjumping.
//! A much simpler chronological-backtracking resolver with the same
//! contract, [resolve_naive], is included as a reference to cross-check the
//! optimized one.
//!
//! ## API
//!
//! ```
//! use version_solver::{resolve, OfflineDependencyProvider, Ranges};
//!
//! type NumVS = Ranges<u32>;
//!
//! let mut dependency_provider = OfflineDependencyProvider::<&str, NumVS>::new();
//! dependency_provider.add_dependencies("root", 1u32, [("menu", Ranges::full())]);
//! dependency_provider.add_dependencies("menu", 2u32, []);
//!
//! let solution = resolve(&dependency_provider, "root", 1u32).unwrap();
//! assert_eq!(solution["root"], 1);
//! assert_eq!(solution["menu"], 2);
//! ```
//!
//! The holder of all dependency information is the [DependencyProvider]:
//! [OfflineDependencyProvider] is an in-memory implementation suitable for
//! tests and small tools, while package managers typically implement their
//! own on top of an index or a cache. Version sets are [Ranges] from the
//! companion `version-range` crate, or any custom type implementing
//! [VersionSet].

mod error;
mod internal;
mod naive;
mod package;
mod provider;
mod solver;
mod term;
mod version_set;

pub use error::{NoSolutionError, ResolveError};
pub use naive::resolve_naive;
pub use package::Package;
pub use provider::OfflineDependencyProvider;
pub use solver::{resolve, Dependencies, DependencyProvider, PackageResolutionStatistics};
pub use term::Term;
pub use version_range::Ranges;
pub use version_set::VersionSet;

/// Hash map used throughout the crate. Fast, deterministic, not
/// order-preserving.
pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;

/// Hash set counterpart of [Map].
pub type Set<V> = rustc_hash::FxHashSet<V>;

/// What a package version requires: one allowed set of versions per
/// dependency. An empty map is a real answer ("depends on nothing"), unlike
/// [Dependencies::Unavailable].
pub type DependencyConstraints<P, VS> = Map<P, VS>;

/// The assignment produced by a successful [resolve]: one version per
/// package, the root included.
pub type SelectedDependencies<DP> =
    Map<<DP as DependencyProvider>::P, <DP as DependencyProvider>::V>;
