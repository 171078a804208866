// SPDX-License-Identifier: MPL-2.0

//! The resolution loop and the provider interface driving it.
//!
//! [resolve] alternates two phases until it runs out of work: unit
//! propagation derives every consequence of the clauses asserted so far
//! (resolving conflicts into learned clauses and backjumping as needed), and
//! decision making asks the [DependencyProvider] to pick a package and a
//! version to try next. New decisions bring in the dependencies of the
//! chosen version as new clauses, which feeds the next propagation round.
//! The loop ends with a full assignment once no undecided package is left,
//! or with a [NoSolution](ResolveError::NoSolution) error once a derived
//! clause excludes the root itself.
//!
//! ```
//! # use version_solver::{resolve, OfflineDependencyProvider, ResolveError, Ranges};
//! #
//! # type NumVS = Ranges<u32>;
//! #
//! # fn try_main() -> Result<(), ResolveError<OfflineDependencyProvider<&'static str, NumVS>>> {
//! #     let dependency_provider = OfflineDependencyProvider::<&str, NumVS>::new();
//! #     let package = "root";
//! #     let version = 1u32;
//! let solution = resolve(&dependency_provider, package, version)?;
//! #     Ok(())
//! # }
//! # fn main() {
//! #     assert!(matches!(try_main(), Err(ResolveError::NoSolution(_))));
//! # }
//! ```

use std::collections::BTreeSet;
use std::fmt::{Debug, Display};

use log::{debug, info};

use crate::internal::{Id, Incompatibility, State};
use crate::{
    DependencyConstraints, Map, Package, ResolveError, SelectedDependencies, Term, VersionSet,
};

/// Find a version for every package reachable from `package @ version` such
/// that all dependency constraints hold, or prove that none exists.
///
/// Runs are deterministic for a deterministic provider: priority ties fall
/// back to package allocation order, and version choice is entirely the
/// provider's.
#[cold]
pub fn resolve<DP: DependencyProvider>(
    dependency_provider: &DP,
    package: DP::P,
    version: impl Into<DP::V>,
) -> Result<SelectedDependencies<DP>, ResolveError<DP>> {
    let mut state: State<DP> = State::init(package, version.into());
    let mut conflict_tracker: Map<Id<DP::P>, PackageResolutionStatistics> = Map::default();
    // Versions whose dependencies were already turned into clauses. BTreeSet
    // because versions are only required to be orderable.
    let mut expanded: Map<Id<DP::P>, BTreeSet<DP::V>> = Map::default();
    let mut next = state.root_package;
    loop {
        info!("propagating consequences of {}", state.package_store[next]);
        let satisfier_causes = state
            .unit_propagation(next)
            .map_err(ResolveError::NoSolution)?;
        // Each resolved conflict counts against the package whose term was
        // learned and against every other member of the learned clause.
        for (affected, learned) in satisfier_causes {
            conflict_tracker
                .entry(affected)
                .or_default()
                .unit_propagation_affected += 1;
            for (member, _) in state.incompatibility_store[learned].iter() {
                if member != affected {
                    conflict_tracker
                        .entry(member)
                        .or_default()
                        .unit_propagation_culprit += 1;
                }
            }
        }
        debug!(
            "partial solution: {}",
            state.partial_solution.display(&state.package_store)
        );

        let Some((package, candidate_range)) =
            state.partial_solution.pick_highest_priority_pkg(|p, range| {
                dependency_provider.prioritize(
                    &state.package_store[p],
                    range,
                    conflict_tracker.entry(p).or_default(),
                )
            })
        else {
            // No undecided package is left: the decisions are the solution.
            let solution = state
                .partial_solution
                .extract_solution()
                .map(|(p, v)| (state.package_store[p].clone(), v))
                .collect();
            return Ok(solution);
        };
        next = package;

        let version = match dependency_provider
            .choose_version(&state.package_store[package], &candidate_range)
        {
            Some(version) => version,
            None => {
                // The whole remaining range is uninhabited. Assert that and
                // let propagation draw the consequences.
                info!(
                    "no version of {} in {}",
                    state.package_store[package], candidate_range
                );
                state.add_incompatibility(Incompatibility::no_versions(
                    package,
                    Term::Positive(candidate_range),
                ));
                continue;
            }
        };
        info!(
            "provider chose {} @ {}",
            state.package_store[package], version
        );
        if !candidate_range.contains(&version) {
            return Err(ResolveError::Failure(
                "choose_version picked a version outside of the range".into(),
            ));
        }

        if !expanded.entry(package).or_default().insert(version.clone()) {
            // This exact version was expanded before (we came back to it
            // after backtracking); its dependency clauses are already in the
            // store, so it can be decided right away.
            state.partial_solution.add_decision(package, version);
            continue;
        }
        match dependency_provider.get_dependencies(&state.package_store[package], &version) {
            Dependencies::Unavailable(reason) => {
                debug!(
                    "dependencies of {} @ {} unavailable: {}",
                    state.package_store[package], version, reason
                );
                // Rule out exactly this version and retry the range.
                state.add_incompatibility(Incompatibility::no_versions(
                    package,
                    Term::exact(version),
                ));
            }
            Dependencies::Available(dependencies) => {
                if let Some(conflicting) =
                    state.add_package_version_dependencies(package, version, dependencies)
                {
                    // The version was rejected before being decided; record
                    // who was involved, like for a propagation conflict.
                    conflict_tracker
                        .entry(package)
                        .or_default()
                        .dependencies_affected += 1;
                    for (member, _) in state.incompatibility_store[conflicting].iter() {
                        if member != package {
                            conflict_tracker
                                .entry(member)
                                .or_default()
                                .dependencies_culprit += 1;
                        }
                    }
                }
            }
        }
    }
}

/// What a provider knows about the dependencies of one package version.
#[derive(Clone)]
pub enum Dependencies<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> {
    /// The dependencies cannot be supplied; the metadata says why. The
    /// resolver reacts by excluding the version it asked about.
    Unavailable(M),
    /// The complete set of dependencies: an empty map is a definitive
    /// "depends on nothing".
    Available(DependencyConstraints<P, VS>),
}

/// Counters describing how often a package was entangled in conflicts,
/// passed to [prioritize](DependencyProvider::prioritize).
#[derive(Clone, Debug, Default)]
pub struct PackageResolutionStatistics {
    unit_propagation_affected: u32,
    unit_propagation_culprit: u32,
    dependencies_affected: u32,
    dependencies_culprit: u32,
}

impl PackageResolutionStatistics {
    /// How many conflicts this package was involved in so far.
    ///
    /// Conflicts are the expensive part of resolution and tend to repeat
    /// around the same packages, so deciding high-conflict packages first
    /// concentrates the search where it hurts. The count stays at `0`
    /// everywhere on a conflict-free run. The exact numbers depend on
    /// resolver internals; treat them as a heuristic signal, not a stable
    /// quantity.
    pub fn conflict_count(&self) -> u32 {
        self.unit_propagation_affected
            + self.unit_propagation_culprit
            + self.dependencies_affected
            + self.dependencies_culprit
    }
}

/// The oracle the resolver queries for packages, versions and dependencies.
///
/// All three methods are plain synchronous calls and must not reenter the
/// resolver. They are also infallible by design: a provider signals trouble
/// through its answers — [None] from [choose_version](Self::choose_version),
/// [Dependencies::Unavailable] from
/// [get_dependencies](Self::get_dependencies) — and the resolver absorbs
/// those into its clause store and carries on. Cancellation and timeouts
/// belong to the caller, typically by wrapping a provider so that it starts
/// answering "unavailable" once a deadline passed.
pub trait DependencyProvider {
    /// How packages are identified.
    type P: Package;

    /// How versions are represented. Total order is all the resolver needs.
    type V: Debug + Display + Clone + Ord;

    /// How sets of versions are represented; see [VersionSet]. [`Ranges`](crate::Ranges)
    /// is the common choice.
    type VS: VersionSet<V = Self::V>;

    /// Metadata attached to caller-side unavailability, e.g. "build
    /// disabled" or "not in cache while offline". An enum rendering nicely
    /// via [Display] works well; [String] does too.
    type M: Eq + Clone + Debug + Display;

    /// Whatever [prioritize](Self::prioritize) returns: the resolver only
    /// ever picks the maximum and stores clones. Wrapping a count in
    /// [Reverse](std::cmp::Reverse) turns "fewest candidates" into "highest
    /// priority".
    type Priority: Ord + Clone;

    /// Rank an undecided package given the versions it may still take and
    /// its conflict history. The highest-ranked package is decided next;
    /// ties go to the package seen first.
    ///
    /// Prioritization cannot change whether a solution exists, only how
    /// fast one is found. Picking constrained, conflict-prone packages first
    /// usually pays off because their dead ends are discovered early. Within
    /// one resolution this must be a pure function of its inputs; the
    /// resolver may call it repeatedly, even for an unchanged range.
    fn prioritize(
        &self,
        package: &Self::P,
        range: &Self::VS,
        package_statistics: &PackageResolutionStatistics,
    ) -> Self::Priority;

    /// Pick the version of `package` to try next, from inside `range` —
    /// returning a version outside it is a contract violation and fails the
    /// resolution. [None] declares the whole range uninhabited. Most
    /// providers answer the newest matching version.
    fn choose_version(&self, package: &Self::P, range: &Self::VS) -> Option<Self::V>;

    /// The complete dependencies of `package` at `version`. Must answer the
    /// same thing every time it is asked about a given pair.
    fn get_dependencies(
        &self,
        package: &Self::P,
        version: &Self::V,
    ) -> Dependencies<Self::P, Self::VS, Self::M>;
}
