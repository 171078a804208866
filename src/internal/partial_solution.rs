// SPDX-License-Identifier: MPL-2.0

//! The assignments made so far: decided versions, derived constraints, and
//! enough history per package to search satisfiers and backjump.

use std::cmp::Reverse;
use std::fmt::{self, Debug, Display};
use std::hash::BuildHasherDefault;
use std::ops::Range;

use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;

use crate::internal::{
    Arena, HashArena, Id, IncompDpId, IncompId, Incompatibility, Relation, SmallMap, SmallVec,
};
use crate::{DependencyProvider, Map, Package, Term, VersionSet};

/// The number of decisions taken so far. Only decisions move it forward;
/// derivations are tagged with the level they were made under.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub(crate) struct DecisionLevel(pub(crate) u32);

impl DecisionLevel {
    pub(crate) fn increment(self) -> Self {
        Self(self.0 + 1)
    }
}

/// All package assignments, historically ordered, with the bookkeeping to
/// pick the next package and to rewind on a backjump.
#[derive(Clone)]
pub struct PartialSolution<DP: DependencyProvider> {
    /// Monotonic counter stamped on every decision and derivation. It
    /// totally orders assignments across packages, which the satisfier
    /// search depends on.
    next_global_index: u32,
    current_decision_level: DecisionLevel,
    /// One slot per package that has at least one assignment. The first
    /// `current_decision_level` slots are exactly the decided packages, in
    /// decision order, so extracting the solution and rewinding by level are
    /// both prefix operations.
    entries: Vec<(Id<DP::P>, PackageAssignments<DP::P, DP::VS, DP::M>)>,
    /// Where each package sits in `entries`.
    positions: Map<Id<DP::P>, usize>,
    /// Undecided packages ranked by provider priority. The tiebreaker is
    /// the package allocation order, reversed so that the first package
    /// sighted wins and runs stay reproducible.
    #[allow(clippy::type_complexity)]
    candidate_queue:
        PriorityQueue<Id<DP::P>, (DP::Priority, Reverse<u32>), BuildHasherDefault<FxHasher>>,
    /// Packages whose constraints changed since their priority was last
    /// computed. May hold duplicates; recomputing a priority is harmless.
    stale_priorities: Vec<Id<DP::P>>,
    /// Cleared never, set by the first backjump: while false, the fast path
    /// of [Self::add_package_version_incompatibilities] applies.
    has_ever_backtracked: bool,
}

/// Everything known about one package.
struct PackageAssignments<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> {
    /// The pinned version, with the global index of the pinning decision.
    /// At most one decision exists per package at any time.
    decision: Option<(u32, VS::V)>,
    /// Intersection of every assignment so far; `exact(version)` once a
    /// decision is taken.
    intersection: Term<VS>,
    /// Derivations in chronological order, each carrying the intersection
    /// accumulated up to itself.
    history: SmallVec<DatedDerivation<P, VS, M>>,
    /// Level of the first derivation: below it the package is unknown.
    first_level: DecisionLevel,
    /// Level of the latest assignment, decision included.
    last_level: DecisionLevel,
}

struct DatedDerivation<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> {
    global_index: u32,
    decision_level: DecisionLevel,
    /// The incompatibility whose unit propagation produced this derivation.
    cause: IncompId<P, VS, M>,
    /// Running intersection of all assignments up to and including this one.
    accumulated_intersection: Term<VS>,
}

impl<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> Clone
    for DatedDerivation<P, VS, M>
{
    fn clone(&self) -> Self {
        Self {
            global_index: self.global_index,
            decision_level: self.decision_level,
            cause: self.cause,
            accumulated_intersection: self.accumulated_intersection.clone(),
        }
    }
}

impl<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> Clone
    for PackageAssignments<P, VS, M>
{
    fn clone(&self) -> Self {
        Self {
            decision: self.decision.clone(),
            intersection: self.intersection.clone(),
            history: self.history.clone(),
            first_level: self.first_level,
            last_level: self.last_level,
        }
    }
}

/// The earliest assignment committing a package to one incompatibility term:
/// from it on, the accumulated intersection implies the term.
struct Satisfier<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> {
    /// `None` when the satisfier is the decision itself.
    cause: Option<IncompId<P, VS, M>>,
    global_index: u32,
    level: DecisionLevel,
}

/// What conflict resolution should do next, decided by comparing the levels
/// of the satisfier and of the previous satisfier of a conflicting clause.
pub(crate) enum SatisfierSearch<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> {
    /// The clause stops being satisfied below the satisfier's level: jump
    /// back there and keep going.
    DifferentDecisionLevels {
        previous_satisfier_level: DecisionLevel,
    },
    /// Both levels coincide: resolve the clause against the satisfier's
    /// cause into a learned clause first.
    SameDecisionLevels {
        satisfier_cause: IncompId<P, VS, M>,
    },
}

impl<DP: DependencyProvider> PartialSolution<DP> {
    pub(crate) fn empty() -> Self {
        Self {
            next_global_index: 0,
            current_decision_level: DecisionLevel(0),
            entries: Vec::new(),
            positions: Map::default(),
            candidate_queue: PriorityQueue::default(),
            stale_priorities: Vec::new(),
            has_ever_backtracked: false,
        }
    }

    pub(crate) fn current_decision_level(&self) -> DecisionLevel {
        self.current_decision_level
    }

    fn assignments(&self, package: Id<DP::P>) -> Option<&PackageAssignments<DP::P, DP::VS, DP::M>> {
        self.positions.get(&package).map(|&at| &self.entries[at].1)
    }

    /// The intersection of every term assigned to the package so far.
    pub(crate) fn current_term(&self, package: Id<DP::P>) -> Option<&Term<DP::VS>> {
        self.assignments(package).map(|pa| &pa.intersection)
    }

    /// Pin a package to a version. The caller guarantees the version lies in
    /// the package's current term, which propagation keeps up to date.
    pub(crate) fn add_decision(&mut self, package: Id<DP::P>, version: DP::V) {
        let at = *self
            .positions
            .get(&package)
            .expect("a decision must follow at least one derivation");
        if cfg!(debug_assertions) {
            let pa = &self.entries[at].1;
            assert!(pa.decision.is_none(), "{package:?} is already decided");
            assert!(
                pa.intersection.contains(&version),
                "{package:?}: {version} is outside {}",
                pa.intersection,
            );
        }
        let target = self.current_decision_level.0 as usize;
        self.current_decision_level = self.current_decision_level.increment();
        let pa = &mut self.entries[at].1;
        pa.decision = Some((self.next_global_index, version.clone()));
        pa.intersection = Term::exact(version);
        pa.last_level = self.current_decision_level;
        self.next_global_index += 1;
        // Keep the decided packages packed at the front, in decision order.
        if at != target {
            self.entries.swap(at, target);
            self.positions.insert(self.entries[at].0, at);
            self.positions.insert(self.entries[target].0, target);
        }
    }

    /// Record the consequence of an almost-satisfied incompatibility: the
    /// package must avoid the clause's term, i.e. its negation is added to
    /// the accumulated intersection.
    pub(crate) fn add_derivation(
        &mut self,
        package: Id<DP::P>,
        cause: IncompDpId<DP>,
        store: &Arena<Incompatibility<DP::P, DP::VS, DP::M>>,
    ) {
        let negated = store[cause]
            .get(package)
            .expect("the derived package appears in its cause")
            .negate();
        let global_index = self.next_global_index;
        self.next_global_index += 1;
        match self.positions.get(&package) {
            Some(&at) => {
                let pa = &mut self.entries[at].1;
                debug_assert!(pa.decision.is_none(), "derivation after a decision");
                pa.intersection = pa.intersection.intersection(&negated);
                pa.last_level = self.current_decision_level;
                pa.history.push(DatedDerivation {
                    global_index,
                    decision_level: self.current_decision_level,
                    cause,
                    accumulated_intersection: pa.intersection.clone(),
                });
                if pa.intersection.is_positive() {
                    // The package now must appear in the solution.
                    self.stale_priorities.push(package);
                }
            }
            None => {
                if negated.is_positive() {
                    self.stale_priorities.push(package);
                }
                let pa = PackageAssignments {
                    decision: None,
                    intersection: negated.clone(),
                    history: smallvec::smallvec![DatedDerivation {
                        global_index,
                        decision_level: self.current_decision_level,
                        cause,
                        accumulated_intersection: negated,
                    }],
                    first_level: self.current_decision_level,
                    last_level: self.current_decision_level,
                };
                self.positions.insert(package, self.entries.len());
                self.entries.push((package, pa));
            }
        }
    }

    /// Choose the next package to decide on, returning it with the versions
    /// it may still take.
    ///
    /// Only packages with a positive intersection and no decision are
    /// candidates: a purely negative constraint is also satisfied by leaving
    /// the package out. Stale priorities are refreshed first; queue entries
    /// can still be outdated by the time they are popped, so each pop is
    /// validated against the current assignments.
    #[cold]
    pub(crate) fn pick_highest_priority_pkg(
        &mut self,
        mut prioritizer: impl FnMut(Id<DP::P>, &DP::VS) -> DP::Priority,
    ) -> Option<(Id<DP::P>, DP::VS)> {
        while let Some(package) = self.stale_priorities.pop() {
            let Some(range) = self.assignments(package).and_then(PackageAssignments::candidate_range)
            else {
                continue;
            };
            let priority = prioritizer(package, range);
            self.candidate_queue
                .push(package, (priority, Reverse(package.into_raw() as u32)));
        }
        while let Some((package, _)) = self.candidate_queue.pop() {
            if let Some(range) = self
                .assignments(package)
                .and_then(PackageAssignments::candidate_range)
            {
                return Some((package, range.clone()));
            }
        }
        None
    }

    /// Once no candidate is left, the decisions *are* the solution.
    pub(crate) fn extract_solution(&self) -> impl Iterator<Item = (Id<DP::P>, DP::V)> + '_ {
        let decided = self.current_decision_level.0 as usize;
        self.entries[..decided].iter().map(|(package, pa)| {
            let (_, version) = pa
                .decision
                .as_ref()
                .unwrap_or_else(|| panic!("{package:?} is undecided within the decided prefix"));
            (*package, version.clone())
        })
    }

    /// Drop every assignment above the target level, as if those decisions
    /// had never been taken.
    pub(crate) fn backtrack(&mut self, target: DecisionLevel) {
        self.current_decision_level = target;
        let mut kept = Vec::with_capacity(self.entries.len());
        for (package, mut pa) in self.entries.drain(..) {
            if pa.first_level > target {
                // The package was first constrained above the target: forget it.
                continue;
            }
            if pa.last_level > target {
                // Pop the derivations made above the target. The decision, if
                // any, was the latest assignment and goes away with them.
                while pa
                    .history
                    .last()
                    .is_some_and(|dd| dd.decision_level > target)
                {
                    pa.history.pop();
                }
                let last = pa
                    .history
                    .last()
                    .expect("first_level <= target guarantees a surviving derivation");
                pa.last_level = last.decision_level;
                pa.intersection = last.accumulated_intersection.clone();
                pa.decision = None;
                self.candidate_queue.remove(&package);
            }
            if pa.candidate_range().is_some() {
                self.stale_priorities.push(package);
            }
            kept.push((package, pa));
        }
        self.entries = kept;
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(at, (package, _))| (*package, at))
            .collect();
        self.has_ever_backtracked = true;
    }

    /// Decide `package @ version` unless one of its freshly added dependency
    /// clauses already conflicts with the partial solution, in which case
    /// that clause is returned and nothing is decided.
    ///
    /// Until the first backjump the partial solution is consistent with
    /// every clause asserted so far, so the check is skipped and the initial
    /// descent stays linear.
    pub(crate) fn add_package_version_incompatibilities(
        &mut self,
        package: Id<DP::P>,
        version: DP::V,
        new_incompatibilities: Range<IncompId<DP::P, DP::VS, DP::M>>,
        store: &Arena<Incompatibility<DP::P, DP::VS, DP::M>>,
    ) -> Option<IncompId<DP::P, DP::VS, DP::M>> {
        if !self.has_ever_backtracked {
            log::debug!("deciding {package:?} @ {version} without checking its dependencies");
            self.add_decision(package, version);
            return None;
        }
        let proposed = Term::exact(version.clone());
        let conflicting = Id::iter_range(&new_incompatibilities).find(|&incompat| {
            let relation = store[incompat].relation(|p| {
                if p == package {
                    // The proposed decision is not part of the assignments yet.
                    Some(&proposed)
                } else {
                    self.current_term(p)
                }
            });
            relation == Relation::Satisfied
        });
        match conflicting {
            Some(incompat) => {
                log::debug!("rejecting {package:?} @ {version}: a dependency clause conflicts");
                Some(incompat)
            }
            None => {
                self.add_decision(package, version);
                None
            }
        }
    }

    /// Compare an incompatibility to the current assignments.
    pub(crate) fn relation(
        &self,
        incompat: &Incompatibility<DP::P, DP::VS, DP::M>,
    ) -> Relation<DP::P> {
        incompat.relation(|package| self.current_term(package))
    }

    /// For a satisfied incompatibility, find the package whose assignment
    /// completed the satisfaction last (the pivot), and decide whether
    /// resolution should learn a clause or backjump (see [SatisfierSearch]).
    pub(crate) fn satisfier_search(
        &self,
        incompat: &Incompatibility<DP::P, DP::VS, DP::M>,
        store: &Arena<Incompatibility<DP::P, DP::VS, DP::M>>,
    ) -> (Id<DP::P>, SatisfierSearch<DP::P, DP::VS, DP::M>) {
        // When did each package commit to its term of the incompatibility?
        let mut satisfiers = SmallMap::default();
        for (package, term) in incompat.iter() {
            let pa = self
                .assignments(package)
                .expect("every package of a satisfied incompatibility has assignments");
            satisfiers.insert(package, pa.satisfier(&term.negate()));
        }
        let (&pivot, pivot_satisfier) = Self::most_recent(&satisfiers);
        let pivot_level = pivot_satisfier.level;
        let pivot_cause = pivot_satisfier.cause;

        let previous_level =
            self.previous_satisfier_level(incompat, pivot, pivot_cause, &mut satisfiers, store);
        let search = if previous_level >= pivot_level {
            SatisfierSearch::SameDecisionLevels {
                satisfier_cause: pivot_cause
                    .expect("a same-level satisfier is a derivation, not a decision"),
            }
        } else {
            SatisfierSearch::DifferentDecisionLevels {
                previous_satisfier_level: previous_level,
            }
        };
        (pivot, search)
    }

    /// The level of the earliest point at which the partial solution minus
    /// the pivot's satisfier, plus that satisfier, still satisfies the
    /// incompatibility. Backjumping there keeps the clause almost satisfied.
    fn previous_satisfier_level(
        &self,
        incompat: &Incompatibility<DP::P, DP::VS, DP::M>,
        pivot: Id<DP::P>,
        pivot_cause: Option<IncompId<DP::P, DP::VS, DP::M>>,
        satisfiers: &mut SmallMap<Id<DP::P>, Satisfier<DP::P, DP::VS, DP::M>>,
        store: &Arena<Incompatibility<DP::P, DP::VS, DP::M>>,
    ) -> DecisionLevel {
        let pa = self.assignments(pivot).expect("the pivot has assignments");
        // What the pivot's satisfier alone contributed.
        let satisfier_term = match pivot_cause {
            Some(cause) => store[cause]
                .get(pivot)
                .expect("the pivot appears in its cause")
                .negate(),
            None => {
                let (_, version) = pa
                    .decision
                    .as_ref()
                    .expect("a satisfier without a cause is a decision");
                Term::exact(version.clone())
            }
        };
        // Rerun the pivot's search as if only its satisfier was left of the
        // incompatibility term, then take the latest commitment overall.
        let narrowed = satisfier_term.intersection(&incompat.get(pivot).unwrap().negate());
        satisfiers.insert(pivot, pa.satisfier(&narrowed));
        let (_, most_recent) = Self::most_recent(satisfiers);
        most_recent.level.max(DecisionLevel(1))
    }

    fn most_recent<'s>(
        satisfiers: &'s SmallMap<Id<DP::P>, Satisfier<DP::P, DP::VS, DP::M>>,
    ) -> (&'s Id<DP::P>, &'s Satisfier<DP::P, DP::VS, DP::M>) {
        satisfiers
            .iter()
            .max_by_key(|(_, satisfier)| satisfier.global_index)
            .expect("a satisfied incompatibility has at least one term")
    }

    pub(crate) fn display<'a>(&'a self, package_store: &'a HashArena<DP::P>) -> impl Display + 'a {
        struct DisplayPartialSolution<'a, DP: DependencyProvider>(
            &'a PartialSolution<DP>,
            &'a HashArena<DP::P>,
        );

        impl<DP: DependencyProvider> Display for DisplayPartialSolution<'_, DP> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                writeln!(
                    f,
                    "decision level {}, {} packages:",
                    self.0.current_decision_level.0,
                    self.0.entries.len()
                )?;
                for (package, pa) in &self.0.entries {
                    match &pa.decision {
                        Some((_, version)) => {
                            writeln!(f, "  {} == {}", self.1[*package], version)?
                        }
                        None => writeln!(f, "  {} in {}", self.1[*package], pa.intersection)?,
                    }
                }
                Ok(())
            }
        }

        DisplayPartialSolution(self, package_store)
    }
}

impl<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> PackageAssignments<P, VS, M> {
    /// The versions this package may still be decided to, if it must be
    /// decided at all.
    fn candidate_range(&self) -> Option<&VS> {
        if self.decision.is_some() {
            return None;
        }
        match &self.intersection {
            Term::Positive(range) => Some(range),
            Term::Negative(_) => None,
        }
    }

    /// The earliest assignment committing the package to the term whose
    /// negation is `target_term`: from that assignment on, the accumulated
    /// intersection is disjoint from `target_term`.
    fn satisfier(&self, target_term: &Term<VS>) -> Satisfier<P, VS, M> {
        // Accumulated intersections only ever shrink, so the first disjoint
        // derivation marks the commitment point for good.
        for dd in &self.history {
            if dd.accumulated_intersection.is_disjoint(target_term) {
                return Satisfier {
                    cause: Some(dd.cause),
                    global_index: dd.global_index,
                    level: dd.decision_level,
                };
            }
        }
        match &self.decision {
            Some((global_index, _)) => Satisfier {
                cause: None,
                global_index: *global_index,
                level: self.last_level,
            },
            None => unreachable!(
                "no derivation is disjoint from the term and no decision was taken \
                 (is the version ordering consistent?)"
            ),
        }
    }
}
