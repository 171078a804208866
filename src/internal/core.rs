// SPDX-License-Identifier: MPL-2.0

//! The resolver state machine: clause store, unit propagation, conflict
//! resolution with clause learning, and backjumping.

use crate::error::NoSolutionError;
use crate::internal::{
    Arena, DecisionLevel, HashArena, Id, IncompDpId, Incompatibility, PartialSolution, Relation,
    SatisfierSearch, SmallVec,
};
use crate::{DependencyProvider, Map, Set, Term, VersionSet};

/// Everything the resolution loop mutates, bundled together.
pub struct State<DP: DependencyProvider> {
    pub root_package: Id<DP::P>,
    root_version: DP::V,

    /// For every package, the clauses mentioning it. The union of these
    /// lists is the set of live (non-superseded) clauses.
    #[allow(clippy::type_complexity)]
    incompatibilities: Map<Id<DP::P>, Vec<IncompDpId<DP>>>,

    /// Clauses the partial solution currently contradicts, with the
    /// smallest decision level at which that happened. Propagation skips
    /// them; backjumping below the recorded level forgets them again.
    contradicted_incompatibilities: Map<IncompDpId<DP>, DecisionLevel>,

    /// Dependency clauses grouped by their `(dependant, dependee)` pair, so
    /// a fresh clause can be merged with an equivalent sibling.
    #[allow(clippy::type_complexity)]
    merged_dependencies: Map<(Id<DP::P>, Id<DP::P>), SmallVec<IncompDpId<DP>>>,

    pub partial_solution: PartialSolution<DP>,

    /// Append-only store backing every clause id.
    pub incompatibility_store: Arena<Incompatibility<DP::P, DP::VS, DP::M>>,

    /// Content-hashed store backing every package id.
    pub package_store: HashArena<DP::P>,

    /// Work list of unit propagation, kept between calls to reuse its
    /// allocation.
    propagation_queue: SmallVec<Id<DP::P>>,
}

impl<DP: DependencyProvider> State<DP> {
    /// Set up the arenas and seed propagation with the clause requiring the
    /// root package at the root version.
    pub fn init(root_package: DP::P, root_version: DP::V) -> Self {
        let mut incompatibility_store = Arena::new();
        let mut package_store = HashArena::new();
        let root_package = package_store.alloc(root_package);
        let seed = incompatibility_store.alloc(Incompatibility::not_root(
            root_package,
            root_version.clone(),
        ));
        let mut incompatibilities = Map::default();
        incompatibilities.insert(root_package, vec![seed]);
        Self {
            root_package,
            root_version,
            incompatibilities,
            contradicted_incompatibilities: Map::default(),
            merged_dependencies: Map::default(),
            partial_solution: PartialSolution::empty(),
            incompatibility_store,
            package_store,
            propagation_queue: SmallVec::new(),
        }
    }

    /// Assert one clause and index it, merging it with an equivalent
    /// dependency sibling when possible.
    pub fn add_incompatibility(&mut self, incompat: Incompatibility<DP::P, DP::VS, DP::M>) {
        let id = self.incompatibility_store.alloc(incompat);
        self.index_incompatibility(id);
    }

    /// Turn the declared dependencies of `package @ version` into clauses,
    /// then decide the version unless one of those clauses immediately
    /// conflicts. The conflicting clause is returned in that case.
    pub fn add_package_version_dependencies(
        &mut self,
        package: Id<DP::P>,
        version: DP::V,
        dependencies: impl IntoIterator<Item = (DP::P, DP::VS)>,
    ) -> Option<IncompDpId<DP>> {
        let dep_ids: Vec<(Id<DP::P>, DP::VS)> = dependencies
            .into_iter()
            .map(|(dep_package, dep_set)| (self.package_store.alloc(dep_package), dep_set))
            .collect();
        let new_clauses = self.incompatibility_store.alloc_range(
            dep_ids.into_iter().map(|dep| {
                Incompatibility::from_dependency(package, DP::VS::singleton(version.clone()), dep)
            }),
        );
        for id in Id::iter_range(&new_clauses) {
            self.index_incompatibility(id);
        }
        self.partial_solution.add_package_version_incompatibilities(
            package,
            version,
            new_clauses,
            &self.incompatibility_store,
        )
    }

    /// Derive every consequence reachable from `package`, resolving
    /// conflicts along the way.
    ///
    /// Returns the `(affected package, learned clause)` pair of each conflict
    /// resolution, which feeds the per-package conflict statistics. The only
    /// error is a terminal clause: resolution proved there is no solution.
    #[allow(clippy::type_complexity)]
    pub fn unit_propagation(
        &mut self,
        package: Id<DP::P>,
    ) -> Result<SmallVec<(Id<DP::P>, IncompDpId<DP>)>, NoSolutionError<DP::P, DP::VS>> {
        let mut satisfier_causes = SmallVec::new();
        self.propagation_queue.clear();
        self.propagation_queue.push(package);
        while let Some(current) = self.propagation_queue.pop() {
            let Some(conflict) = self.propagate_package(current) else {
                continue;
            };
            let (pivot, learned) = self.conflict_resolution(conflict, &mut satisfier_causes)?;
            // Restart propagation from the learned clause's pivot; everything
            // else queued so far predates the backjump.
            self.propagation_queue.clear();
            self.propagation_queue.push(pivot);
            self.partial_solution
                .add_derivation(pivot, learned, &self.incompatibility_store);
            self.mark_contradicted(learned);
        }
        Ok(satisfier_causes)
    }

    /// Scan the clauses of one package, newest first, applying every
    /// almost-satisfied one as a derivation. Stops at the first fully
    /// satisfied clause and returns it as a conflict.
    fn propagate_package(&mut self, package: Id<DP::P>) -> Option<IncompDpId<DP>> {
        let clause_count = self.incompatibilities.get(&package).map_or(0, Vec::len);
        for at in (0..clause_count).rev() {
            let incompat_id = self.incompatibilities[&package][at];
            if self
                .contradicted_incompatibilities
                .contains_key(&incompat_id)
            {
                continue;
            }
            match self
                .partial_solution
                .relation(&self.incompatibility_store[incompat_id])
            {
                Relation::Satisfied => {
                    log::info!(
                        "conflict: {}",
                        self.incompatibility_store[incompat_id].display(&self.package_store)
                    );
                    return Some(incompat_id);
                }
                Relation::AlmostSatisfied(unit) => {
                    if !self.propagation_queue.contains(&unit) {
                        self.propagation_queue.push(unit);
                    }
                    // The negation of the remaining term is now in force,
                    // which also contradicts the clause from here on.
                    self.partial_solution.add_derivation(
                        unit,
                        incompat_id,
                        &self.incompatibility_store,
                    );
                    self.mark_contradicted(incompat_id);
                }
                Relation::Contradicted(_) => self.mark_contradicted(incompat_id),
                Relation::Inconclusive => {}
            }
        }
        None
    }

    /// Remember that the partial solution contradicts this clause. A clause
    /// can become contradicted again after a backjump erased the record, so
    /// the earliest level wins: the record must survive as long as the
    /// contradiction does.
    fn mark_contradicted(&mut self, id: IncompDpId<DP>) {
        let level = self.partial_solution.current_decision_level();
        self.contradicted_incompatibilities
            .entry(id)
            .and_modify(|recorded| *recorded = (*recorded).min(level))
            .or_insert(level);
    }

    /// Resolve a conflict into a learned clause and backjump, following
    /// <https://github.com/dart-lang/pub/blob/master/doc/solver.md#conflict-resolution>.
    ///
    /// Returns the pivot package together with the clause that survives the
    /// backjump, or the terminal clause as an error.
    #[allow(clippy::type_complexity)]
    fn conflict_resolution(
        &mut self,
        conflict: IncompDpId<DP>,
        satisfier_causes: &mut SmallVec<(Id<DP::P>, IncompDpId<DP>)>,
    ) -> Result<(Id<DP::P>, IncompDpId<DP>), NoSolutionError<DP::P, DP::VS>> {
        let mut current_id = conflict;
        let mut learned_anything = false;
        loop {
            let current = &self.incompatibility_store[current_id];
            if current.is_terminal(self.root_package, &self.root_version) {
                return Err(self.build_no_solution_error(current_id));
            }
            let (pivot, outcome) = self
                .partial_solution
                .satisfier_search(current, &self.incompatibility_store);
            match outcome {
                SatisfierSearch::DifferentDecisionLevels {
                    previous_satisfier_level,
                } => {
                    log::info!("backjumping to level {}", previous_satisfier_level.0);
                    self.backjump(current_id, learned_anything, previous_satisfier_level);
                    satisfier_causes.push((pivot, current_id));
                    return Ok((pivot, current_id));
                }
                SatisfierSearch::SameDecisionLevels { satisfier_cause } => {
                    let learned = Incompatibility::prior_cause(
                        current_id,
                        satisfier_cause,
                        pivot,
                        &self.incompatibility_store,
                    );
                    log::info!("learned: {}", learned.display(&self.package_store));
                    current_id = self.incompatibility_store.alloc(learned);
                    satisfier_causes.push((pivot, current_id));
                    learned_anything = true;
                }
            }
        }
    }

    /// Rewind below the target level and reinstate the invariants: records
    /// of contradictions above the target are stale, and a clause learned
    /// during resolution still has to be indexed (and possibly merged).
    fn backjump(
        &mut self,
        incompat: IncompDpId<DP>,
        incompat_is_new: bool,
        target: DecisionLevel,
    ) {
        self.partial_solution.backtrack(target);
        self.contradicted_incompatibilities
            .retain(|_, recorded| *recorded <= target);
        if incompat_is_new {
            self.index_incompatibility(incompat);
        }
    }

    /// Make a clause reachable from every package it mentions, after first
    /// trying to fold it into an equivalent dependency sibling.
    ///
    /// On a merge, the superseded sibling is unlinked from the per-package
    /// lists; its arena entry stays behind, unreferenced. Two siblings that
    /// did not merge can never merge later (their dependee terms differ), so
    /// checking each new clause against the current siblings once is enough.
    fn index_incompatibility(&mut self, mut id: IncompDpId<DP>) {
        if let Some(pair) = self.incompatibility_store[id].as_dependency() {
            let siblings = self.merged_dependencies.entry(pair).or_default();
            let merged = siblings.iter().enumerate().find_map(|(slot, &sibling)| {
                self.incompatibility_store[id]
                    .merge_dependents(&self.incompatibility_store[sibling])
                    .map(|merged| (slot, sibling, merged))
            });
            match merged {
                Some((slot, superseded, merged)) => {
                    let merged_id = self.incompatibility_store.alloc(merged);
                    for (package, _) in self.incompatibility_store[merged_id].iter() {
                        if let Some(known) = self.incompatibilities.get_mut(&package) {
                            known.retain(|&listed| listed != superseded);
                        }
                    }
                    siblings[slot] = merged_id;
                    id = merged_id;
                }
                None => siblings.push(id),
            }
        }
        for (package, term) in self.incompatibility_store[id].iter() {
            debug_assert_ne!(term, &Term::any());
            self.incompatibilities
                .entry(package)
                .or_default()
                .push(id);
        }
    }

    /// Package the terminal clause into an error: its own terms, plus every
    /// package mentioned anywhere in its derivation closure.
    fn build_no_solution_error(&self, terminal: IncompDpId<DP>) -> NoSolutionError<DP::P, DP::VS> {
        let terms = self.incompatibility_store[terminal]
            .iter()
            .map(|(package, term)| (self.package_store[package].clone(), term.clone()))
            .collect();
        let mut involved_ids: Vec<Id<DP::P>> = Vec::new();
        let mut visited: Set<IncompDpId<DP>> = Set::default();
        let mut pending = vec![terminal];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            for (package, _) in self.incompatibility_store[id].iter() {
                if !involved_ids.contains(&package) {
                    involved_ids.push(package);
                }
            }
            if let Some((cause1, cause2)) = self.incompatibility_store[id].causes() {
                pending.push(cause1);
                pending.push(cause2);
            }
        }
        let involved = involved_ids
            .into_iter()
            .map(|package| self.package_store[package].clone())
            .collect();
        NoSolutionError::new(terms, involved)
    }
}
