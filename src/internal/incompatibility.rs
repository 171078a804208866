// SPDX-License-Identifier: MPL-2.0

//! Clauses over package terms, together with where they came from.

use std::fmt::{Debug, Display};

use crate::internal::{Arena, HashArena, Id, SmallMap};
use crate::{term, DependencyProvider, Package, Term, VersionSet};

/// A set of package terms that can never all hold at once.
///
/// The simplest example comes from a dependency: if `a @ 1` needs `b ∈ [2, 3)`,
/// then "a is 1" and "b is outside [2, 3)" cannot both be true in a valid
/// solution, giving the incompatibility `{a: [1, 1], b: Not([2, 3))}`.
/// Conflict resolution derives further incompatibilities from existing ones,
/// so every clause also records its provenance in [Kind].
///
/// Reading it as a logic formula: the conjunction of the terms is forbidden,
/// i.e. in any valid assignment at least one term is false.
#[derive(Debug, Clone)]
pub struct Incompatibility<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> {
    package_terms: SmallMap<Id<P>, Term<VS>>,
    /// The reason this clause exists.
    pub kind: Kind<P, VS, M>,
}

/// Type alias of unique identifiers for incompatibilities.
pub type IncompId<P, VS, M> = Id<Incompatibility<P, VS, M>>;

pub(crate) type IncompDpId<DP> = IncompId<
    <DP as DependencyProvider>::P,
    <DP as DependencyProvider>::VS,
    <DP as DependencyProvider>::M,
>;

/// Provenance of an incompatibility.
#[derive(Debug, Clone)]
pub enum Kind<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> {
    /// The clause seeding the whole resolution: the root package must take
    /// the root version.
    NotRoot(Id<P>, VS::V),
    /// No version inside this set is usable, either because the provider has
    /// none to offer or because it could not supply dependencies for the one
    /// it proposed.
    NoVersions(Id<P>, VS),
    /// The dependency of one package range on a set of versions of another.
    ///
    /// `FromDependencyOf(a, ra, b, rb)` is stored as `{a: ra, b: Not(rb)}`:
    /// picking `a` in `ra` without `b` in `rb` is forbidden. The range `ra`
    /// grows when sibling clauses are merged, see
    /// [merge_dependents](Incompatibility::merge_dependents).
    FromDependencyOf(Id<P>, VS, Id<P>, VS),
    /// Learned during conflict resolution from the two recorded clauses.
    DerivedFrom(IncompId<P, VS, M>, IncompId<P, VS, M>),
    /// Asserted by the caller for a reason the resolver cannot know,
    /// explained by the attached metadata.
    Custom(Id<P>, VS, M),
}

/// How the terms accumulated in the partial solution compare to a clause.
#[derive(Eq, PartialEq, Debug)]
pub(crate) enum Relation<P: Package> {
    /// Every term of the clause is forced true: the forbidden conjunction
    /// holds, which is a conflict.
    Satisfied,
    /// At least this package's term is forced false, so the clause can no
    /// longer fire.
    Contradicted(Id<P>),
    /// Every term except this package's is forced true; propagation may
    /// derive the negation of the remaining term.
    AlmostSatisfied(Id<P>),
    /// Two or more terms are still open.
    Inconclusive,
}

impl<P: Package, VS: VersionSet, M: Eq + Clone + Debug + Display> Incompatibility<P, VS, M> {
    fn with_one_term(package: Id<P>, term: Term<VS>, kind: Kind<P, VS, M>) -> Self {
        let mut package_terms = SmallMap::default();
        package_terms.insert(package, term);
        Self {
            package_terms,
            kind,
        }
    }

    /// The initial clause: any assignment where the root package is *not* at
    /// the root version is forbidden.
    pub(crate) fn not_root(package: Id<P>, version: VS::V) -> Self {
        Self::with_one_term(
            package,
            Term::Negative(VS::singleton(version.clone())),
            Kind::NotRoot(package, version),
        )
    }

    /// Record that a whole set of versions is unusable. The term must be
    /// positive: the clause forbids selecting inside the set.
    pub(crate) fn no_versions(package: Id<P>, term: Term<VS>) -> Self {
        let set = term.unwrap_positive().clone();
        Self::with_one_term(package, term, Kind::NoVersions(package, set))
    }

    /// A caller-supplied exclusion. The term must be negative: the caller
    /// names the set that may not be selected.
    #[allow(dead_code)] // For callers layering their own constraints on top.
    pub(crate) fn custom_term(package: Id<P>, term: Term<VS>, metadata: M) -> Self {
        let set = term.unwrap_negative().clone();
        Self::with_one_term(package, term, Kind::Custom(package, set, metadata))
    }

    /// A caller-supplied exclusion of one specific version.
    #[allow(dead_code)] // For callers layering their own constraints on top.
    pub(crate) fn custom_version(package: Id<P>, version: VS::V, metadata: M) -> Self {
        let set = VS::singleton(version);
        Self::with_one_term(
            package,
            Term::Positive(set.clone()),
            Kind::Custom(package, set, metadata),
        )
    }

    /// Turn one declared dependency into a clause.
    pub(crate) fn from_dependency(package: Id<P>, versions: VS, dep: (Id<P>, VS)) -> Self {
        let (dependee, dep_set) = dep;
        let kind = Kind::FromDependencyOf(package, versions.clone(), dependee, dep_set.clone());
        if dependee == package {
            // A version depending on its own package either always holds or
            // never does; only the versions violating the constraint remain.
            let violating = versions.intersection(&dep_set.complement());
            return Self::with_one_term(package, Term::Positive(violating), kind);
        }
        let mut package_terms = SmallMap::default();
        package_terms.insert(package, Term::Positive(versions));
        if dep_set != VS::empty() {
            package_terms.insert(dependee, Term::Negative(dep_set));
        }
        Self {
            package_terms,
            kind,
        }
    }

    /// The `(dependant, dependee)` pair if this clause came from a
    /// dependency between two distinct packages.
    pub(crate) fn as_dependency(&self) -> Option<(Id<P>, Id<P>)> {
        match &self.kind {
            Kind::FromDependencyOf(p1, _, p2, _) if p1 != p2 => Some((*p1, *p2)),
            _ => None,
        }
    }

    /// Try to absorb another dependency clause into this one.
    ///
    /// Two clauses merge when they relate the same two packages and demand
    /// the same versions of the dependee; the result covers the union of the
    /// dependant ranges. Packages often publish many versions with unchanged
    /// requirements, and without this rule each one would keep its own
    /// clause alive in the store.
    pub(crate) fn merge_dependents(&self, other: &Self) -> Option<Self> {
        let (p1, p2) = self.as_dependency()?;
        if other.as_dependency()? != (p1, p2) {
            return None;
        }
        // Identical dependee terms are required; a different requirement on
        // p2 means the clauses constrain different things.
        let dep_term = self.get(p2);
        if other.get(p2) != dep_term {
            return None;
        }
        let dep_set = match dep_term {
            Some(term) => term.unwrap_negative().clone(),
            None => VS::empty(),
        };
        let ours = self.get(p1)?.unwrap_positive();
        let theirs = other.get(p1)?.unwrap_positive();
        Some(Self::from_dependency(
            p1,
            ours.union(theirs),
            (p2, dep_set),
        ))
    }

    /// Resolve two clauses against each other over a pivot package,
    /// producing the learned clause of one conflict-resolution step.
    ///
    /// Starting from the conflicting clause, every term of the satisfier's
    /// cause is intersected in, except for the pivot whose two terms are
    /// joined by union. A vacuous pivot union constrains nothing and is
    /// left out.
    pub(crate) fn prior_cause(
        incompat: Id<Self>,
        satisfier_cause: Id<Self>,
        pivot: Id<P>,
        store: &Arena<Self>,
    ) -> Self {
        let current = &store[incompat];
        let cause = &store[satisfier_cause];
        let mut package_terms = current.package_terms.clone();
        for (&package, cause_term) in cause.package_terms.iter() {
            if package == pivot {
                continue;
            }
            let combined = match package_terms.get(&package) {
                Some(known) => known.intersection(cause_term),
                None => cause_term.clone(),
            };
            package_terms.insert(package, combined);
        }
        let pivot_term = match (current.get(pivot), cause.get(pivot)) {
            (Some(ours), Some(theirs)) => ours.union(theirs),
            _ => unreachable!("the pivot belongs to both clauses by construction"),
        };
        if pivot_term == Term::any() {
            package_terms.remove(&pivot);
        } else {
            package_terms.insert(pivot, pivot_term);
        }
        Self {
            package_terms,
            kind: Kind::DerivedFrom(incompat, satisfier_cause),
        }
    }

    /// A terminal clause proves there is no solution: either it is empty, or
    /// its only term covers the root package at the root version.
    pub(crate) fn is_terminal(&self, root_package: Id<P>, root_version: &VS::V) -> bool {
        match self.package_terms.len() {
            0 => true,
            1 => {
                let (package, term) = self.package_terms.iter().next().unwrap();
                *package == root_package && term.contains(root_version)
            }
            _ => false,
        }
    }

    pub(crate) fn get(&self, package: Id<P>) -> Option<&Term<VS>> {
        self.package_terms.get(&package)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Id<P>, &Term<VS>)> {
        self.package_terms
            .iter()
            .map(|(package, term)| (*package, term))
    }

    /// The two parent clauses of a derived one.
    pub(crate) fn causes(&self) -> Option<(Id<Self>, Id<Self>)> {
        match self.kind {
            Kind::DerivedFrom(cause1, cause2) => Some((cause1, cause2)),
            _ => None,
        }
    }

    /// Compare the clause to the current assignments, package by package.
    ///
    /// `terms` looks up the accumulated intersection for a package; `None`
    /// stands for a package with no assignment at all, which leaves its term
    /// open. The scan stops early on the first contradicted term and on the
    /// second open one.
    pub(crate) fn relation<'t>(
        &self,
        terms: impl Fn(Id<P>) -> Option<&'t Term<VS>>,
    ) -> Relation<P>
    where
        VS: 't,
    {
        let mut open = None;
        for (&package, term) in self.package_terms.iter() {
            let classified = terms(package).map(|current| term.relation_with(current));
            match classified {
                Some(term::Relation::Satisfied) => {}
                Some(term::Relation::Contradicted) => return Relation::Contradicted(package),
                Some(term::Relation::Inconclusive) | None => {
                    if open.replace(package).is_some() {
                        return Relation::Inconclusive;
                    }
                }
            }
        }
        match open {
            Some(package) => Relation::AlmostSatisfied(package),
            None => Relation::Satisfied,
        }
    }

    /// Render the clause as a sentence.
    pub(crate) fn display(&self, package_store: &HashArena<P>) -> String {
        let terms: Vec<_> = self.iter().collect();
        match terms.as_slice() {
            [] => "version solving failed".into(),
            [(package, Term::Positive(set))] => {
                format!("{} {} is forbidden", package_store[*package], set)
            }
            [(package, Term::Negative(set))] => {
                format!("{} {} is mandatory", package_store[*package], set)
            }
            [(dependant, Term::Positive(versions)), (dependee, Term::Negative(dep_set))]
            | [(dependee, Term::Negative(dep_set)), (dependant, Term::Positive(versions))] => {
                format!(
                    "{} {} depends on {} {}",
                    package_store[*dependant], versions, package_store[*dependee], dep_set
                )
            }
            many => {
                let rendered: Vec<_> = many
                    .iter()
                    .map(|(package, term)| format!("{} {}", package_store[*package], term))
                    .collect();
                format!("{} are incompatible", rendered.join(", "))
            }
        }
    }
}

// TESTS #######################################################################

#[cfg(test)]
pub(crate) mod tests {
    use std::cmp::Reverse;
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use version_range::testing::proptest_strategy;

    use super::*;
    use crate::internal::State;
    use crate::term::tests::strategy as term_strat;
    use crate::{Map, OfflineDependencyProvider, Ranges};

    proptest! {

        /// For any three distinct packages p1, p2 and p3 and any terms t1, t2
        /// and t3, resolving
        ///    { p1: t1, p2: not t2 }
        /// against
        ///    { p2: t2, p3: t3 }
        /// over p2 eliminates the pivot entirely (`t2 ∪ not t2` is vacuous),
        /// leaving { p1: t1, p3: t3 }.
        #[test]
        fn rule_of_resolution(t1 in term_strat(), t2 in term_strat(), t3 in term_strat()) {
            let mut store = Arena::new();
            let mut package_store = HashArena::new();
            let p1 = package_store.alloc("p1");
            let p2 = package_store.alloc("p2");
            let p3 = package_store.alloc("p3");
            let conflict = store.alloc(Incompatibility {
                package_terms: [(p1, t1.clone()), (p2, t2.negate())].into_iter().collect(),
                kind: Kind::<_, _, String>::FromDependencyOf(p1, Ranges::full(), p2, Ranges::full()),
            });
            let cause = store.alloc(Incompatibility {
                package_terms: [(p2, t2), (p3, t3.clone())].into_iter().collect(),
                kind: Kind::<_, _, String>::FromDependencyOf(p2, Ranges::full(), p3, Ranges::full()),
            });

            let learned = Incompatibility::prior_cause(conflict, cause, p2, &store);

            let mut expected = Map::default();
            expected.insert(p1, t1);
            expected.insert(p3, t3);
            let actual: Map<_, _> = learned
                .package_terms
                .iter()
                .map(|(&package, term)| (package, term.clone()))
                .collect();
            assert_eq!(actual, expected);
        }

        /// Merging two dependency clauses with the same dependee term unions
        /// the dependant ranges and changes nothing else, so the merged clause
        /// rejects exactly the assignments rejected by either input.
        #[test]
        fn merge_dependents_unions_dependant_ranges(
            ra in proptest_strategy(),
            rb in proptest_strategy(),
            dep in proptest_strategy(),
        ) {
            let mut package_store = HashArena::new();
            let p1 = package_store.alloc("p1");
            let p2 = package_store.alloc("p2");
            let a: Incompatibility<_, _, String> =
                Incompatibility::from_dependency(p1, ra.clone(), (p2, dep.clone()));
            let b = Incompatibility::from_dependency(p1, rb.clone(), (p2, dep.clone()));
            let merged = a.merge_dependents(&b).unwrap();
            prop_assert_eq!(merged.get(p1), Some(&Term::Positive(ra.union(&rb))));
            if dep == Ranges::empty() {
                prop_assert_eq!(merged.get(p2), None);
            } else {
                prop_assert_eq!(merged.get(p2), Some(&Term::Negative(dep)));
            }
        }
    }

    #[test]
    fn merge_dependents_rejects_mismatches() {
        let mut package_store = HashArena::new();
        let p1 = package_store.alloc("p1");
        let p2 = package_store.alloc("p2");
        let p3 = package_store.alloc("p3");
        let base: Incompatibility<_, Ranges<u32>, String> =
            Incompatibility::from_dependency(p1, Ranges::singleton(1u32), (p2, Ranges::full()));

        // Different requirement on the dependee.
        let narrower = Incompatibility::from_dependency(
            p1,
            Ranges::singleton(2u32),
            (p2, Ranges::singleton(1u32)),
        );
        assert!(base.merge_dependents(&narrower).is_none());

        // Different dependee package.
        let other_dep =
            Incompatibility::from_dependency(p1, Ranges::singleton(2u32), (p3, Ranges::full()));
        assert!(base.merge_dependents(&other_dep).is_none());

        // Not a dependency at all.
        let no_versions = Incompatibility::no_versions(p2, Term::Positive(Ranges::full()));
        assert!(base.merge_dependents(&no_versions).is_none());
    }

    #[test]
    fn self_dependency_collapses_to_the_violating_versions() {
        let mut package_store = HashArena::new();
        let p = package_store.alloc("p");

        // A version requiring itself is fine: nothing is forbidden.
        let consistent: Incompatibility<_, Ranges<u32>, String> =
            Incompatibility::from_dependency(p, Ranges::singleton(5u32), (p, Ranges::singleton(5u32)));
        assert_eq!(consistent.get(p), Some(&Term::Positive(Ranges::empty())));

        // A version requiring a different version of itself forbids itself.
        let contradictory: Incompatibility<_, Ranges<u32>, String> =
            Incompatibility::from_dependency(p, Ranges::singleton(5u32), (p, Ranges::singleton(6u32)));
        assert_eq!(
            contradictory.get(p),
            Some(&Term::Positive(Ranges::singleton(5u32)))
        );
        // Self-dependencies never take part in sibling merging.
        assert_eq!(contradictory.as_dependency(), None);
    }

    /// Check that multiple self-dependencies are supported.
    ///
    /// The public API deduplicates dependencies through a map, so we test them here
    /// manually.
    #[test]
    fn package_depend_on_self() {
        let cases: &[Vec<(String, Ranges<usize>)>] = &[
            vec![("foo".to_string(), Ranges::full())],
            vec![
                ("foo".to_string(), Ranges::full()),
                ("foo".to_string(), Ranges::full()),
            ],
            vec![
                ("foo".to_string(), Ranges::full()),
                ("foo".to_string(), Ranges::singleton(1usize)),
            ],
            vec![
                ("foo".to_string(), Ranges::singleton(1usize)),
                ("foo".to_string(), Ranges::from_range_bounds(1usize..2)),
                ("foo".to_string(), Ranges::from_range_bounds(1usize..3)),
            ],
        ];

        for case in cases {
            let mut state: State<OfflineDependencyProvider<String, Ranges<usize>>> =
                State::init("root".to_string(), 0);
            state.unit_propagation(state.root_package).unwrap();

            // Add the root package
            let _ = state.add_package_version_dependencies(
                state.root_package,
                0,
                [("foo".to_string(), Ranges::singleton(1usize))],
            );
            state.unit_propagation(state.root_package).unwrap();

            // Add a package that depends on itself twice
            let (next, _) = state
                .partial_solution
                .pick_highest_priority_pkg(|_p, _r| (0, Reverse(0)))
                .unwrap();
            let _ = state.add_package_version_dependencies(next, 1, case.clone());
            state.unit_propagation(next).unwrap();

            assert!(state
                .partial_solution
                .pick_highest_priority_pkg(|_p, _r| (0, Reverse(0)))
                .is_none());

            let solution: BTreeMap<String, usize> = state
                .partial_solution
                .extract_solution()
                .map(|(p, v)| (state.package_store[p].clone(), v))
                .collect();
            let expected = BTreeMap::from([("root".to_string(), 0), ("foo".to_string(), 1)]);

            assert_eq!(solution, expected, "{:?}", case);
        }
    }
}
