// SPDX-License-Identifier: MPL-2.0

//! The set abstraction the solver reasons over.

use std::fmt::{Debug, Display};

use crate::Ranges;

/// A set of versions of one package.
///
/// The solver never looks at individual versions except through this trait:
/// all of its reasoning is set algebra over whatever the provider uses to
/// express requirements. [`Ranges`] implements it and is the usual choice;
/// any custom type works as long as the operations below behave like real
/// set operations over the whole version domain — the solver does not know
/// which versions actually exist, and must not need to.
///
/// # Structural equality must be set equality
///
/// `Eq` is used to decide questions like "did this intersection change
/// anything", so two values describing the same set of versions must compare
/// equal. In practice that means implementations have to keep a canonical
/// internal form: if `complement` or `intersection` can produce two
/// different representations of one set (say `>=1,<3 ∪ >=3` and `>=1`),
/// resolution will misjudge subset relations and draw wrong conclusions.
pub trait VersionSet: Debug + Display + Clone + Eq {
    /// The version type the sets range over.
    type V: Debug + Display + Clone + Ord;

    /// The set with no versions in it.
    fn empty() -> Self;

    /// The set holding exactly `v`.
    fn singleton(v: Self::V) -> Self;

    /// Every version not in `self`.
    fn complement(&self) -> Self;

    /// The versions in both `self` and `other`.
    fn intersection(&self, other: &Self) -> Self;

    /// Whether `v` is in `self`.
    fn contains(&self, v: &Self::V) -> bool;

    // The remaining operations are derived from the ones above. They can be
    // overridden with faster versions, but must keep the same results.

    /// The set of all versions.
    fn full() -> Self {
        Self::empty().complement()
    }

    /// The versions in `self`, `other`, or both (De Morgan's law).
    fn union(&self, other: &Self) -> Self {
        self.complement()
            .intersection(&other.complement())
            .complement()
    }

    /// Whether `self` and `other` share no version.
    fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other) == Self::empty()
    }

    /// Whether every version of `self` is also in `other`.
    fn subset_of(&self, other: &Self) -> bool {
        self == &self.intersection(other)
    }
}

impl<T: Debug + Display + Clone + Eq + Ord> VersionSet for Ranges<T> {
    type V = T;

    fn empty() -> Self {
        Ranges::empty()
    }

    fn singleton(v: Self::V) -> Self {
        Ranges::singleton(v)
    }

    fn complement(&self) -> Self {
        Ranges::complement(self)
    }

    fn intersection(&self, other: &Self) -> Self {
        Ranges::intersection(self, other)
    }

    fn contains(&self, v: &Self::V) -> bool {
        Ranges::contains(self, v)
    }

    // `Ranges` has dedicated implementations for all the derived
    // operations, so route around the defaults.

    fn full() -> Self {
        Ranges::full()
    }

    fn union(&self, other: &Self) -> Self {
        Ranges::union(self, other)
    }

    fn is_disjoint(&self, other: &Self) -> bool {
        Ranges::is_disjoint(self, other)
    }

    fn subset_of(&self, other: &Self) -> bool {
        Ranges::subset_of(self, other)
    }
}
