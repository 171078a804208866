// SPDX-License-Identifier: MPL-2.0

//! Signed version-set predicates, the building block of incompatibilities.

use std::fmt::{self, Display};

use crate::VersionSet;

/// A predicate on the version a single package may take.
///
/// A positive term holds when the package is selected with a version inside
/// the set. A negative term holds when the selected version is outside the
/// set, and also when the package is not selected at all; this asymmetry is
/// why `Negative(s)` and `Positive(s.complement())` are different terms.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Term<VS: VersionSet> {
    /// The version must belong to the set.
    Positive(VS),
    /// The version, if any, must lie outside the set.
    Negative(VS),
}

impl<VS: VersionSet> Term<VS> {
    /// The term holding under every assignment: no version is excluded.
    pub(crate) fn any() -> Self {
        Self::Negative(VS::empty())
    }

    /// The term holding under no assignment.
    #[allow(dead_code)] // Kept next to `any` as the other distinguished constant.
    pub(crate) fn empty() -> Self {
        Self::Positive(VS::empty())
    }

    /// The term pinning a package to one exact version.
    pub(crate) fn exact(version: VS::V) -> Self {
        Self::Positive(VS::singleton(version))
    }

    pub(crate) fn is_positive(&self) -> bool {
        matches!(self, Self::Positive(_))
    }

    /// Swap the polarity, keeping the set untouched. Evaluates to the
    /// opposite of the original term under every assignment.
    pub(crate) fn negate(&self) -> Self {
        match self {
            Self::Positive(set) => Self::Negative(set.clone()),
            Self::Negative(set) => Self::Positive(set.clone()),
        }
    }

    /// Evaluate the term for a concrete version.
    pub(crate) fn contains(&self, version: &VS::V) -> bool {
        match self {
            Self::Positive(set) => set.contains(version),
            Self::Negative(set) => !set.contains(version),
        }
    }

    /// The set of a positive term. Panics on a negative one, which would
    /// mean a constraint was read where only obligations are expected.
    pub(crate) fn unwrap_positive(&self) -> &VS {
        match self {
            Self::Positive(set) => set,
            Self::Negative(set) => panic!("expected a positive term, found Not({set})"),
        }
    }

    /// The set of a negative term. Panics on a positive one.
    pub(crate) fn unwrap_negative(&self) -> &VS {
        match self {
            Self::Negative(set) => set,
            Self::Positive(set) => panic!("expected a negative term, found {set}"),
        }
    }

    /// Both terms at once. Positive polarity wins: an assignment satisfying
    /// a positive and a negative term selects a version, so the conjunction
    /// is positive again.
    pub(crate) fn intersection(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Positive(lhs), Self::Positive(rhs)) => Self::Positive(lhs.intersection(rhs)),
            (Self::Positive(pos), Self::Negative(neg))
            | (Self::Negative(neg), Self::Positive(pos)) => {
                Self::Positive(pos.intersection(&neg.complement()))
            }
            (Self::Negative(lhs), Self::Negative(rhs)) => Self::Negative(lhs.union(rhs)),
        }
    }

    /// Either term, computed as the dual of [Self::intersection] by
    /// De Morgan's law. Negative polarity wins.
    pub(crate) fn union(&self, other: &Self) -> Self {
        self.negate().intersection(&other.negate()).negate()
    }

    /// No assignment satisfies both terms at once.
    pub(crate) fn is_disjoint(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Positive(lhs), Self::Positive(rhs)) => lhs.is_disjoint(rhs),
            // The versions of the positive set that the negative term still
            // allows are those outside its set.
            (Self::Positive(pos), Self::Negative(neg))
            | (Self::Negative(neg), Self::Positive(pos)) => pos.subset_of(neg),
            // Two negative terms only exclude their sets; they can both hold
            // unless together they exclude every version.
            (Self::Negative(lhs), Self::Negative(rhs)) => lhs.union(rhs) == VS::full(),
        }
    }

    /// Every assignment satisfying `self` also satisfies `other`.
    pub(crate) fn subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Positive(lhs), Self::Positive(rhs)) => lhs.subset_of(rhs),
            (Self::Positive(lhs), Self::Negative(rhs)) => lhs.is_disjoint(rhs),
            // Package absence satisfies any negative term but no positive one.
            (Self::Negative(_), Self::Positive(_)) => false,
            (Self::Negative(lhs), Self::Negative(rhs)) => rhs.subset_of(lhs),
        }
    }

    /// Classify a term against the intersection of a set of assignments:
    /// forced true, forced false, or still open.
    pub(crate) fn relation_with(&self, assignments_intersection: &Self) -> Relation {
        if assignments_intersection.subset_of(self) {
            Relation::Satisfied
        } else if self.is_disjoint(assignments_intersection) {
            Relation::Contradicted
        } else {
            Relation::Inconclusive
        }
    }
}

/// Outcome of checking a term against a set of assignments S.
#[derive(Eq, PartialEq, Debug)]
pub(crate) enum Relation {
    /// The term must hold whenever all of S holds.
    Satisfied,
    /// The term cannot hold while all of S holds.
    Contradicted,
    /// S decides nothing about the term.
    Inconclusive,
}

impl<VS: VersionSet> Display for Term<VS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive(set) => write!(f, "{}", set),
            Self::Negative(set) => write!(f, "Not ( {} )", set),
        }
    }
}

// TESTS #######################################################################
