// SPDX-License-Identifier: MPL-2.0

//! Errors that may occur while solving dependencies.

use std::fmt;

use thiserror::Error;

use crate::{DependencyProvider, Package, Term, VersionSet};

/// There is no solution for this set of dependencies.
///
/// Carries the terms of the terminal incompatibility derived over the root
/// package, plus every package that appeared anywhere in the chain of
/// incompatibilities leading to it. [`Display`](fmt::Display) renders the
/// terminal incompatibility as a human-readable sentence.
#[derive(Debug, Clone)]
pub struct NoSolutionError<P: Package, VS: VersionSet> {
    terms: Vec<(P, Term<VS>)>,
    involved: Vec<P>,
}

impl<P: Package, VS: VersionSet> NoSolutionError<P, VS> {
    pub(crate) fn new(terms: Vec<(P, Term<VS>)>, involved: Vec<P>) -> Self {
        Self { terms, involved }
    }

    /// Terms of the terminal incompatibility: assignments that can never
    /// hold all together, whatever the rest of the solution looks like.
    pub fn terms(&self) -> &[(P, Term<VS>)] {
        &self.terms
    }

    /// Every package involved in deriving that resolution is impossible,
    /// in first-seen order starting from the terminal incompatibility.
    pub fn packages(&self) -> impl Iterator<Item = &P> {
        self.involved.iter()
    }
}

impl<P: Package, VS: VersionSet> fmt::Display for NoSolutionError<P, VS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terms.as_slice() {
            [] => write!(f, "version solving failed"),
            [(package, Term::Positive(range))] => {
                write!(f, "{} {} is forbidden", package, range)
            }
            [(package, Term::Negative(range))] => {
                write!(f, "{} {} is mandatory", package, range)
            }
            [(p_pos, Term::Positive(r_pos)), (p_neg, Term::Negative(r_neg))]
            | [(p_neg, Term::Negative(r_neg)), (p_pos, Term::Positive(r_pos))] => {
                write!(f, "{} {} depends on {} {}", p_pos, r_pos, p_neg, r_neg)
            }
            slice => {
                let str_terms: Vec<_> =
                    slice.iter().map(|(p, t)| format!("{} {}", p, t)).collect();
                write!(f, "{} are incompatible", str_terms.join(", "))
            }
        }
    }
}

/// Errors that may occur while solving dependencies.
#[derive(Error)]
pub enum ResolveError<DP: DependencyProvider> {
    /// Resolution derived that no valid assignment of versions exists.
    #[error("no solution was found: {0}")]
    NoSolution(NoSolutionError<DP::P, DP::VS>),

    /// The provider broke one of its contracts, for example by choosing a
    /// version outside of the range it was handed.
    #[error("{0}")]
    Failure(String),
}

impl<DP: DependencyProvider> fmt::Debug for ResolveError<DP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSolution(err) => f.debug_tuple("NoSolution").field(err).finish(),
            Self::Failure(msg) => f.debug_tuple("Failure").field(msg).finish(),
        }
    }
}
