// SPDX-License-Identifier: MPL-2.0

//! Non-public internal machinery of the resolver.

pub(crate) mod arena;
pub(crate) mod core;
pub(crate) mod incompatibility;
pub(crate) mod partial_solution;
pub(crate) mod small_map;

pub(crate) use arena::{Arena, HashArena, Id};
pub(crate) use core::State;
pub(crate) use incompatibility::{IncompDpId, IncompId, Incompatibility, Relation};
pub(crate) use partial_solution::{DecisionLevel, PartialSolution, SatisfierSearch};
pub(crate) use small_map::SmallMap;

/// Inline-first vector for the solver's many tiny collections
/// (derivation histories, satisfier causes, sibling clause lists, ...).
pub(crate) type SmallVec<T> = smallvec::SmallVec<[T; 2]>;
