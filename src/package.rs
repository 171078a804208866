// SPDX-License-Identifier: MPL-2.0

//! Trait for identifying packages.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait for identifying packages.
///
/// It is automatically implemented for any type that is `Clone + Eq + Hash + Debug + Display`,
/// so most of the time a provider can directly use its own package type (a string, an
/// interned symbol, a tuple of name and source, ...).
pub trait Package: Clone + Eq + Hash + Debug + Display {}

impl<T: Clone + Eq + Hash + Debug + Display> Package for T {}
