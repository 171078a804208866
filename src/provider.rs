use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::{
    Dependencies, DependencyProvider, Map, Package, PackageResolutionStatistics, VersionSet,
};

/// A [DependencyProvider] holding all dependency information in memory.
///
/// Fill it with [add_dependencies](Self::add_dependencies) and hand it to
/// [resolve](crate::resolve) or [resolve_naive](crate::resolve_naive). It is
/// meant for tests, fixtures and small tools; a real package manager will
/// implement the trait on top of its own index or cache instead.
///
/// Versions are proposed newest first. Packages are prioritized by how much
/// trouble they cause: packages involved in many conflicts first, then
/// packages with the fewest candidate versions left, so dead ends surface as
/// early as possible.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "VS::V: serde::Serialize, VS: serde::Serialize, P: serde::Serialize",
        deserialize = "VS::V: serde::Deserialize<'de>, VS: serde::Deserialize<'de>, P: serde::Deserialize<'de>"
    ))
)]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct OfflineDependencyProvider<P: Package, VS: VersionSet> {
    dependencies: Map<P, BTreeMap<VS::V, Map<P, VS>>>,
}

impl<P: Package, VS: VersionSet> OfflineDependencyProvider<P, VS> {
    /// An empty provider, knowing no package at all.
    pub fn new() -> Self {
        Self {
            dependencies: Map::default(),
        }
    }

    /// Register a package version together with all of its dependencies.
    ///
    /// The version exists from this point on, even with an empty dependency
    /// list — an unregistered version and a version without dependencies are
    /// different things. Registering the same `(package, version)` pair
    /// again replaces its dependencies wholesale; they can never be extended
    /// one by one, since [get_dependencies](Self::get_dependencies) promises
    /// a complete answer.
    pub fn add_dependencies<I: IntoIterator<Item = (P, VS)>>(
        &mut self,
        package: P,
        version: impl Into<VS::V>,
        dependencies: I,
    ) {
        self.dependencies
            .entry(package)
            .or_default()
            .insert(version.into(), dependencies.into_iter().collect());
    }

    /// Every package registered so far, in no particular order.
    pub fn packages(&self) -> impl Iterator<Item = &P> {
        self.dependencies.keys()
    }

    /// The registered versions of a package, oldest first, or [None] for an
    /// unknown package.
    pub fn versions(&self, package: &P) -> Option<impl Iterator<Item = &VS::V>> {
        self.dependencies.get(package).map(|by_version| by_version.keys())
    }
}

impl<P: Package, VS: VersionSet> DependencyProvider for OfflineDependencyProvider<P, VS> {
    type P = P;
    type V = VS::V;
    type VS = VS;
    type M = String;
    type Priority = (u32, Reverse<usize>);

    #[inline]
    fn prioritize(
        &self,
        package: &Self::P,
        range: &Self::VS,
        package_statistics: &PackageResolutionStatistics,
    ) -> Self::Priority {
        let candidates = match self.dependencies.get(package) {
            Some(by_version) => by_version.keys().filter(|v| range.contains(v)).count(),
            None => 0,
        };
        match candidates {
            // A package without a candidate conflicts as soon as it is
            // looked at: examine it before everything else.
            0 => (u32::MAX, Reverse(0)),
            _ => (package_statistics.conflict_count(), Reverse(candidates)),
        }
    }

    #[inline]
    fn choose_version(&self, package: &P, range: &VS) -> Option<VS::V> {
        let by_version = self.dependencies.get(package)?;
        by_version.keys().rev().find(|v| range.contains(v)).cloned()
    }

    #[inline]
    fn get_dependencies(&self, package: &P, version: &VS::V) -> Dependencies<P, VS, Self::M> {
        let known = self
            .dependencies
            .get(package)
            .and_then(|by_version| by_version.get(version));
        match known {
            Some(dependencies) => Dependencies::Available(dependencies.clone()),
            None => Dependencies::Unavailable("unknown package version".to_string()),
        }
    }
}
