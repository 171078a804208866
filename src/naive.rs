// SPDX-License-Identifier: MPL-2.0

//! A reference resolver based on chronological backtracking.
//!
//! [`resolve_naive`] mirrors the external contract of [`resolve`](crate::resolve)
//! (same provider, same result type) but explores assignments with a plain
//! depth-first search over `(package, descending versions)` instead of clause
//! learning. It exists to cross-check the optimized resolver on small and
//! randomly generated instances, so it favors obvious correctness over speed:
//! every choice point clones its state instead of undoing mutations.
//!
//! On instances with several valid solutions the two resolvers may return
//! different (valid) assignments.

use crate::error::NoSolutionError;
use crate::{
    Dependencies, DependencyProvider, Map, OfflineDependencyProvider, Package, ResolveError,
    SelectedDependencies, Term, VersionSet,
};

/// Resolve the dependencies of `package` at `version` by chronological
/// backtracking.
///
/// Versions are tried from highest to lowest, like
/// [`OfflineDependencyProvider::choose_version`]. The `Ord` bound on `P`
/// only pins the order in which dependencies are explored, keeping runs
/// reproducible.
pub fn resolve_naive<P: Package + Ord, VS: VersionSet>(
    dependency_provider: &OfflineDependencyProvider<P, VS>,
    package: P,
    version: impl Into<VS::V>,
) -> Result<SelectedDependencies<OfflineDependencyProvider<P, VS>>, NaiveResolveError<P, VS>> {
    let root_version: VS::V = version.into();
    let no_solution = |root: &P, root_version: &VS::V| {
        ResolveError::NoSolution(NoSolutionError::new(
            vec![(root.clone(), Term::exact(root_version.clone()))],
            vec![root.clone()],
        ))
    };

    let root_deps = match dependency_provider.get_dependencies(&package, &root_version) {
        Dependencies::Unavailable(_) => return Err(no_solution(&package, &root_version)),
        Dependencies::Available(deps) => deps,
    };

    let mut decided: Map<P, VS::V> = Map::default();
    decided.insert(package.clone(), root_version.clone());
    let mut constraints: Map<P, VS> = Map::default();
    let mut queue: Vec<P> = Vec::new();

    let mut root_deps: Vec<(P, VS)> = root_deps.into_iter().collect();
    root_deps.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (dep, range) in root_deps {
        if dep == package {
            if !range.contains(&root_version) {
                return Err(no_solution(&package, &root_version));
            }
            continue;
        }
        if range == VS::empty() {
            return Err(no_solution(&package, &root_version));
        }
        constraints.insert(dep.clone(), range);
        queue.push(dep);
    }

    match search(dependency_provider, &decided, &constraints, queue) {
        Some(solution) => Ok(solution),
        None => Err(no_solution(&package, &root_version)),
    }
}

type NaiveResolveError<P, VS> = ResolveError<OfflineDependencyProvider<P, VS>>;

/// Decide the next queued package, newest candidate version first, and
/// recurse on the rest of the queue. Exhausting every candidate of a package
/// fails the current branch and unwinds to the previous choice point.
fn search<P: Package + Ord, VS: VersionSet>(
    dependency_provider: &OfflineDependencyProvider<P, VS>,
    decided: &Map<P, VS::V>,
    constraints: &Map<P, VS>,
    mut queue: Vec<P>,
) -> Option<Map<P, VS::V>> {
    let package = loop {
        match queue.pop() {
            None => return Some(decided.clone()),
            Some(p) if decided.contains_key(&p) => continue,
            Some(p) => break p,
        }
    };

    let allowed = constraints.get(&package).cloned().unwrap_or_else(VS::full);
    let versions: Vec<VS::V> = match dependency_provider.versions(&package) {
        Some(it) => it.cloned().collect(),
        None => return None,
    };

    for v in versions.into_iter().rev() {
        if !allowed.contains(&v) {
            continue;
        }
        let deps = match dependency_provider.get_dependencies(&package, &v) {
            Dependencies::Unavailable(_) => continue,
            Dependencies::Available(deps) => deps,
        };
        let mut deps: Vec<(P, VS)> = deps.into_iter().collect();
        deps.sort_by(|(a, _), (b, _)| a.cmp(b));

        // A dependency contradicting an already decided package rules this
        // version out without recursing.
        if deps
            .iter()
            .any(|(dep, range)| decided.get(dep).is_some_and(|dv| !range.contains(dv)))
        {
            continue;
        }
        // The version must also satisfy its own accumulated constraint when
        // it depends on itself.
        if deps
            .iter()
            .any(|(dep, range)| *dep == package && !range.contains(&v))
        {
            continue;
        }

        let mut decided = decided.clone();
        decided.insert(package.clone(), v.clone());
        let mut constraints = constraints.clone();
        let mut queue = queue.clone();
        let mut dead_end = false;
        for (dep, range) in deps {
            if decided.contains_key(&dep) {
                continue;
            }
            let merged = match constraints.get(&dep) {
                Some(existing) => existing.intersection(&range),
                None => range,
            };
            if merged == VS::empty() {
                dead_end = true;
                break;
            }
            constraints.insert(dep.clone(), merged);
            queue.push(dep);
        }
        if dead_end {
            continue;
        }
        if let Some(solution) = search(dependency_provider, &decided, &constraints, queue) {
            return Some(solution);
        }
    }
    None
}
