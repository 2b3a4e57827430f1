//! Dependency resolution: turning a flat list of [`crate::hook::Hook`]s into
//! an ordered sequence of install levels (Kahn's-algorithm topological sort,
//! grouped by in-degree wave so same-level hooks can be initialized
//! concurrently by [`crate::subsystem::Subsystem::build`]).
//!
//! Resolution is a two-step process, not a pure function of `Hook` metadata:
//! `plan` first calls every hook's factory to obtain a draft [`crate::facet::Facet`]
//! per hook, then builds the graph from each facet's *effective* dependency
//! set: the union of the hook's statically declared `required` kinds and
//! whatever the factory itself added or removed via `Facet::add_dependency`/
//! `remove_dependency` while the facet was still in `Draft`. A hook's static
//! `required` set is a hard floor a factory cannot retract; anything a
//! factory adds dynamically, it may also remove. See `DESIGN.md` for why
//! this split, rather than one or the other alone, is the resolved
//! semantics.
//!
//! `SubsystemBuilder` holds no subsystem state of its own; it is a resolver
//! plus a small bounded cache of previously computed plans, keyed by a hash
//! of each hook's effective shape, so an unchanged hook set skips
//! recomputing the graph (though every factory is still called on every
//! `plan`, since only running them can reveal whether they'd mutate their
//! own dependencies this time).

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::context::{Api, Context};
use crate::error::{Error, Result};
use crate::facet::Facet;
use crate::hook::Hook;
use crate::subsystem::SubsystemHandle;

/// A resolved install order: each inner `Vec` holds hook/facet indices (into
/// the `hooks`/`facets` slices `plan` was called with) for one dependency
/// level. Every index in a level depends only on indices from earlier
/// levels, so within a level hooks may run concurrently. Indices, not kind
/// strings, are the node identity: two hooks registered under the same kind
/// get two distinct entries somewhere in the plan, never collapsed into one.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    pub levels: Vec<Vec<usize>>,
}

/// Summary returned from a completed build, surfaced to callers for
/// diagnostics rather than consumed by the runtime itself.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub levels_completed: usize,
    pub installed_kinds: Vec<String>,
}

const PLAN_CACHE_CAPACITY: usize = 32;

/// Hand-rolled bounded LRU: small, fixed capacity, and the only operations
/// the resolver needs (`get` promotes to most-recently-used, `put` evicts the
/// least-recently-used entry once full). A crate dependency would be
/// overkill for a cache this narrow.
struct DependencyGraphCache {
    capacity: usize,
    entries: HashMap<u64, BuildPlan>,
    order: VecDeque<u64>,
}

impl DependencyGraphCache {
    fn new(capacity: usize) -> Self {
        DependencyGraphCache { capacity, entries: HashMap::new(), order: VecDeque::new() }
    }

    fn get(&mut self, key: u64) -> Option<BuildPlan> {
        if !self.entries.contains_key(&key) {
            return None;
        }
        self.order.retain(|k| *k != key);
        self.order.push_back(key);
        self.entries.get(&key).cloned()
    }

    fn put(&mut self, key: u64, plan: BuildPlan) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| *k != key);
        } else if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key);
        self.entries.insert(key, plan);
    }
}

pub struct SubsystemBuilder {
    cache: std::sync::Mutex<DependencyGraphCache>,
}

impl Default for SubsystemBuilder {
    fn default() -> Self {
        SubsystemBuilder { cache: std::sync::Mutex::new(DependencyGraphCache::new(PLAN_CACHE_CAPACITY)) }
    }
}

impl SubsystemBuilder {
    pub fn new() -> Self {
        SubsystemBuilder::default()
    }

    /// Call every hook's factory to obtain its draft facet, then resolve the
    /// dependency graph from each facet's effective dependencies (see the
    /// module docs). Returns the plan alongside the draft facets it was
    /// computed from, in the same order as `hooks`, so the caller never has
    /// to re-derive which facet belongs to which hook.
    pub async fn plan(
        &self,
        ctx: &Context,
        api: &Arc<Api>,
        subsystem: &SubsystemHandle,
        hooks: &[Hook],
    ) -> Result<(BuildPlan, Vec<Facet>)> {
        let mut facets = Vec::with_capacity(hooks.len());
        for hook in hooks {
            facets.push(hook.call(ctx.clone(), api.clone(), subsystem.clone()).await?);
        }

        let key = hash_effective_shape(hooks, &facets);
        if let Some(cached) = self.cache.lock().unwrap().get(key) {
            return Ok((cached, facets));
        }

        let plan = resolve_levels(hooks, &facets)?;
        self.cache.lock().unwrap().put(key, plan.clone());
        Ok((plan, facets))
    }
}

/// A hook's effective dependency set for resolution: its statically
/// declared `required` kinds, unioned with whatever its draft facet's
/// `dependencies()` holds once the factory has run.
fn effective_dependencies<'a>(hook: &'a Hook, facet: &'a Facet) -> HashSet<&'a str> {
    let mut deps: HashSet<&str> = hook.required.iter().map(String::as_str).collect();
    deps.extend(facet.dependencies().iter().map(String::as_str));
    deps
}

/// Kahn's algorithm over hook/facet indices, grouped into waves: repeatedly
/// collect every index with in-degree zero into one level, then decrement
/// the in-degree of their dependents. A dependency on kind `k` is satisfied
/// once every facet producing kind `k` has been leveled; if a pass collects
/// nothing while indices remain, those remaining indices form a cycle.
fn resolve_levels(hooks: &[Hook], facets: &[Facet]) -> Result<BuildPlan> {
    let mut kind_producers: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, facet) in facets.iter().enumerate() {
        kind_producers.entry(facet.kind()).or_default().push(idx);
    }

    let mut in_degree: Vec<usize> = vec![0; facets.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); facets.len()];

    for (idx, (hook, facet)) in hooks.iter().zip(facets.iter()).enumerate() {
        for required in effective_dependencies(hook, facet) {
            let producers = kind_producers
                .get(required)
                .ok_or_else(|| Error::MissingDependency { kind: required.to_string(), required_by: facet.kind().to_string() })?;
            in_degree[idx] += producers.len();
            for &producer in producers {
                dependents[producer].push(idx);
            }
        }
    }

    let mut remaining = in_degree;
    let mut processed = vec![false; facets.len()];
    let mut processed_count = 0;
    let mut levels: Vec<Vec<usize>> = Vec::new();

    while processed_count < facets.len() {
        // Ascending index order doubles as the registration-order tie-break:
        // index i is hook i's position in the original `hooks` slice, so a
        // level's members come out in the order their hooks were registered,
        // never re-sorted by kind name.
        let level: Vec<usize> = (0..facets.len()).filter(|&i| !processed[i] && remaining[i] == 0).collect();

        if level.is_empty() {
            let cyclic: Vec<String> = (0..facets.len()).filter(|&i| !processed[i]).map(|i| facets[i].kind().to_string()).collect();
            return Err(Error::DependencyCycle(cyclic));
        }

        for &idx in &level {
            processed[idx] = true;
            processed_count += 1;
            for &dependent in &dependents[idx] {
                remaining[dependent] = remaining[dependent].saturating_sub(1);
            }
        }

        levels.push(level);
    }

    Ok(BuildPlan { levels })
}

fn hash_effective_shape(hooks: &[Hook], facets: &[Facet]) -> u64 {
    let mut shapes: Vec<(&str, &str, Vec<&str>)> = hooks
        .iter()
        .zip(facets.iter())
        .map(|(hook, facet)| {
            let mut deps: Vec<&str> = effective_dependencies(hook, facet).into_iter().collect();
            deps.sort_unstable();
            (hook.kind.as_str(), hook.source.as_str(), deps)
        })
        .collect();
    // Hashed, not sorted into the plan itself: this ordering only needs to
    // be stable across two calls with the same hook set, not to match
    // registration order.
    shapes.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = DefaultHasher::new();
    for (kind, source, deps) in shapes {
        kind.hash(&mut hasher);
        source.hash(&mut hasher);
        deps.hash(&mut hasher);
    }
    hasher.finish()
}
