//! The build-time context threaded through hook factories and facet
//! lifecycle callbacks, plus the opaque internal API handle used to detect
//! the registry's "internal API object" attach-collision special case.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::semver::Version;

/// Per-kind configuration plus a couple of builder-injected fields.
///
/// Cheap to clone: the config map is held behind an `Arc` so passing a
/// `Context` into a spawned `init` task never deep-copies configuration.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Debug, Default)]
struct ContextInner {
    config: HashMap<String, Value>,
    debug: bool,
    parent: Option<Context>,
    contract: Option<String>,
    version: Option<String>,
}

impl Context {
    pub fn new(debug: bool) -> Self {
        Context { inner: Arc::new(ContextInner { debug, ..Default::default() }) }
    }

    pub fn debug(&self) -> bool {
        self.inner.debug
    }

    pub fn parent(&self) -> Option<&Context> {
        self.inner.parent.as_ref()
    }

    pub fn config(&self, kind: &str) -> Option<&Value> {
        self.inner.config.get(kind)
    }

    pub fn contract(&self) -> Option<&str> {
        self.inner.contract.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.inner.version.as_deref()
    }

    /// Set a single kind's configuration entry, deep-merging plain JSON
    /// objects and overwriting everything else, the rule the runtime's
    /// `useBase`-style config helper is specified to follow. Calling this
    /// more than once for the same kind merges the entries in call order.
    pub fn with_config(mut self, kind: impl Into<String>, value: Value) -> Self {
        let inner = Arc::make_mut(&mut self.inner);
        let kind = kind.into();
        match inner.config.get_mut(&kind) {
            Some(existing) => deep_merge(existing, value),
            None => {
                inner.config.insert(kind, value);
            }
        }
        self
    }

    pub fn with_parent(mut self, parent: Context) -> Self {
        Arc::make_mut(&mut self.inner).parent = Some(parent);
        self
    }

    /// Used by [`crate::hook::Hook::call`] to stamp `__contract`/`__version`
    /// onto the context just before invoking a factory, per the runtime's
    /// hook-call contract.
    pub(crate) fn with_hook_metadata(mut self, contract: Option<String>, version: &Version) -> Self {
        let inner = Arc::make_mut(&mut self.inner);
        inner.contract = contract;
        inner.version = Some(version.to_string());
        self
    }
}

impl Clone for ContextInner {
    fn clone(&self) -> Self {
        ContextInner {
            config: self.config.clone(),
            debug: self.debug,
            parent: self.parent.clone(),
            contract: self.contract.clone(),
            version: self.version.clone(),
        }
    }
}

/// Deep-merge `incoming` into `existing` in place: JSON objects merge
/// key-by-key (recursively); any other JSON shape (array, scalar, or a
/// type mismatch) overwrites wholesale.
fn deep_merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(existing_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match existing_map.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        existing_map.insert(key, value);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Opaque handle passed to every hook factory and lifecycle callback.
///
/// Carries no behavior of its own in this crate; framework bindings extend
/// it with their own transport/service surface.
///
/// The attach-collision special case in `FacetRegistry::install` ("the
/// attach slot already holds the subsystem's own internal API object, skip
/// attachment instead of erroring") has no reachable code path here: this
/// crate's attach surface is exposed purely through `find(kind, ..)`
/// (`crate::registry::FacetRegistry`'s doc comment), never by installing the
/// literal `Api` handle into a kind's slot the way a dynamically typed
/// runtime would attach it as a named property. A marker field for
/// recognizing that case would never be read, so it has been left out
/// rather than kept as dead weight; see `DESIGN.md` for the full note.
#[derive(Debug, Clone, Default)]
pub struct Api;

impl Api {
    pub fn new() -> Self {
        Api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merges_nested_objects() {
        let ctx = Context::new(false)
            .with_config("db", json!({"host": "localhost", "pool": {"size": 4}}))
            .with_config("db", json!({"pool": {"timeout_ms": 500}, "ssl": true}));
        let merged = ctx.config("db").unwrap();
        assert_eq!(merged["host"], "localhost");
        assert_eq!(merged["pool"]["size"], 4);
        assert_eq!(merged["pool"]["timeout_ms"], 500);
        assert_eq!(merged["ssl"], true);
    }

    #[test]
    fn non_object_overwrites() {
        let ctx = Context::new(false)
            .with_config("flags", json!(["a"]))
            .with_config("flags", json!(["b", "c"]));
        assert_eq!(ctx.config("flags").unwrap(), &json!(["b", "c"]));
    }
}
