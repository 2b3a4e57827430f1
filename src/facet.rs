//! A `Facet` is a built capability: a named bundle of operations plus
//! `init`/`dispose` callbacks, produced by a [`crate::hook::Hook`] factory
//! and installed by the [`crate::registry::FacetRegistry`].
//!
//! DESIGN DECISION: enforce the `Draft`-only mutation rule with both
//! ownership and a runtime state check, not ownership alone.
//! WHY: `&mut self` on every mutator already closes off most misuse, but
//! `set_order_index`, `add_dependency`, and friends are public API a hook
//! factory calls directly, and the factory still holds an owned `Facet`
//! when it does.
//!
//! REASONING CHAIN:
//! 1. Every mutator takes `&mut self`, so once a `Facet` is moved into the
//!    registry behind an immutable store there is no remaining call path.
//! 2. That alone doesn't stop a factory from calling a mutator a second
//!    time on the same draft, or calling one after `init` has already run
//!    against it once and failed.
//! 3. The `state: Mutex<FacetState>` guard on each mutator turns that case
//!    into a returned [`Error::FacetFrozen`] instead of silently corrupting
//!    state the resolver and contract enforcement already depend on.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::context::{Api, Context};
use crate::error::{Error, Result};
use crate::semver::Version;
use crate::subsystem::SubsystemHandle;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// A type-erased call convention for operations that behave like methods:
/// takes positional, type-erased arguments and returns a type-erased
/// result (or an error). This is the Rust analogue of "callable" in a
/// dynamically typed plugin system.
pub type DynCallable = Arc<dyn Fn(&[AnyValue]) -> Result<AnyValue> + Send + Sync>;

/// One entry in a facet's operation map: a plain value, an accessor
/// (getter), or a callable operation.
#[derive(Clone)]
pub enum OperationValue {
    /// A plain piece of data, addressable by name.
    Value(AnyValue),
    /// A getter, re-evaluated on every read. The closest Rust analogue to
    /// a dynamically typed runtime's computed property accessor.
    Accessor(Arc<dyn Fn() -> AnyValue + Send + Sync>),
    /// A callable operation, checked by [`crate::contract::Contract::required_operations`].
    Callable(DynCallable),
}

impl OperationValue {
    pub fn value(v: impl Any + Send + Sync) -> Self {
        OperationValue::Value(Arc::new(v))
    }

    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&[AnyValue]) -> Result<AnyValue> + Send + Sync + 'static,
    {
        OperationValue::Callable(Arc::new(f))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, OperationValue::Callable(_))
    }

    /// Resolve to a concrete value, invoking the accessor if this is one.
    pub fn resolve(&self) -> Option<AnyValue> {
        match self {
            OperationValue::Value(v) => Some(v.clone()),
            OperationValue::Accessor(getter) => Some(getter()),
            OperationValue::Callable(_) => None,
        }
    }
}

pub type InitFn = Arc<dyn Fn(Context, Arc<Api>, SubsystemHandle) -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub type DisposeFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A facet's lifecycle state. See the module docs on why `Draft` is the
/// only state in which mutators are reachable at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetState {
    Draft,
    Initializing,
    Ready,
    Disposing,
    Disposed,
}

pub struct Facet {
    kind: String,
    version: Version,
    dependencies: HashSet<String>,
    attach: bool,
    overwrite: bool,
    source: String,
    contract: Option<String>,
    operations: std::collections::HashMap<String, OperationValue>,
    init_callback: Mutex<Option<InitFn>>,
    dispose_callback: Mutex<Option<DisposeFn>>,
    order_index: Option<u64>,
    state: Mutex<FacetState>,
}

impl Facet {
    pub fn new(kind: impl Into<String>, source: impl Into<String>) -> Self {
        Facet {
            kind: kind.into(),
            version: Version::zero(),
            dependencies: HashSet::new(),
            attach: false,
            overwrite: false,
            source: source.into(),
            contract: None,
            operations: std::collections::HashMap::new(),
            init_callback: Mutex::new(None),
            dispose_callback: Mutex::new(None),
            order_index: None,
            state: Mutex::new(FacetState::Draft),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn with_attach(mut self, attach: bool) -> Self {
        self.attach = attach;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    fn ensure_draft(&self) -> Result<()> {
        if *self.state.lock().unwrap() == FacetState::Draft {
            Ok(())
        } else {
            Err(Error::FacetFrozen)
        }
    }

    /// Merge operations into the facet. Keys colliding with reserved
    /// internal names are dropped silently, per the runtime's documented
    /// merge semantics.
    pub fn add_operations(&mut self, ops: impl IntoIterator<Item = (String, OperationValue)>) -> Result<()> {
        self.ensure_draft()?;
        for (name, value) in ops {
            if is_reserved_operation_name(&name) {
                warn!(operation = %name, "skipping reserved operation name");
                continue;
            }
            self.operations.insert(name, value);
        }
        Ok(())
    }

    pub fn get_operation(&self, name: &str) -> Option<&OperationValue> {
        self.operations.get(name)
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn on_init(&mut self, cb: InitFn) -> Result<()> {
        self.ensure_draft()?;
        let mut slot = self.init_callback.lock().unwrap();
        *slot = Some(cb);
        Ok(())
    }

    pub fn on_dispose(&mut self, cb: DisposeFn) -> Result<()> {
        self.ensure_draft()?;
        let mut slot = self.dispose_callback.lock().unwrap();
        *slot = Some(cb);
        Ok(())
    }

    pub fn add_dependency(&mut self, kind: impl Into<String>) -> Result<()> {
        self.ensure_draft()?;
        self.dependencies.insert(kind.into());
        Ok(())
    }

    pub fn remove_dependency(&mut self, kind: &str) -> Result<()> {
        self.ensure_draft()?;
        self.dependencies.remove(kind);
        Ok(())
    }

    pub fn set_order_index(&mut self, n: u64) -> Result<()> {
        self.ensure_draft()?;
        if self.order_index.is_some() {
            return Err(Error::FacetFrozen);
        }
        self.order_index = Some(n);
        Ok(())
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn dependencies(&self) -> &HashSet<String> {
        &self.dependencies
    }

    pub fn should_attach(&self) -> bool {
        self.attach
    }

    pub fn should_overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn contract(&self) -> Option<&str> {
        self.contract.as_deref()
    }

    /// Order index, treating an unassigned index as the sentinel maximum
    /// (`None` sorts after every `Some`), matching the registry's sort rule.
    pub fn order_index(&self) -> Option<u64> {
        self.order_index
    }

    pub fn state(&self) -> FacetState {
        *self.state.lock().unwrap()
    }

    /// Idempotent: a no-op if the facet is already `Ready`. Invokes the
    /// `init` callback at most once, transitioning `Draft -> Initializing
    /// -> Ready` on success. On failure the state is left at
    /// `Initializing`, which `dispose` treats as disposable.
    pub async fn init(&self, ctx: Context, api: Arc<Api>, subsystem: SubsystemHandle) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if *state == FacetState::Ready {
                return Ok(());
            }
            *state = FacetState::Initializing;
        }

        let callback = self.init_callback.lock().unwrap().clone();
        if let Some(cb) = callback {
            cb(ctx, api, subsystem).await?;
        }

        *self.state.lock().unwrap() = FacetState::Ready;
        Ok(())
    }

    /// Tolerant of being called on a `Draft` or already-`Disposed` facet
    /// (no-op in both cases). Never propagates the dispose callback's
    /// error; it is logged and swallowed, matching the runtime's dispose
    /// semantics at every layer.
    pub async fn dispose(&self) {
        {
            let mut state = self.state.lock().unwrap();
            match *state {
                FacetState::Draft | FacetState::Disposed => return,
                _ => *state = FacetState::Disposing,
            }
        }

        let callback = self.dispose_callback.lock().unwrap().take();
        if let Some(cb) = callback {
            if let Err(err) = cb().await {
                warn!(kind = %self.kind, error = %err, "facet dispose callback failed");
            }
        }

        *self.state.lock().unwrap() = FacetState::Disposed;
    }

    /// Capture an owned, point-in-time view of this facet. `Subsystem::find`/
    /// `get_by_index` return this rather than a borrow, since both sit behind
    /// a lock a caller shouldn't need to hold just to read a field.
    pub fn snapshot(&self) -> FacetSnapshot {
        FacetSnapshot {
            kind: self.kind.clone(),
            version: self.version.clone(),
            source: self.source.clone(),
            contract: self.contract.clone(),
            order_index: self.order_index,
            dependencies: self.dependencies.clone(),
            state: self.state(),
            operations: self.operations.clone(),
        }
    }
}

/// An owned, `Clone`-able read-only view of a [`Facet`], returned by
/// [`crate::subsystem::Subsystem::find`]/`get_by_index` instead of a borrow
/// so a caller never needs to hold the subsystem's lock open just to read a
/// field afterward.
#[derive(Clone)]
pub struct FacetSnapshot {
    pub kind: String,
    pub version: Version,
    pub source: String,
    pub contract: Option<String>,
    pub order_index: Option<u64>,
    pub dependencies: HashSet<String>,
    pub state: FacetState,
    operations: std::collections::HashMap<String, OperationValue>,
}

impl FacetSnapshot {
    pub fn get_operation(&self, name: &str) -> Option<&OperationValue> {
        self.operations.get(name)
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

fn is_reserved_operation_name(name: &str) -> bool {
    matches!(name, "__contract" | "__version" | "__proto__" | "constructor")
}
