//! `Subsystem` is the runtime-facing façade: it owns a [`crate::hook::Hook`]
//! list, a [`crate::registry::FacetRegistry`], a [`crate::contract::ContractRegistry`],
//! and a parent/child hierarchy, and drives `build`/`reload`/`dispose` through
//! a [`crate::builder::SubsystemBuilder`].
//!
//! `Subsystem`/`SubsystemHandle` are the same `Arc<tokio::sync::Mutex<..>>`
//! cell; `SubsystemHandle` is the clone callers pass into hook factories and
//! facet callbacks. The lock is only ever held across synchronous
//! book-keeping, never across an `.await` on user-supplied code, so a
//! same-level `init` callback can safely call back into `subsystem.find()`
//! without deadlocking against the task that is still building this
//! subsystem.

use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, instrument, warn};

use crate::builder::{BuildReport, SubsystemBuilder};
use crate::context::{Api, Context};
use crate::contract::ContractRegistry;
use crate::error::{Error, Result};
use crate::facet::{DisposeFn, Facet, FacetSnapshot, InitFn, OperationValue};
use crate::hook::Hook;
use crate::registry::FacetRegistry;

/// Construction options for a new [`Subsystem`]. `Default` gives an empty,
/// non-debug context with no parent.
#[derive(Default)]
pub struct SubsystemOptions {
    pub ctx: Context,
    pub parent: Option<SubsystemHandle>,
}

struct SubsystemInner {
    name: String,
    ctx: Context,
    api: Arc<Api>,
    hooks: Vec<Hook>,
    registry: FacetRegistry,
    contracts: ContractRegistry,
    init_callbacks: Vec<InitFn>,
    dispose_callbacks: Vec<DisposeFn>,
    parent: Option<Weak<Mutex<SubsystemInner>>>,
    children: Vec<SubsystemHandle>,
    builder: Arc<SubsystemBuilder>,
    built: bool,
    building: bool,
    build_notify: Arc<Notify>,
    last_build_report: Option<BuildReport>,
}

/// A named, hierarchical facet container.
///
/// `Subsystem` and [`SubsystemHandle`] are the same underlying cell; `handle()`
/// returns the clone that gets threaded through hook and facet callbacks.
#[derive(Clone)]
pub struct Subsystem {
    inner: Arc<Mutex<SubsystemInner>>,
}

/// The handle form of a [`Subsystem`], passed to hook factories, `init`, and
/// `dispose` callbacks. Distinct type alias only for call-site clarity; it is
/// the identical `Arc<Mutex<..>>` clone.
pub type SubsystemHandle = Subsystem;

impl Subsystem {
    pub fn new(name: impl Into<String>, options: SubsystemOptions) -> Self {
        let name = name.into();
        let parent_weak = options.parent.as_ref().map(|p| Arc::downgrade(&p.inner));
        let subsystem = Subsystem {
            inner: Arc::new(Mutex::new(SubsystemInner {
                name,
                ctx: options.ctx,
                api: Arc::new(Api::new()),
                hooks: Vec::new(),
                registry: FacetRegistry::new(),
                contracts: ContractRegistry::new(),
                init_callbacks: Vec::new(),
                dispose_callbacks: Vec::new(),
                parent: parent_weak,
                children: Vec::new(),
                builder: Arc::new(SubsystemBuilder::new()),
                built: false,
                building: false,
                build_notify: Arc::new(Notify::new()),
                last_build_report: None,
            })),
        };
        if let Some(parent) = &options.parent {
            let child = subsystem.handle();
            let parent = parent.clone();
            tokio::spawn(async move {
                parent.inner.lock().await.children.push(child);
            });
        }
        subsystem
    }

    pub fn handle(&self) -> SubsystemHandle {
        self.clone()
    }

    pub async fn name(&self) -> String {
        self.inner.lock().await.name.clone()
    }

    pub async fn is_built(&self) -> bool {
        self.inner.lock().await.built
    }

    /// Register a contract by name; see [`ContractRegistry::register`].
    pub async fn register_contract(&self, contract: crate::contract::Contract) -> Result<()> {
        self.inner.lock().await.contracts.register(contract)
    }

    /// Queue a hook for the next `build`. Fails if this subsystem was already
    /// built; call `reload` first.
    pub async fn use_hook(&self, hook: Hook) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.built {
            return Err(Error::AlreadyBuilt(inner.name.clone()));
        }
        inner.hooks.push(hook);
        Ok(())
    }

    /// Register a callback invoked once, in registration order, after every
    /// facet in the build has reached `Ready` and passed contract
    /// enforcement. A callback that errors rolls back the whole build exactly
    /// like a facet `init` failure does.
    pub async fn on_init(&self, cb: InitFn) {
        self.inner.lock().await.init_callbacks.push(cb);
    }

    /// Register a callback invoked once, in registration order, during
    /// `dispose`, after every installed facet has already been disposed.
    /// Errors are logged and swallowed, matching facet-level dispose
    /// semantics: teardown never fails partway through because one callback
    /// misbehaved.
    pub async fn on_dispose(&self, cb: DisposeFn) {
        self.inner.lock().await.dispose_callbacks.push(cb);
    }

    /// Resolve a build plan and install every hook's facet, level by level,
    /// with same-level hooks initialized concurrently. Idempotent while a
    /// build is in flight: a second caller waits on the first build's result
    /// instead of racing it (mirrors the "second caller observes the
    /// in-flight promise" rule) via a `Notify` rather than a cloneable
    /// shared future, since the only thing that needs to be observed is
    /// completion, not a cloned value.
    #[instrument(skip(self))]
    pub async fn build(&self) -> Result<BuildReport> {
        debug!(subsystem = %self.name().await, "build starting");
        loop {
            let (ctx, api, hooks, notify) = {
                let mut inner = self.inner.lock().await;
                if inner.built {
                    return Ok(inner.last_build_report.clone().unwrap_or_default());
                }
                if inner.building {
                    (None, None, None, inner.build_notify.clone())
                } else {
                    inner.building = true;
                    (Some(inner.ctx.clone()), Some(inner.api.clone()), Some(inner.hooks.clone()), inner.build_notify.clone())
                }
            };

            let (ctx, api, hooks) = match (ctx, api, hooks) {
                (Some(ctx), Some(api), Some(hooks)) => (ctx, api, hooks),
                _ => {
                    notify.notified().await;
                    continue;
                }
            };

            let result = self.run_build(ctx, api, hooks).await;

            let mut inner = self.inner.lock().await;
            inner.building = false;
            if let Ok(report) = &result {
                inner.built = true;
                inner.last_build_report = Some(report.clone());
            }
            inner.build_notify.notify_waiters();
            return result;
        }
    }

    async fn run_build(&self, ctx: Context, api: Arc<Api>, hooks: Vec<Hook>) -> Result<BuildReport> {
        let handle = self.handle();

        // `plan` calls every hook's factory itself (the graph is built from
        // each draft facet's effective dependencies, not just the hook's
        // static `required` set), so the facets it returns are the ones
        // installed below; nothing is built twice. The builder is cloned
        // out from behind the lock rather than awaited while held: factories
        // are user code and may themselves call back into this subsystem.
        let builder = self.inner.lock().await.builder.clone();
        let (plan, mut facets) = builder.plan(&ctx, &api, &handle, &hooks).await?;

        // order_index reflects position in the flattened, topologically
        // sorted sequence, not just position within a level.
        let mut order_index = vec![0u64; facets.len()];
        for (flat_idx, &hook_idx) in plan.levels.iter().flatten().enumerate() {
            order_index[hook_idx] = flat_idx as u64;
        }

        let mut slots: Vec<Option<Facet>> = facets.drain(..).map(Some).collect();
        let mut report = BuildReport::default();

        for level in &plan.levels {
            debug!(level = ?level, "installing dependency level");
            let mut tasks = tokio::task::JoinSet::new();
            let mut level_error: Option<Error> = None;

            for &idx in level {
                let mut facet = slots[idx].take().expect("each plan index appears in exactly one level");
                let kind = hooks[idx].kind.clone();
                if let Err(err) = facet.set_order_index(order_index[idx]) {
                    // A user factory is free to call `set_order_index` itself
                    // (§4.3); if it already has, don't panic, record the
                    // failure and still let the rest of this level's tasks
                    // run to completion below.
                    level_error.get_or_insert_with(|| Error::facet_init_failed(kind, err));
                    continue;
                }
                let ctx = ctx.clone();
                let api = api.clone();
                let this = self.clone();
                tasks.spawn(async move { this.install_facet(kind, facet, &ctx, &api).await });
            }

            // Drain every same-level task before rolling back. Returning on
            // the first error would drop the JoinSet and abort the
            // still-running siblings, which would leak their partial init
            // effects instead of disposing them.
            while let Some(joined) = tasks.join_next().await {
                let outcome = joined.map_err(|err| Error::facet_init_failed("<join>", err)).and_then(|inner| inner);
                if let Err(err) = outcome {
                    level_error.get_or_insert(err);
                }
            }

            if let Some(err) = level_error {
                self.inner.lock().await.registry.dispose_all().await;
                return Err(err);
            }
            report.levels_completed += 1;
        }

        let init_callbacks = self.inner.lock().await.init_callbacks.clone();
        for cb in &init_callbacks {
            if let Err(err) = cb(ctx.clone(), api.clone(), handle.clone()).await {
                self.inner.lock().await.registry.dispose_all().await;
                return Err(err);
            }
        }

        report.installed_kinds = self.inner.lock().await.registry.installed_kinds();
        Ok(report)
    }

    async fn install_facet(&self, kind: String, mut facet: Facet, ctx: &Context, api: &Arc<Api>) -> Result<()> {
        let handle = self.handle();
        let contract_name = facet.contract().map(str::to_string);

        if let Err(err) = facet.init(ctx.clone(), api.clone(), handle.clone()).await {
            facet.dispose().await;
            return Err(Error::facet_init_failed(kind, err));
        }

        if let Some(contract_name) = &contract_name {
            let enforce_result = {
                let inner = self.inner.lock().await;
                inner.contracts.enforce(contract_name, ctx, api, &handle, &facet)
            };
            if let Err(err) = enforce_result {
                facet.dispose().await;
                return Err(err);
            }
        }

        let displaced = {
            let mut inner = self.inner.lock().await;
            inner.registry.install(kind, facet)?
        };
        // The registry is synchronous and can't drive `dispose` itself, so
        // any non-overwritable facets this overwrite displaced are disposed
        // here, with the lock already released.
        for facet in displaced {
            facet.dispose().await;
        }
        Ok(())
    }

    /// The facet for `kind` at `order_index`, or, when `order_index` is
    /// `None`, the one with the greatest `order_index` currently installed.
    pub async fn find(&self, kind: &str, order_index: Option<u64>) -> Option<FacetSnapshot> {
        let inner = self.inner.lock().await;
        match order_index {
            Some(idx) => inner.registry.facets_for_kind(kind).find(|f| f.order_index() == Some(idx)).map(Facet::snapshot),
            None => inner.registry.find_facet(kind).map(Facet::snapshot),
        }
    }

    /// Look up a facet's operation by kind and operation name.
    pub async fn find_operation(&self, kind: &str, operation: &str) -> Option<OperationValue> {
        let inner = self.inner.lock().await;
        inner.registry.find_operation(kind, operation)
    }

    /// The facet at list position `index` (registration order within the
    /// kind), not `order_index`.
    pub async fn get_by_index(&self, kind: &str, index: usize) -> Option<FacetSnapshot> {
        let inner = self.inner.lock().await;
        inner.registry.get_by_index(kind, index).map(Facet::snapshot)
    }

    /// The kinds currently installed, in registration order. Available
    /// independent of build state: empty before the first successful build,
    /// populated as soon as any facet has been installed.
    pub async fn capabilities(&self) -> Vec<String> {
        self.inner.lock().await.registry.installed_kinds()
    }

    /// True once more than one facet is registered under `kind`.
    pub async fn has_multiple(&self, kind: &str) -> bool {
        self.inner.lock().await.registry.has_multiple(kind)
    }

    /// Dispose every facet registered under `kind` and remove the slot from
    /// this subsystem's surface entirely; a subsequent `find(kind, ..)`
    /// returns `None` until something registers under `kind` again. A no-op
    /// if `kind` was never installed.
    pub async fn remove(&self, kind: &str) {
        self.inner.lock().await.registry.remove(kind).await;
    }

    /// Dispose every installed facet, deepest child first, run any
    /// registered `on_dispose` callbacks, then clear the registry and mark
    /// this subsystem unbuilt so it can be rebuilt.
    pub async fn dispose(&self) {
        let children = self.inner.lock().await.children.clone();
        for child in children.into_iter().rev() {
            Box::pin(child.dispose()).await;
        }

        let mut inner = self.inner.lock().await;
        inner.registry.dispose_all().await;

        let dispose_callbacks = inner.dispose_callbacks.clone();
        let name = inner.name.clone();
        drop(inner);
        for cb in &dispose_callbacks {
            if let Err(err) = cb().await {
                warn!(subsystem = %name, error = %err, "subsystem dispose callback failed");
            }
        }

        let mut inner = self.inner.lock().await;
        inner.built = false;
        inner.last_build_report = None;
        info!(subsystem = %inner.name, "subsystem disposed");
    }

    /// Await any in-flight build, then dispose installed facets while
    /// keeping hooks, context, and callbacks. A no-op if this subsystem was
    /// never built. Does not rebuild: callers may `use_hook` more hooks
    /// before calling `build` again.
    pub async fn reload(&self) {
        loop {
            let notify = {
                let inner = self.inner.lock().await;
                if inner.building {
                    inner.build_notify.clone()
                } else {
                    break;
                }
            };
            notify.notified().await;
        }

        let mut inner = self.inner.lock().await;
        if !inner.built {
            return;
        }
        inner.registry.dispose_all().await;
        inner.built = false;
        inner.last_build_report = None;
    }

    pub async fn children(&self) -> Vec<SubsystemHandle> {
        self.inner.lock().await.children.clone()
    }

    pub async fn get_parent(&self) -> Option<SubsystemHandle> {
        let inner = self.inner.lock().await;
        inner.parent.as_ref().and_then(|weak| weak.upgrade()).map(|inner| Subsystem { inner })
    }

    /// Attach this subsystem under `parent`, replacing any previous parent
    /// link. Also registers this subsystem as one of `parent`'s children;
    /// does not remove it from a prior parent's child list.
    pub async fn set_parent(&self, parent: Option<SubsystemHandle>) {
        let parent_weak = parent.as_ref().map(|p| Arc::downgrade(&p.inner));
        self.inner.lock().await.parent = parent_weak;
        if let Some(parent) = parent {
            let child = self.handle();
            parent.inner.lock().await.children.push(child);
        }
    }

    pub async fn is_root(&self) -> bool {
        self.inner.lock().await.parent.is_none()
    }

    /// Walk up the parent chain to the subsystem with no parent.
    pub async fn get_root(&self) -> SubsystemHandle {
        let mut current = self.handle();
        while let Some(parent) = current.get_parent().await {
            current = parent;
        }
        current
    }

    /// This subsystem's position in the hierarchy, e.g. `root://child/grandchild`.
    /// The actual root subsystem's own name is represented by the `root://`
    /// scheme itself, not repeated in the path.
    pub async fn qualified_name(&self) -> String {
        let mut names = Vec::new();
        let mut current = self.handle();
        while let Some(parent) = current.get_parent().await {
            names.push(current.name().await);
            current = parent;
        }
        names.reverse();
        format!("root://{}", names.join("/"))
    }
}

/// A standalone, parent-less [`Subsystem`] convenience constructor, for
/// callers that only need a single top-level plugin host rather than a
/// hierarchy, the common case for embedding a facet runtime into a
/// single-process tool.
pub struct StandalonePluginSystem;

impl StandalonePluginSystem {
    pub fn new(name: impl Into<String>, ctx: Context) -> Subsystem {
        Subsystem::new(name, SubsystemOptions { ctx, parent: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::{create_hook, HookOptions};
    use std::collections::HashSet;

    fn hook_with_kind(kind: &str, required: HashSet<String>) -> Hook {
        let kind_owned = kind.to_string();
        create_hook(HookOptions {
            kind: kind_owned.clone(),
            source: "test".into(),
            version: None,
            required,
            attach: false,
            overwrite: false,
            contract: None,
            factory: Arc::new(move |_ctx, _api, _sub| {
                let kind = kind_owned.clone();
                Box::pin(async move { Ok(Facet::new(kind, "test")) })
            }),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn builds_and_finds_facet() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        let report = sub.build().await.unwrap();
        assert_eq!(report.levels_completed, 1);
        assert!(sub.is_built().await);
    }

    #[tokio::test]
    async fn second_use_hook_after_build_fails() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        sub.build().await.unwrap();
        let err = sub.use_hook(hook_with_kind("cache", HashSet::new())).await;
        assert!(matches!(err, Err(Error::AlreadyBuilt(_))));
    }

    #[tokio::test]
    async fn reload_then_build_reinstalls_facets() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        sub.build().await.unwrap();
        sub.reload().await;
        assert!(!sub.is_built().await);
        let report = sub.build().await.unwrap();
        assert!(sub.is_built().await);
        assert_eq!(report.levels_completed, 1);
    }

    #[tokio::test]
    async fn reload_on_unbuilt_subsystem_is_a_no_op() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.reload().await;
        assert!(!sub.is_built().await);
    }

    #[tokio::test]
    async fn dependent_hooks_resolve_across_levels() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        let mut requires_db = HashSet::new();
        requires_db.insert("db".to_string());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        sub.use_hook(hook_with_kind("cache", requires_db)).await.unwrap();
        let report = sub.build().await.unwrap();
        assert_eq!(report.levels_completed, 2);
    }

    fn overwritable_hook_with_kind(kind: &str) -> Hook {
        let kind_owned = kind.to_string();
        create_hook(HookOptions {
            kind: kind_owned.clone(),
            source: "test".into(),
            version: None,
            required: HashSet::new(),
            attach: false,
            overwrite: true,
            contract: None,
            factory: Arc::new(move |_ctx, _api, _sub| {
                let kind = kind_owned.clone();
                Box::pin(async move { Ok(Facet::new(kind, "test").with_overwrite(true)) })
            }),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn two_hooks_sharing_a_kind_both_install() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(overwritable_hook_with_kind("db")).await.unwrap();
        sub.use_hook(overwritable_hook_with_kind("db")).await.unwrap();
        let report = sub.build().await.unwrap();
        assert_eq!(report.levels_completed, 1);
        assert!(sub.find("db", Some(0)).await.is_some());
        assert!(sub.find("db", Some(1)).await.is_some());
    }

    #[tokio::test]
    async fn remove_disposes_facet_and_drops_it_from_capabilities() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        sub.build().await.unwrap();
        assert_eq!(sub.capabilities().await, vec!["db".to_string()]);

        sub.remove("db").await;
        assert!(sub.capabilities().await.is_empty());
        assert!(sub.find_operation("db", "anything").await.is_none());
    }

    #[tokio::test]
    async fn has_multiple_reflects_kind_count_after_build() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(overwritable_hook_with_kind("db")).await.unwrap();
        sub.use_hook(overwritable_hook_with_kind("db")).await.unwrap();
        sub.build().await.unwrap();
        assert!(sub.has_multiple("db").await);
    }

    #[tokio::test]
    async fn overwrite_install_disposes_the_facet_it_displaces() {
        // Two hooks share kind "db": one non-overwritable in level 1, one
        // overwritable in level 2 (forced there by a dependency on an
        // unrelated anchor kind, so it installs strictly after the first is
        // already in the registry rather than racing it within a level).
        let sub = Subsystem::new("root", SubsystemOptions::default());
        let disposed = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let disposed_clone = disposed.clone();
        sub.use_hook(
            create_hook(HookOptions {
                kind: "db".into(),
                source: "test".into(),
                version: None,
                required: HashSet::new(),
                attach: false,
                overwrite: false,
                contract: None,
                factory: Arc::new(move |_ctx, _api, _sub| {
                    let disposed_clone = disposed_clone.clone();
                    Box::pin(async move {
                        let mut facet = Facet::new("db", "test");
                        facet
                            .on_dispose(Arc::new(move || {
                                let disposed_clone = disposed_clone.clone();
                                Box::pin(async move {
                                    disposed_clone.store(true, std::sync::atomic::Ordering::SeqCst);
                                    Ok(())
                                })
                            }))
                            .unwrap();
                        Ok(facet)
                    })
                }),
            })
            .unwrap(),
        )
        .await
        .unwrap();
        sub.use_hook(hook_with_kind("anchor", HashSet::new())).await.unwrap();

        let mut requires_anchor = HashSet::new();
        requires_anchor.insert("anchor".to_string());
        sub.use_hook(
            create_hook(HookOptions {
                kind: "db".into(),
                source: "test".into(),
                version: None,
                required: requires_anchor,
                attach: false,
                overwrite: true,
                contract: None,
                factory: Arc::new(|_ctx, _api, _sub| Box::pin(async { Ok(Facet::new("db", "test").with_overwrite(true)) })),
            })
            .unwrap(),
        )
        .await
        .unwrap();

        let report = sub.build().await.unwrap();
        assert_eq!(report.levels_completed, 2);
        assert!(disposed.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(sub.capabilities().await.len(), 2);
    }

    #[tokio::test]
    async fn capabilities_reflects_installed_kinds_after_build() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        assert!(sub.capabilities().await.is_empty());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        sub.build().await.unwrap();
        assert_eq!(sub.capabilities().await, vec!["db".to_string()]);
    }

    #[tokio::test]
    async fn hierarchy_helpers_report_root_and_qualified_name() {
        let root = Subsystem::new("root", SubsystemOptions::default());
        let child = Subsystem::new("child", SubsystemOptions { ctx: Context::new(false), parent: Some(root.handle()) });
        // constructor spawns the parent<-child link; give it a tick to land.
        tokio::task::yield_now().await;

        assert!(root.is_root().await);
        assert!(!child.is_root().await);
        assert_eq!(child.get_root().await.name().await, "root");
        assert_eq!(child.qualified_name().await, "root://child");
    }

    #[tokio::test]
    async fn on_init_callback_runs_after_facets_are_ready() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = ran.clone();
        sub.on_init(Arc::new(move |_ctx, _api, _sub| {
            let ran = ran_clone.clone();
            Box::pin(async move {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }))
        .await;
        sub.build().await.unwrap();
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn on_dispose_callback_runs_during_dispose() {
        let sub = Subsystem::new("root", SubsystemOptions::default());
        sub.use_hook(hook_with_kind("db", HashSet::new())).await.unwrap();
        sub.build().await.unwrap();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_clone = ran.clone();
        sub.on_dispose(Arc::new(move || {
            let ran = ran_clone.clone();
            Box::pin(async move {
                ran.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            })
        }))
        .await;
        sub.dispose().await;
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
