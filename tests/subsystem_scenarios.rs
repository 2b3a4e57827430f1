//! End-to-end build scenarios exercising the resolver, parallel same-level
//! init, transactional rollback, contract enforcement, and reload semantics
//! together through `Subsystem`, rather than any one module in isolation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aetherlight_facets::contract::Contract;
use aetherlight_facets::error::Error;
use aetherlight_facets::facet::{Facet, OperationValue};
use aetherlight_facets::hook::{create_hook, Hook, HookOptions};
use aetherlight_facets::subsystem::{Subsystem, SubsystemOptions};

/// Installs a `tracing` subscriber once per test binary so `tracing::debug!`
/// spans from `builder`/`subsystem` are visible with `--nocapture`; never
/// required for correctness, only for local debugging.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn ok_hook(kind: &str, required: &[&str]) -> Hook {
    let kind_owned = kind.to_string();
    create_hook(HookOptions {
        kind: kind_owned.clone(),
        source: "test".into(),
        version: None,
        required: required.iter().map(|s| s.to_string()).collect(),
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

fn tracking_hook(kind: &str, required: &[&str], order: Arc<Mutex<Vec<String>>>) -> Hook {
    let kind_owned = kind.to_string();
    create_hook(HookOptions {
        kind: kind_owned.clone(),
        source: "test".into(),
        version: None,
        required: required.iter().map(|s| s.to_string()).collect(),
        attach: false,
        overwrite: false,
        contract: None,
        factory: Arc::new(move |_ctx, _api, _sub| {
            let kind = kind_owned.clone();
            let order = order.clone();
            Box::pin(async move {
                let mut facet = Facet::new(&kind, "test");
                let order_for_init = order.clone();
                let kind_for_init = kind.clone();
                facet
                    .on_init(Arc::new(move |_ctx, _api, _sub| {
                        let order = order_for_init.clone();
                        let kind = kind_for_init.clone();
                        Box::pin(async move {
                            order.lock().unwrap().push(kind);
                            Ok(())
                        })
                    }))
                    .unwrap();
                Ok(facet)
            })
        }),
    })
    .unwrap()
}

#[tokio::test]
async fn s1_linear_chain_inits_in_dependency_order() {
    init_tracing();
    let init_order = Arc::new(Mutex::new(Vec::new()));
    let sub = Subsystem::new("root", SubsystemOptions::default());
    // Registered out of dependency order, per S1.
    sub.use_hook(tracking_hook("C", &["B"], init_order.clone())).await.unwrap();
    sub.use_hook(tracking_hook("B", &["A"], init_order.clone())).await.unwrap();
    sub.use_hook(tracking_hook("A", &[], init_order.clone())).await.unwrap();

    let report = sub.build().await.unwrap();
    assert_eq!(report.levels_completed, 3);
    assert_eq!(&*init_order.lock().unwrap(), &["A".to_string(), "B".to_string(), "C".to_string()]);

    assert!(sub.find_operation("A", "missing").await.is_none());
    assert_eq!(report.installed_kinds.len(), 3);
}

#[tokio::test]
async fn s2_diamond_shares_a_level_for_siblings() {
    let sub = Subsystem::new("root", SubsystemOptions::default());
    sub.use_hook(ok_hook("A", &[])).await.unwrap();
    sub.use_hook(ok_hook("B", &["A"])).await.unwrap();
    sub.use_hook(ok_hook("C", &["A"])).await.unwrap();
    sub.use_hook(ok_hook("D", &["B", "C"])).await.unwrap();

    let report = sub.build().await.unwrap();
    // A, then {B, C} together, then D: three levels regardless of B/C order.
    assert_eq!(report.levels_completed, 3);
}

#[tokio::test]
async fn s3_cycle_fails_build_and_leaves_nothing_installed() {
    let sub = Subsystem::new("root", SubsystemOptions::default());
    sub.use_hook(ok_hook("X", &["Y"])).await.unwrap();
    sub.use_hook(ok_hook("Y", &["X"])).await.unwrap();

    let err = sub.build().await;
    match err {
        Err(Error::DependencyCycle(kinds)) => {
            assert!(kinds.contains(&"X".to_string()));
            assert!(kinds.contains(&"Y".to_string()));
        }
        other => panic!("expected DependencyCycle, got {other:?}"),
    }
    assert!(!sub.is_built().await);
    assert!(sub.find_operation("X", "anything").await.is_none());
}

#[tokio::test]
async fn s4_init_failure_rolls_back_prior_level() {
    let disposed = Arc::new(AtomicUsize::new(0));
    let disposed_clone = disposed.clone();

    let hook_a = create_hook(HookOptions {
        kind: "A".into(),
        source: "test".into(),
        version: None,
        required: HashSet::new(),
        attach: false,
        overwrite: false,
        contract: None,
        factory: Arc::new(move |_ctx, _api, _sub| {
            let disposed = disposed_clone.clone();
            Box::pin(async move {
                let mut facet = Facet::new("A", "test");
                facet
                    .on_dispose(Arc::new(move || {
                        let disposed = disposed.clone();
                        Box::pin(async move {
                            disposed.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        })
                    }))
                    .unwrap();
                Ok(facet)
            })
        }),
    })
    .unwrap();

    let mut required_a = HashSet::new();
    required_a.insert("A".to_string());
    let hook_b = create_hook(HookOptions {
        kind: "B".into(),
        source: "test".into(),
        version: None,
        required: required_a,
        attach: false,
        overwrite: false,
        contract: None,
        factory: Arc::new(|_ctx, _api, _sub| {
            Box::pin(async {
                let mut facet = Facet::new("B", "test");
                facet
                    .on_init(Arc::new(|_ctx, _api, _sub| {
                        Box::pin(async { Err(Error::InvalidHook { kind: "B".into(), reason: "boom".into() }) })
                    }))
                    .unwrap();
                Ok(facet)
            })
        }),
    })
    .unwrap();

    let sub = Subsystem::new("root", SubsystemOptions::default());
    sub.use_hook(hook_a).await.unwrap();
    sub.use_hook(hook_b).await.unwrap();

    let err = sub.build().await;
    assert!(matches!(err, Err(Error::FacetInitFailed { .. })));
    assert!(!sub.is_built().await);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert!(sub.find_operation("A", "anything").await.is_none());
}

#[tokio::test]
async fn s5_contract_violation_rolls_back_build() {
    let sub = Subsystem::new("root", SubsystemOptions::default());
    sub.register_contract(Contract::new("database").require_operation("query")).await.unwrap();

    let hook = create_hook(HookOptions {
        kind: "db".into(),
        source: "test".into(),
        version: None,
        required: HashSet::new(),
        attach: false,
        overwrite: false,
        contract: Some("database".into()),
        factory: Arc::new(|_ctx, _api, _sub| {
            Box::pin(async {
                let mut facet = Facet::new("db", "test").with_contract("database");
                facet.add_operations([("close".to_string(), OperationValue::value(()))]).unwrap();
                Ok(facet)
            })
        }),
    })
    .unwrap();

    sub.use_hook(hook).await.unwrap();
    let err = sub.build().await;
    match err {
        Err(Error::ContractViolation { name, missing_operations, .. }) => {
            assert_eq!(name, "database");
            assert_eq!(missing_operations, vec!["query".to_string()]);
        }
        other => panic!("expected ContractViolation, got {other:?}"),
    }
    assert!(!sub.is_built().await);
}

#[tokio::test]
async fn s6_reload_preserves_hooks_and_reinits() {
    let init_order = Arc::new(Mutex::new(Vec::new()));
    let sub = Subsystem::new("root", SubsystemOptions::default());
    sub.use_hook(tracking_hook("A", &[], init_order.clone())).await.unwrap();
    sub.use_hook(tracking_hook("B", &["A"], init_order.clone())).await.unwrap();
    sub.build().await.unwrap();
    assert_eq!(init_order.lock().unwrap().len(), 2);

    sub.reload().await;
    assert!(!sub.is_built().await);

    sub.use_hook(tracking_hook("C", &[], init_order.clone())).await.unwrap();
    let report = sub.build().await.unwrap();

    // A and B both ran init twice total: once per successful build. C ran once.
    let recorded = init_order.lock().unwrap().clone();
    assert_eq!(recorded.iter().filter(|k| *k == "A").count(), 2);
    assert_eq!(recorded.iter().filter(|k| *k == "B").count(), 2);
    assert_eq!(recorded.iter().filter(|k| *k == "C").count(), 1);
    assert!(sub.is_built().await);
    assert_eq!(report.installed_kinds.len(), 3);
}
