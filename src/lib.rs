//! A dependency-aware plugin runtime: hooks describe capabilities, facets are
//! the built, initialized instances of those capabilities, and a subsystem
//! resolves and installs them in dependency order, level by level, with
//! same-level work initialized concurrently.
//!
//! # Architecture
//!
//! ```text
//! Hook (metadata + factory)
//!   -> Facet (built capability: operations + init/dispose)
//!     -> FacetRegistry (installed, queryable by kind/operation)
//!       <- SubsystemBuilder (resolves install order)
//!         <- Subsystem (owns hooks, registry, contracts, hierarchy)
//! ```
//!
//! # Example
//!
//! ```rust
//! use aetherlight_facets::context::Context;
//! use aetherlight_facets::facet::{Facet, OperationValue};
//! use aetherlight_facets::hook::{create_hook, HookOptions};
//! use aetherlight_facets::subsystem::{Subsystem, SubsystemOptions};
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> aetherlight_facets::error::Result<()> {
//! let subsystem = Subsystem::new("root", SubsystemOptions { ctx: Context::new(false), parent: None });
//!
//! subsystem
//!     .use_hook(create_hook(HookOptions {
//!         kind: "database".into(),
//!         source: "app".into(),
//!         version: Some("1.0.0".into()),
//!         required: HashSet::new(),
//!         attach: false,
//!         overwrite: false,
//!         contract: None,
//!         factory: Arc::new(|_ctx, _api, _sub| {
//!             Box::pin(async {
//!                 let mut facet = Facet::new("database", "app");
//!                 facet.add_operations([
//!                     ("ping".to_string(), OperationValue::callable(|_args| Ok(Arc::new(true)))),
//!                 ])?;
//!                 Ok(facet)
//!             })
//!         }),
//!     })?)
//!     .await?;
//!
//! subsystem.build().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod circular_buffer;
pub mod contract;
pub mod context;
pub mod error;
pub mod facet;
pub mod hook;
pub mod registry;
pub mod semver;
pub mod subsystem;
pub mod typed;

pub use builder::{BuildPlan, BuildReport, SubsystemBuilder};
pub use circular_buffer::{CircularBuffer, DropReason};
pub use context::{Api, Context};
pub use contract::{Contract, ContractRegistry};
pub use error::{Error, Result};
pub use facet::{AnyValue, DynCallable, Facet, FacetState, OperationValue};
pub use hook::{create_hook, Hook, HookOptions};
pub use registry::FacetRegistry;
pub use semver::Version;
pub use subsystem::{StandalonePluginSystem, Subsystem, SubsystemHandle, SubsystemOptions};

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// The crate's own semantic version, as a string.
pub fn version() -> String {
    format!("{}.{}.{}", VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
