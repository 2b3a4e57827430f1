//! A `Hook` is immutable metadata plus a factory that produces a
//! [`crate::facet::Facet`] from a build context. Hooks are what callers
//! register with a [`crate::subsystem::Subsystem`] via `use_hook`; the
//! [`crate::builder::SubsystemBuilder`] calls each hook's factory during
//! the verify phase of a build.

use std::collections::HashSet;
use std::sync::Arc;

use crate::context::{Api, Context};
use crate::error::{Error, Result};
use crate::facet::{BoxFuture, Facet};
use crate::semver::Version;
use crate::subsystem::SubsystemHandle;

pub type FactoryFn =
    Arc<dyn Fn(Context, Arc<Api>, SubsystemHandle) -> BoxFuture<'static, Result<Facet>> + Send + Sync>;

/// Options accepted by [`create_hook`]. `version` defaults to `0.0.0` and
/// `required`/`attach`/`overwrite`/`contract` default to empty/false/false/`None`.
pub struct HookOptions {
    pub kind: String,
    pub source: String,
    pub version: Option<String>,
    pub required: HashSet<String>,
    pub attach: bool,
    pub overwrite: bool,
    pub contract: Option<String>,
    pub factory: FactoryFn,
}

#[derive(Clone)]
pub struct Hook {
    pub kind: String,
    pub version: Version,
    pub required: HashSet<String>,
    pub attach: bool,
    pub overwrite: bool,
    pub source: String,
    pub contract: Option<String>,
    factory: FactoryFn,
}

/// Validate `options` and produce a [`Hook`]. Fails with
/// [`Error::InvalidHook`] if `kind`/`source` are empty, `contract` is
/// `Some("")`, or `version` doesn't parse as semver.
pub fn create_hook(options: HookOptions) -> Result<Hook> {
    if options.kind.trim().is_empty() {
        return Err(Error::InvalidHook { kind: options.kind, reason: "kind must be non-empty".into() });
    }
    if options.source.trim().is_empty() {
        return Err(Error::InvalidHook { kind: options.kind, reason: "source must be non-empty".into() });
    }
    if let Some(contract) = &options.contract {
        if contract.trim().is_empty() {
            return Err(Error::InvalidHook {
                kind: options.kind,
                reason: "contract name must be non-empty when provided".into(),
            });
        }
    }
    let version = match &options.version {
        Some(v) => Version::parse(v).map_err(|_| Error::InvalidHook {
            kind: options.kind.clone(),
            reason: format!("invalid version string '{v}'"),
        })?,
        None => Version::zero(),
    };

    Ok(Hook {
        kind: options.kind,
        version,
        required: options.required,
        attach: options.attach,
        overwrite: options.overwrite,
        source: options.source,
        contract: options.contract,
        factory: options.factory,
    })
}

impl Hook {
    /// Invoke the factory, first stamping `__contract`/`__version` onto the
    /// context: the call always augments `ctx` before the factory runs.
    pub async fn call(&self, ctx: Context, api: Arc<Api>, subsystem: SubsystemHandle) -> Result<Facet> {
        let ctx = ctx.with_hook_metadata(self.contract.clone(), &self.version);
        (self.factory)(ctx, api, subsystem).await
    }
}
