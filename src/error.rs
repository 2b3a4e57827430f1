//! Error types for the facet runtime.
//!
//! DESIGN DECISION: a single `thiserror`-derived enum, one variant per
//! failure kind, rather than per-module error types.
//! WHY: callers match on `aetherlight_facets::Error` at a single boundary;
//! splitting errors by module would just push that matching into every
//! caller that crosses module lines, which all of them do (the builder
//! calls into the registry, the subsystem calls into both).
//!
//! REASONING CHAIN:
//! 1. Hook validation, semver parsing, resolution, and install all feed the
//!    same `Subsystem::build` call chain, so their errors already merge at
//!    one call site in practice.
//! 2. A `FacetInitFailed`/`ContractViolation` variant wraps the user's
//!    original cause as a `BoxError` rather than stringifying it, so a
//!    caller that wants to downcast the original error still can.
//! 3. `dispose` never returns `Error` at all; failures there are logged and
//!    swallowed (see [`crate::registry::FacetRegistry::dispose_all`]) since
//!    teardown has nothing left to roll back to.
//!
//! PATTERN: single-enum error type at the crate boundary.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed, thread-safe cause, used for wrapping arbitrary user errors
/// (failed `init` callbacks, failed custom contract validators) without
/// forcing callers into this crate's own error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    // --- Hook / metadata validation ---
    /// Raised by `create_hook` when required metadata is missing or malformed.
    #[error("invalid hook metadata for kind '{kind}': {reason}")]
    InvalidHook { kind: String, reason: String },

    // --- Semver ---
    /// `semver::parse` could not interpret the given string.
    #[error("invalid semver string '{0}'")]
    InvalidSemver(String),

    /// `semver::satisfies` was given a range with an unsupported operator.
    #[error("invalid semver range '{0}'")]
    InvalidRange(String),

    // --- Subsystem lifecycle ---
    /// `Subsystem::use_hook` called after `build` has already run.
    #[error("subsystem '{0}' is already built; call reload() before adding more hooks")]
    AlreadyBuilt(String),

    // --- Registry ---
    /// `FacetRegistry::add` found an existing, non-overwritable facet under the same kind.
    #[error("facet of kind '{0}' is already registered")]
    DuplicateFacet(String),

    /// A second facet of the same kind arrived without `overwrite` permission.
    #[error("facet of kind '{0}' already exists and does not permit overwrite")]
    OverwriteNotPermitted(String),

    /// The attach slot for a kind is held by a different, non-overwritable facet.
    #[error("attach slot '{0}' is held by a conflicting facet")]
    AttachConflict(String),

    // --- Resolver ---
    /// A hook's `required` set named a kind with no corresponding hook.
    #[error("hook '{required_by}' requires unknown kind '{kind}'")]
    MissingDependency { kind: String, required_by: String },

    /// Kahn's algorithm finished with unprocessed nodes remaining.
    #[error("dependency cycle detected among kinds: {0:?}")]
    DependencyCycle(Vec<String>),

    // --- Install / contracts ---
    /// A facet's `init` callback returned an error; the whole transaction rolls back.
    #[error("facet '{kind}' failed to initialize: {cause}")]
    FacetInitFailed { kind: String, #[source] cause: BoxError },

    /// A facet's contract did not hold after `init` completed.
    #[error(
        "contract '{name}' violated (missing operations: {missing_operations:?}, missing properties: {missing_properties:?}, detail: {custom_message:?})"
    )]
    ContractViolation {
        name: String,
        missing_operations: Vec<String>,
        missing_properties: Vec<String>,
        custom_message: Option<String>,
    },

    /// A mutator was called on a facet that has already completed `init`.
    #[error("facet is frozen and cannot be mutated after init")]
    FacetFrozen,

    /// `ContractRegistry::enforce` was asked for a name that was never registered.
    #[error("unknown contract '{0}'")]
    UnknownContract(String),

    /// `ContractRegistry::register` was given a name that already exists.
    #[error("contract '{0}' is already registered")]
    DuplicateContract(String),
}

impl Error {
    /// Convenience constructor used when wrapping an arbitrary user error
    /// raised from inside a facet's `init` callback.
    pub fn facet_init_failed(kind: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Error::FacetInitFailed { kind: kind.into(), cause: cause.into() }
    }
}
