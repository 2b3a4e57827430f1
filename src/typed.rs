//! An optional typed convenience layer over [`crate::facet::OperationValue`].
//!
//! A statically typed consumer usually wants `find::<T>(kind, op)` instead of
//! matching on `OperationValue` and downcasting by hand; this module is that
//! sugar, built only on [`crate::subsystem::Subsystem::find`] and
//! [`OperationValue::resolve`].

use crate::facet::OperationValue;
use crate::subsystem::Subsystem;

/// Errors specific to the typed lookup layer, kept separate from
/// [`crate::error::Error`] since these never originate inside the runtime
/// itself, only at a statically typed call site.
#[derive(Debug, thiserror::Error)]
pub enum TypedLookupError {
    #[error("no facet registered for kind '{0}' exposes operation '{1}'")]
    NotFound(String, String),
    #[error("operation '{1}' on kind '{0}' is callable, not a resolvable value")]
    NotAValue(String, String),
    #[error("operation '{1}' on kind '{0}' did not downcast to the requested type")]
    WrongType(String, String),
}

/// Resolve `kind`/`operation` to a value of type `T`, downcasting the
/// type-erased [`crate::facet::AnyValue`] the registry returns.
pub async fn find<T: Send + Sync + 'static>(
    subsystem: &Subsystem,
    kind: &str,
    operation: &str,
) -> Result<std::sync::Arc<T>, TypedLookupError> {
    let value = subsystem
        .find_operation(kind, operation)
        .await
        .ok_or_else(|| TypedLookupError::NotFound(kind.to_string(), operation.to_string()))?;

    let resolved = match &value {
        OperationValue::Callable(_) => {
            return Err(TypedLookupError::NotAValue(kind.to_string(), operation.to_string()))
        }
        _ => value.resolve().expect("non-callable OperationValue always resolves"),
    };

    resolved
        .downcast::<T>()
        .map_err(|_| TypedLookupError::WrongType(kind.to_string(), operation.to_string()))
}

/// Invoke a callable operation with type-erased arguments already boxed by
/// the caller, downcasting the result to `T`.
pub async fn call<T: Send + Sync + 'static>(
    subsystem: &Subsystem,
    kind: &str,
    operation: &str,
    args: &[crate::facet::AnyValue],
) -> Result<std::sync::Arc<T>, TypedLookupError> {
    let value = subsystem
        .find_operation(kind, operation)
        .await
        .ok_or_else(|| TypedLookupError::NotFound(kind.to_string(), operation.to_string()))?;

    let OperationValue::Callable(callable) = value else {
        return Err(TypedLookupError::NotAValue(kind.to_string(), operation.to_string()));
    };

    let result = callable(args).map_err(|_| TypedLookupError::WrongType(kind.to_string(), operation.to_string()))?;
    result.downcast::<T>().map_err(|_| TypedLookupError::WrongType(kind.to_string(), operation.to_string()))
}
