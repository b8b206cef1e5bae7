//! Interception errors

use interpose_runtime::{ImpId, MethodId, RuntimeError};
use thiserror::Error;

/// Errors raised while preparing, applying or reverting a hook
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InterposeError {
    /// Neither the class nor any ancestor declares the method
    #[error("Method not found: {class}.{method}")]
    MethodNotFound {
        /// Class the lookup started from
        class: String,
        /// Requested method
        method: MethodId,
    },

    /// The method is inherited rather than declared on the hooked class
    #[error("Method not directly implemented: {class}.{method}")]
    MethodNotDirectlyImplemented {
        /// Hooked class
        class: String,
        /// Requested method
        method: MethodId,
    },

    /// The method exists structurally but has no implementation to displace
    #[error("Implementation not found: {class}.{method}")]
    ImplementationNotFound {
        /// Class the lookup started from
        class: String,
        /// Requested method
        method: MethodId,
    },

    /// The dispatch table did not hold what this hook installed
    #[error("Unexpected implementation in {class}.{method}: {}", display_imp(.found))]
    RevertCorrupted {
        /// Class whose table was inspected
        class: String,
        /// Hooked method
        method: MethodId,
        /// Implementation found in the slot
        found: Option<ImpId>,
    },

    /// The target is governed by the runtime's observation mechanism
    #[error("Unable to hook {subject}: governed by external observation")]
    ExternalObservationDetected {
        /// Object or class that was refused
        subject: String,
    },

    /// The target runs on a class this engine did not put it on
    #[error("Unable to hook {subject}: dispatching through unexpected class {actual}")]
    UnexpectedForeignShadowType {
        /// Object or class that was refused
        subject: String,
        /// Name of the class found
        actual: String,
    },

    /// The shadow type could not be created
    #[error("Failed to create shadow type {name} for {class}: {reason}")]
    ShadowTypeCreationFailed {
        /// Class the shadow type would inherit from
        class: String,
        /// Requested shadow type name
        name: String,
        /// Why creation failed
        reason: String,
    },

    /// The hook failed earlier and accepts no further transitions
    #[error("Hook for {class}.{method} is in failed state")]
    HookInFailedState {
        /// Hooked class
        class: String,
        /// Hooked method
        method: MethodId,
    },

    /// Error reported by the object runtime
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Generic failure
    #[error("{0}")]
    UnknownError(String),
}

fn display_imp(imp: &Option<ImpId>) -> String {
    match imp {
        Some(id) => id.to_string(),
        None => "nil".to_string(),
    }
}

/// Result alias for interception operations
pub type InterposeResult<T> = Result<T, InterposeError>;
