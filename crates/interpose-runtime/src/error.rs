//! Runtime errors

use thiserror::Error;

/// Errors raised by the object runtime
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    /// No class with this id or name
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// No object with this id
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// Neither the class nor any ancestor declares the method
    #[error("{class} does not recognize method {method}")]
    DoesNotRecognize {
        /// Class of the receiver
        class: String,
        /// Method that was sent
        method: String,
    },

    /// The nearest declaration of the method has no implementation
    #[error("Method {method} is abstract on {class}")]
    AbstractMethod {
        /// Declaring class
        class: String,
        /// Method that was sent
        method: String,
    },

    /// Argument count does not match the method signature
    #[error("Method {method} expects {expected} arguments, got {actual}")]
    ArityMismatch {
        /// Method that was sent
        method: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// A class with this name is already registered
    #[error("Class name already taken: {0}")]
    ClassNameTaken(String),

    /// The class has been disposed and can no longer be used
    #[error("Class has been disposed: {0}")]
    ClassDisposed(String),

    /// A forwarding implementation found nothing to forward to
    #[error("No implementation of {method} found above {class}")]
    MissingImplementation {
        /// Class the lookup started from
        class: String,
        /// Method being forwarded
        method: String,
    },

    /// Failure raised by an implementation body
    #[error("{0}")]
    Failed(String),
}
