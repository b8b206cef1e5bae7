//! Method implementations and invocations
//!
//! An [`Implementation`] is what a dispatch table entry points at. Every
//! implementation gets a process-unique [`ImpId`], which plays the role of the
//! implementation pointer: two table entries hold the same implementation iff
//! their ids are equal.

use crate::error::RuntimeError;
use crate::object::ObjectId;
use crate::runtime::ObjectRuntime;
use crate::selector::MethodId;
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global counter for generating unique implementation IDs
static NEXT_IMP_ID: AtomicU64 = AtomicU64::new(1);

/// Body of an implementation
pub type ImpFn = dyn Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + Send + Sync;

/// Shared handle to an implementation
pub type ImpRef = Arc<Implementation>;

/// Identity of an implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImpId(u64);

impl ImpId {
    fn next() -> Self {
        Self(NEXT_IMP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ImpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:012x}", self.0)
    }
}

/// A callable method body
pub struct Implementation {
    id: ImpId,
    label: Option<String>,
    body: Box<ImpFn>,
}

impl Implementation {
    /// Wrap a closure as a new implementation
    pub fn new<F>(body: F) -> ImpRef
    where
        F: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self::from_boxed(None, Box::new(body))
    }

    /// Wrap a closure as a new implementation with a debug label
    pub fn labeled<F>(label: impl Into<String>, body: F) -> ImpRef
    where
        F: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self::from_boxed(Some(label.into()), Box::new(body))
    }

    /// Wrap an already boxed body
    pub fn from_boxed(label: Option<String>, body: Box<ImpFn>) -> ImpRef {
        Arc::new(Self {
            id: ImpId::next(),
            label,
            body,
        })
    }

    /// The implementation's identity
    pub fn id(&self) -> ImpId {
        self.id
    }

    /// Debug label, if one was given
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Run the body
    pub fn invoke(&self, invocation: &Invocation<'_>) -> Result<Value, RuntimeError> {
        (self.body)(invocation)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "Implementation({} {})", self.id, label),
            None => write!(f, "Implementation({})", self.id),
        }
    }
}

/// Whether two optional implementations are the same implementation
pub fn same_imp(a: Option<&ImpRef>, b: Option<&ImpRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.id() == b.id(),
        (None, None) => true,
        _ => false,
    }
}

/// One dispatched call, as seen by an implementation body
pub struct Invocation<'a> {
    /// Runtime the call is dispatched through
    pub runtime: &'a dyn ObjectRuntime,
    /// Receiving object
    pub receiver: ObjectId,
    /// Method being called
    pub method: &'a MethodId,
    /// Arguments after the receiver
    pub args: &'a [Value],
}

impl<'a> Invocation<'a> {
    /// Create an invocation
    pub fn new(
        runtime: &'a dyn ObjectRuntime,
        receiver: ObjectId,
        method: &'a MethodId,
        args: &'a [Value],
    ) -> Self {
        Self {
            runtime,
            receiver,
            method,
            args,
        }
    }

    /// Argument at `index`, or an error naming the method
    pub fn arg(&self, index: usize) -> Result<&Value, RuntimeError> {
        self.args.get(index).ok_or_else(|| RuntimeError::ArityMismatch {
            method: self.method.to_string(),
            expected: index + 1,
            actual: self.args.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = Implementation::new(|_| Ok(Value::Null));
        let b = Implementation::new(|_| Ok(Value::Null));
        assert_ne!(a.id(), b.id());
        assert!(same_imp(Some(&a), Some(&a.clone())));
        assert!(!same_imp(Some(&a), Some(&b)));
        assert!(!same_imp(Some(&a), None));
        assert!(same_imp(None, None));
    }

    #[test]
    fn test_label_and_display() {
        let imp = Implementation::labeled("passthrough", |_| Ok(Value::Null));
        assert_eq!(imp.label(), Some("passthrough"));
        assert!(imp.id().to_string().starts_with("0x"));
    }
}
