//! Class builder
//!
//! Declares a class with its parent and methods, then registers it with a
//! [`Runtime`] in one step.
//!
//! ```rust,ignore
//! let counter = runtime
//!     .define_class("Counter")
//!     .method("get", Signature::getter(ValueKind::Int), |_| Ok(Value::Int(1)))
//!     .build()?;
//! ```

use crate::error::RuntimeError;
use crate::imp::{ImpRef, Implementation, Invocation};
use crate::object::{Class, ClassId};
use crate::runtime::Runtime;
use crate::selector::MethodId;
use crate::value::{Signature, Value};

/// Definition for a method to be added to a class
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// Method identifier
    pub method: MethodId,
    /// Calling signature
    pub signature: Signature,
    /// Implementation (`None` declares an abstract slot)
    pub implementation: Option<ImpRef>,
}

/// Builder for declaring classes
pub struct ClassBuilder<'rt> {
    runtime: &'rt Runtime,
    name: String,
    parent: Option<ClassId>,
    methods: Vec<MethodDefinition>,
}

impl<'rt> ClassBuilder<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime, name: String) -> Self {
        Self {
            runtime,
            name,
            parent: None,
            methods: Vec::new(),
        }
    }

    /// Inherit from `parent`
    pub fn extends(mut self, parent: ClassId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a method backed by a closure
    pub fn method<F>(self, name: impl Into<MethodId>, signature: Signature, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.implementation(name, signature, Implementation::new(body))
    }

    /// Add a method backed by an existing implementation
    pub fn implementation(
        mut self,
        name: impl Into<MethodId>,
        signature: Signature,
        implementation: ImpRef,
    ) -> Self {
        self.methods.push(MethodDefinition {
            method: name.into(),
            signature,
            implementation: Some(implementation),
        });
        self
    }

    /// Declare a method without an implementation
    pub fn abstract_method(mut self, name: impl Into<MethodId>, signature: Signature) -> Self {
        self.methods.push(MethodDefinition {
            method: name.into(),
            signature,
            implementation: None,
        });
        self
    }

    /// Register the class
    pub fn build(self) -> Result<ClassId, RuntimeError> {
        let placeholder = ClassId(0);
        let mut class = match self.parent {
            Some(parent) => {
                self.runtime.ensure_live(parent)?;
                Class::with_parent(placeholder, self.name, parent)
            }
            None => Class::new(placeholder, self.name),
        };
        for def in self.methods {
            class.methods.declare(def.method, def.signature, def.implementation);
        }
        self.runtime.register_class(class)
    }
}
