//! Interpose Object Runtime
//!
//! A dynamically dispatched object model with single inheritance and
//! per-class mutable dispatch tables:
//! - **Classes**: registry, builder and method tables (`object`, `class_registry`, `class_builder`)
//! - **Dispatch**: the [`ObjectRuntime`] capability and the in-memory [`Runtime`]
//! - **Observation**: an external mechanism that moves objects onto
//!   runtime-synthesized `Observed_*` subclasses (`observation`)
//!
//! # Example
//!
//! ```rust,ignore
//! use interpose_runtime::{ObjectRuntime, Runtime, Signature, Value, ValueKind};
//!
//! let runtime = Runtime::new();
//! let counter = runtime
//!     .define_class("Counter")
//!     .method("get", Signature::getter(ValueKind::Int), |_| Ok(Value::Int(1)))
//!     .build()?;
//!
//! let object = runtime.instantiate(counter)?;
//! assert_eq!(runtime.send(object, &"get".into(), &[])?, Value::Int(1));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class_builder;
pub mod class_registry;
pub mod error;
pub mod imp;
pub mod object;
pub mod observation;
pub mod runtime;
pub mod selector;
pub mod value;

pub use class_builder::{ClassBuilder, MethodDefinition};
pub use class_registry::ClassRegistry;
pub use error::RuntimeError;
pub use imp::{same_imp, ImpFn, ImpId, ImpRef, Implementation, Invocation};
pub use object::{Class, ClassId, ClassOrigin, MethodEntry, MethodTable, Object, ObjectId};
pub use observation::{ObservationToken, Observer, OBSERVED_CLASS_PREFIX};
pub use runtime::{ObjectRuntime, Runtime};
pub use selector::MethodId;
pub use value::{Signature, Value, ValueKind};
