//! Interpose Engine
//!
//! Method interception for dynamically dispatched object runtimes:
//! - **Type hooks**: replace a method for every instance of a class
//! - **Instance hooks**: replace a method for one object, through a private
//!   shadow subclass (`shadow`)
//! - **Chains**: instance hooks on the same method stack and unwind in any
//!   order (`chain`)
//! - **Safety**: objects governed by observation or foreign subclasses are
//!   refused (`validator`)
//!
//! # Example
//!
//! ```rust,ignore
//! use interpose_engine::{HookProxy, HookTarget, Interposer};
//! use interpose_runtime::{Invocation, Value};
//!
//! let interposer = Interposer::new(runtime.clone());
//! let mut hook = interposer.apply_hook(HookTarget::Instance(counter), "get", |proxy: HookProxy| {
//!     move |inv: &Invocation<'_>| {
//!         let value = proxy.call_original(inv)?.as_int().unwrap_or(0);
//!         Ok(Value::Int(value + 1))
//!     }
//! })?;
//!
//! assert_eq!(runtime.send(counter, &"get".into(), &[])?, Value::Int(2));
//! hook.revert()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod chain;
pub mod config;
pub mod error;
pub mod hook;
pub mod interposer;
pub mod introspection;
pub mod proxy;
pub mod shadow;
pub mod strategy;
pub mod validator;

pub use chain::{ChainLink, HookChainRegistry};
pub use config::{ConfigError, InterposeConfig};
pub use error::{InterposeError, InterposeResult};
pub use hook::{Hook, HookState, HookTarget};
pub use interposer::Interposer;
pub use introspection::MethodInfo;
pub use proxy::{HookProxy, ReplacementFactory};
pub use shadow::{ShadowType, ShadowTypeManager};
pub use strategy::{DispatchStrategy, HookScope};
