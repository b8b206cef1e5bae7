//! Dispatch strategies
//!
//! A strategy knows how to install and remove one replacement for one
//! (class, method) pair:
//! - [`TypeHookStrategy`] edits the class's own dispatch table, affecting
//!   every instance.
//! - [`InstanceHookStrategy`] edits the table of a per-object shadow type.

mod instance_strategy;
mod type_strategy;

pub use instance_strategy::InstanceHookStrategy;
pub use type_strategy::TypeHookStrategy;

use crate::chain::HookChainRegistry;
use crate::error::{InterposeError, InterposeResult};
use crate::shadow::ShadowTypeManager;
use interpose_runtime::{ImpRef, MethodId, ObjectId, ObjectRuntime};
use std::fmt;

/// What a hook applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookScope {
    /// Every instance of the class
    Type,
    /// One object
    Instance(ObjectId),
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookScope::Type => write!(f, "type"),
            HookScope::Instance(object) => write!(f, "instance {}", object),
        }
    }
}

/// Everything a strategy may touch during a transition
pub struct StrategyContext<'a> {
    /// Runtime whose tables are edited
    pub runtime: &'a dyn ObjectRuntime,
    /// Shadow types of the owning interposer
    pub shadows: &'a mut ShadowTypeManager,
    /// Chain link registry
    pub chains: &'a HookChainRegistry,
}

/// Type-level or instance-level installation
#[derive(Debug)]
pub enum DispatchStrategy {
    /// Edits the class's table
    Type(TypeHookStrategy),
    /// Edits a per-object shadow type's table
    Instance(InstanceHookStrategy),
}

impl DispatchStrategy {
    /// What the strategy applies to
    pub fn scope(&self) -> HookScope {
        match self {
            DispatchStrategy::Type(_) => HookScope::Type,
            DispatchStrategy::Instance(s) => HookScope::Instance(s.object()),
        }
    }

    /// Swap the replacement in
    pub fn install(&mut self, ctx: &mut StrategyContext<'_>) -> InterposeResult<()> {
        match self {
            DispatchStrategy::Type(s) => s.install(ctx.runtime),
            DispatchStrategy::Instance(s) => s.install(ctx.runtime, ctx.shadows, ctx.chains),
        }
    }

    /// Swap the displaced implementation back
    pub fn remove(&mut self, ctx: &mut StrategyContext<'_>) -> InterposeResult<()> {
        match self {
            DispatchStrategy::Type(s) => s.remove(ctx.runtime),
            DispatchStrategy::Instance(s) => s.remove(ctx.runtime, ctx.shadows, ctx.chains),
        }
    }

    /// The hooked method
    pub fn method(&self) -> &MethodId {
        match self {
            DispatchStrategy::Type(s) => s.method(),
            DispatchStrategy::Instance(s) => s.method(),
        }
    }

    /// The replacement, unless it was released
    pub fn replacement(&self) -> Option<&ImpRef> {
        match self {
            DispatchStrategy::Type(s) => s.replacement.as_ref(),
            DispatchStrategy::Instance(s) => s.replacement.as_ref(),
        }
    }

    /// Provide a (new) replacement
    pub fn set_replacement(&mut self, imp: ImpRef) {
        match self {
            DispatchStrategy::Type(s) => s.replacement = Some(imp),
            DispatchStrategy::Instance(s) => s.replacement = Some(imp),
        }
    }

    /// Release the replacement
    pub fn take_replacement(&mut self) -> Option<ImpRef> {
        match self {
            DispatchStrategy::Type(s) => s.replacement.take(),
            DispatchStrategy::Instance(s) => s.replacement.take(),
        }
    }

    /// Implementation the installed replacement displaced
    pub fn stored_original(&self) -> Option<ImpRef> {
        match self {
            DispatchStrategy::Type(s) => s.link.original(),
            DispatchStrategy::Instance(s) => s.link.original(),
        }
    }
}

fn released(method: &MethodId) -> InterposeError {
    InterposeError::UnknownError(format!("Replacement for {} was released", method))
}
