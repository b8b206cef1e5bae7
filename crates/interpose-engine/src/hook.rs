//! Hook state machine
//!
//! ```text
//! pending --apply ok--> active --revert ok--> pending
//!    |                    |
//!    +--apply err--+      +--revert err--+
//!                  v                     v
//!                failed (terminal)    failed
//! ```
//!
//! Applying an active hook or reverting a pending one is a no-op. A failed
//! hook refuses every further transition, and whatever it left in the
//! dispatch table stays there: removing an implementation from a table that
//! no longer looks the way the hook left it could destroy someone else's
//! state.

use crate::chain::{ChainLink, HookChainRegistry};
use crate::error::{InterposeError, InterposeResult};
use crate::interposer::Interposer;
use crate::introspection::{class_label, find_method};
use crate::proxy::{HookProxy, ReplacementFactory};
use crate::strategy::{DispatchStrategy, HookScope, InstanceHookStrategy, StrategyContext, TypeHookStrategy};
use crate::validator;
use interpose_runtime::{ClassId, ImpFn, ImpRef, Implementation, Invocation, MethodId, ObjectId, RuntimeError, Value};
use std::fmt;
use std::sync::Arc;

/// What a hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTarget {
    /// Every instance of a class
    Type(ClassId),
    /// One object
    Instance(ObjectId),
}

/// Lifecycle state of a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookState {
    /// Created or reverted; the replacement is not installed
    Pending,
    /// The replacement is installed
    Active,
    /// A transition failed; no further transitions are allowed
    Failed,
}

impl fmt::Display for HookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookState::Pending => write!(f, "Pending"),
            HookState::Active => write!(f, "Active"),
            HookState::Failed => write!(f, "Failed"),
        }
    }
}

/// A replacement for one method on a class or on one object
pub struct Hook {
    interposer: Interposer,
    class: ClassId,
    method: MethodId,
    state: HookState,
    strategy: DispatchStrategy,
    factory: Arc<ReplacementFactory>,
    proxy: HookProxy,
}

impl Hook {
    /// Prepare a hook in the pending state.
    ///
    /// `factory` receives a [`HookProxy`] and returns the replacement body.
    /// It runs once here, and again only if [`Hook::cleanup`] released the
    /// replacement before the next [`Hook::apply`].
    pub fn new<F, R>(
        interposer: &Interposer,
        target: HookTarget,
        method: impl Into<MethodId>,
        factory: F,
    ) -> InterposeResult<Self>
    where
        F: Fn(HookProxy) -> R + Send + Sync + 'static,
        R: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        let method = method.into();
        let rt = interposer.runtime();

        let class = {
            let shadows = interposer.lock();
            match target {
                HookTarget::Type(class) => validator::check_class(rt, class)?,
                HookTarget::Instance(object) => validator::check_instance(rt, &shadows, object)?,
            }
            match target {
                HookTarget::Type(class) => class,
                HookTarget::Instance(object) => rt.declared_class(object).ok_or_else(|| {
                    InterposeError::UnknownError(format!("Unknown object {}", object))
                })?,
            }
        };

        let info = find_method(rt, class, &method).ok_or_else(|| InterposeError::MethodNotFound {
            class: class_label(rt, class),
            method: method.clone(),
        })?;
        if matches!(target, HookTarget::Type(_)) && info.declaring_class != class {
            return Err(InterposeError::MethodNotDirectlyImplemented {
                class: class_label(rt, class),
                method,
            });
        }

        let factory: Arc<ReplacementFactory> =
            Arc::new(move |proxy: HookProxy| Box::new(factory(proxy)) as Box<ImpFn>);
        let link = Arc::new(ChainLink::new());
        let proxy = HookProxy::new(method.clone(), link.clone(), class);
        let replacement = build_replacement(&factory, &proxy);

        let strategy = match target {
            HookTarget::Type(class) => {
                DispatchStrategy::Type(TypeHookStrategy::new(class, method.clone(), replacement, link))
            }
            HookTarget::Instance(object) => DispatchStrategy::Instance(InstanceHookStrategy::new(
                object,
                class,
                method.clone(),
                replacement,
                link,
            )),
        };

        tracing::trace!(class = %class_label(rt, class), method = %method, scope = %strategy.scope(), "prepared hook");

        Ok(Self {
            interposer: interposer.clone(),
            class,
            method,
            state: HookState::Pending,
            strategy,
            factory,
            proxy,
        })
    }

    /// Install the replacement
    pub fn apply(&mut self) -> InterposeResult<()> {
        self.transition(HookState::Active)
    }

    /// Restore the displaced implementation
    pub fn revert(&mut self) -> InterposeResult<()> {
        self.transition(HookState::Pending)
    }

    fn transition(&mut self, target: HookState) -> InterposeResult<()> {
        let interposer = self.interposer.clone();

        if self.state == HookState::Failed {
            return Err(InterposeError::HookInFailedState {
                class: class_label(interposer.runtime(), self.class),
                method: self.method.clone(),
            });
        }
        if self.state == target {
            return Ok(());
        }

        // The factory may call back into the interposer, so it runs unlocked
        if self.strategy.replacement().is_none() {
            let replacement = build_replacement(&self.factory, &self.proxy);
            self.strategy.set_replacement(replacement);
        }

        let mut shadows = interposer.lock();
        let mut ctx = StrategyContext {
            runtime: interposer.runtime(),
            shadows: &mut *shadows,
            chains: HookChainRegistry::global(),
        };
        let result = if target == HookState::Active {
            self.strategy.install(&mut ctx)
        } else {
            self.strategy.remove(&mut ctx)
        };

        match result {
            Ok(()) => {
                self.state = target;
                tracing::debug!(
                    class = %class_label(interposer.runtime(), self.class),
                    method = %self.method,
                    scope = %self.strategy.scope(),
                    state = %target,
                    "hook transitioned"
                );
                Ok(())
            }
            Err(err) => {
                self.state = HookState::Failed;
                tracing::warn!(
                    class = %class_label(interposer.runtime(), self.class),
                    method = %self.method,
                    scope = %self.strategy.scope(),
                    "hook failed: {}",
                    err
                );
                Err(err)
            }
        }
    }

    /// Release resources according to the current state.
    ///
    /// A pending hook releases its replacement, an active hook keeps it, and
    /// a failed hook leaves it wherever the failed transition left it.
    pub fn cleanup(&mut self) {
        let class = class_label(self.interposer.runtime(), self.class);
        match self.state {
            HookState::Pending => {
                if let Some(imp) = self.strategy.take_replacement() {
                    HookChainRegistry::global().unregister(imp.id());
                    tracing::debug!(class = %class, method = %self.method, imp = %imp.id(), "releasing replacement");
                }
            }
            HookState::Active => {
                if let Some(imp) = self.strategy.replacement() {
                    tracing::debug!(class = %class, method = %self.method, imp = %imp.id(), "keeping replacement");
                }
            }
            HookState::Failed => {
                if let Some(imp) = self.strategy.replacement() {
                    tracing::warn!(class = %class, method = %self.method, imp = %imp.id(), "leaking replacement");
                }
            }
        }
    }

    /// Current state
    pub fn state(&self) -> HookState {
        self.state
    }

    /// Whether the hook applies to a class or one object
    pub fn scope(&self) -> HookScope {
        self.strategy.scope()
    }

    /// Hooked class (the declared class for instance hooks)
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Hooked method
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    /// The replacement body, unless released by [`Hook::cleanup`]
    pub fn replacement(&self) -> Option<&ImpRef> {
        self.strategy.replacement()
    }

    /// The implementation the hook displaces (stored while active, looked up
    /// otherwise)
    pub fn original_implementation(&self) -> Option<ImpRef> {
        self.proxy.original(self.interposer.runtime())
    }

    /// Proxy for the displaced implementation
    pub fn proxy(&self) -> &HookProxy {
        &self.proxy
    }
}

fn build_replacement(factory: &Arc<ReplacementFactory>, proxy: &HookProxy) -> ImpRef {
    Implementation::from_boxed(Some(format!("hook {}", proxy.method())), factory(proxy.clone()))
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = class_label(self.interposer.runtime(), self.class);
        write!(f, "{} hook for {}.{}", self.state, class, self.method)?;
        if self.state != HookState::Active {
            return Ok(());
        }
        if let HookScope::Instance(object) = self.scope() {
            write!(f, " on {}", object)?;
        }
        match self.strategy.stored_original() {
            Some(imp) => write!(f, " (original={})", imp.id()),
            None => write!(f, " (original=nil)"),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("class", &self.class)
            .field("method", &self.method)
            .field("state", &self.state)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl Drop for Hook {
    fn drop(&mut self) {
        self.cleanup();
    }
}
