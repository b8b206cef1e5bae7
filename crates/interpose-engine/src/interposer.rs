//! Engine entry point
//!
//! An [`Interposer`] binds the engine to one object runtime. It owns the
//! shadow types it creates and serializes every hook transition on that
//! runtime behind a single lock, since reading, validating and swapping a
//! table entry is not atomic at the runtime level.
//!
//! Use one interposer per runtime: shadow types created by another
//! interposer are foreign to this one.

use crate::config::{ConfigError, InterposeConfig};
use crate::error::InterposeResult;
use crate::hook::{Hook, HookTarget};
use crate::proxy::HookProxy;
use crate::shadow::{ShadowType, ShadowTypeManager};
use interpose_runtime::{ClassId, Invocation, MethodId, ObjectId, ObjectRuntime, RuntimeError, Value};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

struct InterposerInner {
    runtime: Arc<dyn ObjectRuntime>,
    /// Shadow types, doubling as the transition lock
    shadows: Mutex<ShadowTypeManager>,
}

/// Handle to the interception engine for one runtime
#[derive(Clone)]
pub struct Interposer {
    inner: Arc<InterposerInner>,
}

impl Interposer {
    /// Create an interposer with default settings
    pub fn new(runtime: Arc<dyn ObjectRuntime>) -> Self {
        Self::with_config(runtime, InterposeConfig::default())
    }

    /// Create an interposer with explicit settings
    pub fn with_config(runtime: Arc<dyn ObjectRuntime>, config: InterposeConfig) -> Self {
        Self {
            inner: Arc::new(InterposerInner {
                runtime,
                shadows: Mutex::new(ShadowTypeManager::new(config)),
            }),
        }
    }

    /// Create an interposer with settings loaded from a TOML file
    pub fn from_config_file(runtime: Arc<dyn ObjectRuntime>, path: &Path) -> Result<Self, ConfigError> {
        let config = InterposeConfig::load(path)?;
        Ok(Self::with_config(runtime, config))
    }

    /// The runtime whose tables are edited
    pub fn runtime(&self) -> &dyn ObjectRuntime {
        self.inner.runtime.as_ref()
    }

    /// Settings in use
    pub fn config(&self) -> InterposeConfig {
        self.lock().config().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ShadowTypeManager> {
        self.inner.shadows.lock()
    }

    /// Prepare a pending hook on `target`
    pub fn prepare_hook<F, R>(
        &self,
        target: HookTarget,
        method: impl Into<MethodId>,
        factory: F,
    ) -> InterposeResult<Hook>
    where
        F: Fn(HookProxy) -> R + Send + Sync + 'static,
        R: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Hook::new(self, target, method, factory)
    }

    /// Prepare a hook and apply it right away
    pub fn apply_hook<F, R>(
        &self,
        target: HookTarget,
        method: impl Into<MethodId>,
        factory: F,
    ) -> InterposeResult<Hook>
    where
        F: Fn(HookProxy) -> R + Send + Sync + 'static,
        R: Fn(&Invocation<'_>) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        let mut hook = Hook::new(self, target, method, factory)?;
        hook.apply()?;
        Ok(hook)
    }

    /// The shadow type this interposer created for `object`, attached or not
    pub fn shadow_type(&self, object: ObjectId) -> Option<ShadowType> {
        self.lock().shadow(object).cloned()
    }

    /// The shadow class `object` currently dispatches through
    pub fn shadow_class(&self, object: ObjectId) -> Option<ClassId> {
        self.lock().attached_class(object)
    }

    /// Number of instance hooks active on `object`
    pub fn hook_count(&self, object: ObjectId) -> usize {
        self.lock().hook_count(object)
    }
}

impl fmt::Debug for Interposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Interposer");
        match self.inner.shadows.try_lock() {
            Some(shadows) => out.field("shadows", &*shadows),
            None => out.field("shadows", &"<locked>"),
        };
        out.finish()
    }
}
