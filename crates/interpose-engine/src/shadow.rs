//! Shadow types backing instance hooks
//!
//! An instance hook never edits the object's own class. Instead the object
//! is moved onto a private subclass, its shadow type, whose dispatch table
//! carries the instance-specific entries. The shadow reports the original
//! class as its perceived class, so the object still looks unchanged.
//!
//! One shadow exists per hooked object, named
//! `<prefix>_<PerceivedClass>_<object id hex>`. It is reference counted by the
//! hooks installed on it; when the count drops to zero the object is moved
//! back to the shadow's superclass.

use crate::config::InterposeConfig;
use crate::error::{InterposeError, InterposeResult};
use crate::introspection::class_label;
use interpose_runtime::{ClassId, ClassOrigin, ObjectId, ObjectRuntime};
use rustc_hash::FxHashMap;

/// A synthesized subclass owned by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowType {
    /// The synthesized class
    pub class: ClassId,
    /// Registered class name
    pub name: String,
    /// Class the shadow reports itself as
    pub perceived: ClassId,
    /// Class the shadow inherits from, restored on release
    pub superclass: ClassId,
    /// Number of active instance hooks installed on the shadow
    pub installed_hook_count: usize,
    /// Whether the object currently dispatches through the shadow
    pub attached: bool,
}

/// Creates, tracks and retires shadow types, keyed by object
#[derive(Debug)]
pub struct ShadowTypeManager {
    config: InterposeConfig,
    shadows: FxHashMap<ObjectId, ShadowType>,
}

impl ShadowTypeManager {
    /// Create a manager using `config` for naming and disposal
    pub fn new(config: InterposeConfig) -> Self {
        Self {
            config,
            shadows: FxHashMap::default(),
        }
    }

    /// Shadow type name for an object of `perceived` class
    pub fn shadow_name(&self, perceived_name: &str, object: ObjectId) -> String {
        format!("{}_{}_{:04x}", self.config.shadow_prefix, perceived_name, object.0)
    }

    /// Return the object's shadow class, creating and attaching it if needed
    pub fn ensure_shadow(&mut self, rt: &dyn ObjectRuntime, object: ObjectId) -> InterposeResult<ClassId> {
        if let Some(shadow) = self.shadows.get_mut(&object) {
            if !shadow.attached {
                rt.set_object_class(object, shadow.class)?;
                shadow.attached = true;
            } else if let Some(actual) = rt.object_class(object).filter(|&actual| actual != shadow.class) {
                return Err(InterposeError::UnexpectedForeignShadowType {
                    subject: format!("object {}", object),
                    actual: class_label(rt, actual),
                });
            }
            tracing::debug!(class = %shadow.name, object = %object, "reused shadow type");
            return Ok(shadow.class);
        }

        let actual = rt
            .object_class(object)
            .ok_or_else(|| InterposeError::UnknownError(format!("Unknown object {}", object)))?;
        let perceived = rt.perceived_class(actual).unwrap_or(actual);
        let name = self.shadow_name(&class_label(rt, perceived), object);
        let creation_failed = |reason: String| InterposeError::ShadowTypeCreationFailed {
            class: class_label(rt, actual),
            name: name.clone(),
            reason,
        };

        if rt.class_by_name(&name).is_some() {
            return Err(creation_failed("name is taken by a foreign class".to_string()));
        }
        let class = rt
            .allocate_subclass(actual, &name, ClassOrigin::Synthesized)
            .map_err(|e| creation_failed(e.to_string()))?;
        rt.set_perceived_class(class, perceived)
            .map_err(|e| creation_failed(e.to_string()))?;
        let previous = rt.set_object_class(object, class)?;

        tracing::debug!(
            class = %name,
            object = %object,
            previous = %class_label(rt, previous),
            "created shadow type"
        );

        self.shadows.insert(
            object,
            ShadowType {
                class,
                name,
                perceived,
                superclass: actual,
                installed_hook_count: 0,
                attached: true,
            },
        );
        Ok(class)
    }

    /// Count one more hook installed on the object's shadow
    pub fn retain(&mut self, object: ObjectId) {
        if let Some(shadow) = self.shadows.get_mut(&object) {
            shadow.installed_hook_count += 1;
        }
    }

    /// Count one hook fewer, detaching the shadow when none remain
    pub fn release(&mut self, rt: &dyn ObjectRuntime, object: ObjectId) -> InterposeResult<()> {
        let Some(shadow) = self.shadows.get_mut(&object) else {
            return Ok(());
        };
        shadow.installed_hook_count = shadow.installed_hook_count.saturating_sub(1);
        if shadow.installed_hook_count == 0 {
            self.detach(rt, object)?;
        }
        Ok(())
    }

    /// Detach a shadow no hook ended up using, e.g. after a failed install
    pub fn discard_if_unused(&mut self, rt: &dyn ObjectRuntime, object: ObjectId) -> InterposeResult<()> {
        match self.shadows.get(&object) {
            Some(shadow) if shadow.installed_hook_count == 0 && shadow.attached => self.detach(rt, object),
            _ => Ok(()),
        }
    }

    fn detach(&mut self, rt: &dyn ObjectRuntime, object: ObjectId) -> InterposeResult<()> {
        let Some(shadow) = self.shadows.get_mut(&object) else {
            return Ok(());
        };
        if shadow.attached {
            if rt.object_class(object) == Some(shadow.class) {
                rt.set_object_class(object, shadow.superclass)?;
            }
            shadow.attached = false;
            tracing::debug!(
                class = %shadow.name,
                object = %object,
                restored = %class_label(rt, shadow.superclass),
                "removed shadow type"
            );
        }

        if self.config.dispose_shadow_types {
            if rt.dispose_class(shadow.class) {
                tracing::debug!(class = %shadow.name, "disposed shadow type");
                self.shadows.remove(&object);
            } else {
                tracing::warn!(class = %shadow.name, "shadow type could not be disposed, keeping it detached");
            }
        }
        Ok(())
    }

    /// The object's shadow, attached or not
    pub fn shadow(&self, object: ObjectId) -> Option<&ShadowType> {
        self.shadows.get(&object)
    }

    /// The shadow class the object currently dispatches through
    pub fn attached_class(&self, object: ObjectId) -> Option<ClassId> {
        self.shadows
            .get(&object)
            .filter(|shadow| shadow.attached)
            .map(|shadow| shadow.class)
    }

    /// Whether `class` is the attached shadow of `object`
    pub fn owns(&self, object: ObjectId, class: ClassId) -> bool {
        self.attached_class(object) == Some(class)
    }

    /// Number of hooks installed on the object's shadow
    pub fn hook_count(&self, object: ObjectId) -> usize {
        self.shadows
            .get(&object)
            .map(|shadow| shadow.installed_hook_count)
            .unwrap_or(0)
    }

    /// Settings in use
    pub fn config(&self) -> &InterposeConfig {
        &self.config
    }
}
