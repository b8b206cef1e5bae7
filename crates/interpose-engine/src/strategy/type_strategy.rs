use super::released;
use crate::chain::ChainLink;
use crate::error::{InterposeError, InterposeResult};
use crate::introspection::{class_label, find_method};
use interpose_runtime::{same_imp, ClassId, ImpRef, MethodId, ObjectRuntime};
use std::sync::Arc;

/// Replaces a method in the hooked class's own table
///
/// Only methods declared directly on the class can be hooked: tables cannot
/// drop entries, so a hook on an inherited method could never be reverted to
/// "not declared here".
#[derive(Debug)]
pub struct TypeHookStrategy {
    class: ClassId,
    method: MethodId,
    pub(super) replacement: Option<ImpRef>,
    /// Holds the displaced implementation; shared with the hook's proxy,
    /// which reads it from inside the running replacement
    pub(super) link: Arc<ChainLink>,
}

impl TypeHookStrategy {
    /// Create a strategy for `class.method`
    pub fn new(class: ClassId, method: MethodId, replacement: ImpRef, link: Arc<ChainLink>) -> Self {
        Self {
            class,
            method,
            replacement: Some(replacement),
            link,
        }
    }

    /// Hooked class
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Hooked method
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    pub(super) fn install(&mut self, rt: &dyn ObjectRuntime) -> InterposeResult<()> {
        let replacement = self.replacement.clone().ok_or_else(|| released(&self.method))?;
        let class_name = class_label(rt, self.class);

        let info = find_method(rt, self.class, &self.method).ok_or_else(|| {
            InterposeError::MethodNotFound {
                class: class_name.clone(),
                method: self.method.clone(),
            }
        })?;
        if info.declaring_class != self.class {
            return Err(InterposeError::MethodNotDirectlyImplemented {
                class: class_name,
                method: self.method.clone(),
            });
        }
        let not_found = || InterposeError::ImplementationNotFound {
            class: class_name.clone(),
            method: self.method.clone(),
        };
        if info.implementation.is_none() {
            return Err(not_found());
        }

        let previous = rt
            .replace_method(self.class, &self.method, replacement.clone(), &info.signature)?
            .ok_or_else(not_found)?;

        tracing::debug!(
            class = %class_name,
            method = %self.method,
            original = %previous.id(),
            imp = %replacement.id(),
            "swapped in type hook"
        );
        self.link.set_original(Some(previous));
        Ok(())
    }

    pub(super) fn remove(&mut self, rt: &dyn ObjectRuntime) -> InterposeResult<()> {
        let replacement = self.replacement.clone().ok_or_else(|| released(&self.method))?;
        let class_name = class_label(rt, self.class);
        let original = self.link.original().ok_or_else(|| {
            InterposeError::UnknownError(format!(
                "No stored original for {}.{}",
                class_name, self.method
            ))
        })?;
        let entry = rt.method_entry(self.class, &self.method).ok_or_else(|| {
            InterposeError::MethodNotFound {
                class: class_name.clone(),
                method: self.method.clone(),
            }
        })?;

        let corrupted = |found: Option<&ImpRef>| InterposeError::RevertCorrupted {
            class: class_name.clone(),
            method: self.method.clone(),
            found: found.map(|imp| imp.id()),
        };

        // Checked before the swap: an unexpected entry stays in place
        if !same_imp(entry.implementation.as_ref(), Some(&replacement)) {
            return Err(corrupted(entry.implementation.as_ref()));
        }
        let displaced = rt.replace_method(self.class, &self.method, original.clone(), &entry.signature)?;
        if !same_imp(displaced.as_ref(), Some(&replacement)) {
            return Err(corrupted(displaced.as_ref()));
        }

        tracing::debug!(
            class = %class_name,
            method = %self.method,
            imp = %original.id(),
            "restored type hook original"
        );
        self.link.take_original();
        Ok(())
    }
}
