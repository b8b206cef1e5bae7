//! Class registry for managing runtime class metadata

use crate::error::RuntimeError;
use crate::object::{Class, ClassId};
use rustc_hash::FxHashMap;

/// Class registry for the runtime
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Classes indexed by ID
    classes: Vec<Class>,
    /// Class name to ID mapping (disposed classes are unmapped)
    name_to_id: FxHashMap<String, ClassId>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new class.
    ///
    /// The class's id is overwritten with the next free slot.
    pub fn register_class(&mut self, mut class: Class) -> Result<ClassId, RuntimeError> {
        if self.name_to_id.contains_key(&class.name) {
            return Err(RuntimeError::ClassNameTaken(class.name));
        }
        let id = self.next_class_id();
        class.id = id;
        self.name_to_id.insert(class.name.clone(), id);
        self.classes.push(class);
        Ok(id)
    }

    /// Get class by ID
    pub fn get_class(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(id.0)
    }

    /// Get mutable class by ID
    pub fn get_class_mut(&mut self, id: ClassId) -> Option<&mut Class> {
        self.classes.get_mut(id.0)
    }

    /// Get a live class by ID, or an error naming it
    pub fn live_class(&self, id: ClassId) -> Result<&Class, RuntimeError> {
        match self.classes.get(id.0) {
            Some(class) if class.disposed => Err(RuntimeError::ClassDisposed(class.name.clone())),
            Some(class) => Ok(class),
            None => Err(RuntimeError::UnknownClass(id.to_string())),
        }
    }

    /// Get a live mutable class by ID, or an error naming it
    pub fn live_class_mut(&mut self, id: ClassId) -> Result<&mut Class, RuntimeError> {
        match self.classes.get_mut(id.0) {
            Some(class) if class.disposed => Err(RuntimeError::ClassDisposed(class.name.clone())),
            Some(class) => Ok(class),
            None => Err(RuntimeError::UnknownClass(id.to_string())),
        }
    }

    /// Get class by name
    pub fn get_class_by_name(&self, name: &str) -> Option<&Class> {
        self.name_to_id
            .get(name)
            .and_then(|id| self.classes.get(id.0))
    }

    /// Mark a class disposed and free its name.
    ///
    /// Slots are never reused, so ids held elsewhere stay unambiguous.
    pub fn dispose_class(&mut self, id: ClassId) -> bool {
        let Some(class) = self.classes.get_mut(id.0) else {
            return false;
        };
        if class.disposed {
            return false;
        }
        class.disposed = true;
        self.name_to_id.remove(&class.name);
        true
    }

    /// Get next available class ID
    pub fn next_class_id(&self) -> ClassId {
        ClassId(self.classes.len())
    }

    /// Number of registered classes, disposed ones included
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class was ever registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over live classes
    pub fn iter(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter().filter(|c| !c.disposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str) -> Class {
        Class::new(ClassId(0), name.to_string())
    }

    #[test]
    fn test_register_class() {
        let mut registry = ClassRegistry::new();
        let id = registry.register_class(class("Point")).unwrap();
        assert_eq!(id, ClassId(0));
    }

    #[test]
    fn test_get_class_by_name() {
        let mut registry = ClassRegistry::new();
        registry.register_class(class("Point")).unwrap();
        registry.register_class(class("Circle")).unwrap();

        let retrieved = registry.get_class_by_name("Circle").unwrap();
        assert_eq!(retrieved.id, ClassId(1));
        assert_eq!(registry.next_class_id(), ClassId(2));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ClassRegistry::new();
        registry.register_class(class("Point")).unwrap();
        assert_eq!(
            registry.register_class(class("Point")),
            Err(RuntimeError::ClassNameTaken("Point".to_string()))
        );
    }

    #[test]
    fn test_dispose_frees_name_but_not_slot() {
        let mut registry = ClassRegistry::new();
        let id = registry.register_class(class("Temp")).unwrap();

        assert!(registry.dispose_class(id));
        assert!(!registry.dispose_class(id));
        assert!(registry.get_class_by_name("Temp").is_none());
        assert!(matches!(registry.live_class(id), Err(RuntimeError::ClassDisposed(_))));

        let again = registry.register_class(class("Temp")).unwrap();
        assert_ne!(again, id);
        assert_eq!(registry.iter().count(), 1);
    }
}
