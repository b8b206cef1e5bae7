//! Object model and class system

use crate::imp::ImpRef;
use crate::selector::MethodId;
use crate::value::{Signature, Value};
use rustc_hash::FxHashMap;
use std::fmt;

/// Class ID (index into the runtime class registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique object ID, never reused within one runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Who brought a class into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassOrigin {
    /// Defined up front by the program
    Declared,
    /// Synthesized at runtime by an interception library
    Synthesized,
    /// Synthesized at runtime by the observation mechanism
    Observation,
}

impl ClassOrigin {
    /// Whether the class was created at runtime
    pub fn is_synthesized(self) -> bool {
        !matches!(self, ClassOrigin::Declared)
    }
}

/// One slot of a method table
#[derive(Debug, Clone)]
pub struct MethodEntry {
    /// Method identifier
    pub method: MethodId,
    /// Calling signature
    pub signature: Signature,
    /// Current implementation (`None` for abstract slots)
    pub implementation: Option<ImpRef>,
}

impl MethodEntry {
    /// Whether the slot has no implementation
    pub fn is_abstract(&self) -> bool {
        self.implementation.is_none()
    }
}

/// Per-class dispatch table
///
/// Entries can be added or have their implementation swapped, never removed.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    /// Entries in declaration order
    entries: Vec<MethodEntry>,
}

impl MethodTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a method (appends to end, or overwrites an existing slot)
    pub fn declare(&mut self, method: MethodId, signature: Signature, implementation: Option<ImpRef>) {
        match self.position(&method) {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.signature = signature;
                entry.implementation = implementation;
            }
            None => self.entries.push(MethodEntry {
                method,
                signature,
                implementation,
            }),
        }
    }

    /// Get the entry for a method declared directly in this table
    pub fn get(&self, method: &MethodId) -> Option<&MethodEntry> {
        self.entries.iter().find(|e| &e.method == method)
    }

    /// Whether this table declares the method
    pub fn contains(&self, method: &MethodId) -> bool {
        self.position(method).is_some()
    }

    /// Swap in a new implementation, adding the slot if missing.
    ///
    /// Returns the implementation that was displaced.
    pub fn replace(
        &mut self,
        method: &MethodId,
        implementation: ImpRef,
        signature: &Signature,
    ) -> Option<ImpRef> {
        match self.position(method) {
            Some(index) => self.entries[index].implementation.replace(implementation),
            None => {
                self.entries.push(MethodEntry {
                    method: method.clone(),
                    signature: signature.clone(),
                    implementation: Some(implementation),
                });
                None
            }
        }
    }

    /// Iterate over entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &MethodEntry> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, method: &MethodId) -> Option<usize> {
        self.entries.iter().position(|e| &e.method == method)
    }
}

/// Class definition metadata
#[derive(Debug, Clone)]
pub struct Class {
    /// Class ID (unique identifier)
    pub id: ClassId,
    /// Class name
    pub name: String,
    /// Parent class ID (None for root classes)
    pub parent: Option<ClassId>,
    /// Dispatch table of directly declared methods
    pub methods: MethodTable,
    /// How the class came to exist
    pub origin: ClassOrigin,
    /// Class this one reports itself as (synthesized classes only)
    pub perceived: Option<ClassId>,
    /// Whether the class was disposed
    pub disposed: bool,
}

impl Class {
    /// Create a new root class
    pub fn new(id: ClassId, name: String) -> Self {
        Self {
            id,
            name,
            parent: None,
            methods: MethodTable::new(),
            origin: ClassOrigin::Declared,
            perceived: None,
            disposed: false,
        }
    }

    /// Create a new class with parent
    pub fn with_parent(id: ClassId, name: String, parent: ClassId) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(id, name)
        }
    }

    /// The class this one reports itself as
    pub fn perceived_class(&self) -> ClassId {
        self.perceived.unwrap_or(self.id)
    }
}

/// Object instance
#[derive(Debug, Clone)]
pub struct Object {
    /// Unique object ID
    pub id: ObjectId,
    /// Class the object was instantiated as
    pub declared_class: ClassId,
    /// Class currently used for dispatch
    pub class: ClassId,
    /// Named field values
    pub fields: FxHashMap<String, Value>,
}

impl Object {
    /// Create a new object with no fields set
    pub fn new(id: ObjectId, class: ClassId) -> Self {
        Self {
            id,
            declared_class: class,
            class,
            fields: FxHashMap::default(),
        }
    }

    /// Get a field value
    pub fn get_field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Set a field value
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::Implementation;
    use crate::value::ValueKind;

    #[test]
    fn test_table_replace_returns_previous() {
        let mut table = MethodTable::new();
        let get = MethodId::new("get");
        let first = Implementation::new(|_| Ok(Value::Int(1)));
        let second = Implementation::new(|_| Ok(Value::Int(2)));
        let sig = Signature::getter(ValueKind::Int);

        table.declare(get.clone(), sig.clone(), Some(first.clone()));
        let previous = table.replace(&get, second.clone(), &sig);
        assert_eq!(previous.map(|i| i.id()), Some(first.id()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_table_replace_adds_missing_slot() {
        let mut table = MethodTable::new();
        let get = MethodId::new("get");
        let imp = Implementation::new(|_| Ok(Value::Int(1)));

        assert!(table.replace(&get, imp, &Signature::getter(ValueKind::Int)).is_none());
        assert!(table.contains(&get));
    }

    #[test]
    fn test_abstract_entry() {
        let mut table = MethodTable::new();
        table.declare(MethodId::new("area"), Signature::getter(ValueKind::Float), None);
        assert!(table.get(&MethodId::new("area")).unwrap().is_abstract());
    }

    #[test]
    fn test_perceived_class_defaults_to_self() {
        let mut class = Class::with_parent(ClassId(3), "Shadow".to_string(), ClassId(1));
        assert_eq!(class.perceived_class(), ClassId(3));
        class.perceived = Some(ClassId(1));
        assert_eq!(class.perceived_class(), ClassId(1));
    }
}
