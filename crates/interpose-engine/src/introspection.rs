//! Class introspection
//!
//! Read-only queries against an [`ObjectRuntime`], used to validate a hook
//! before any dispatch table is touched. Nothing here mutates the runtime,
//! and failures surface as empty results.

use interpose_runtime::{ClassId, ImpRef, MethodEntry, MethodId, ObjectRuntime, Signature};

/// A method found somewhere in a class's ancestry
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Method identifier
    pub method: MethodId,
    /// Nearest class declaring the method
    pub declaring_class: ClassId,
    /// Calling signature
    pub signature: Signature,
    /// Implementation at the nearest declaration (`None` when abstract)
    pub implementation: Option<ImpRef>,
}

impl MethodInfo {
    fn from_entry(declaring_class: ClassId, entry: MethodEntry) -> Self {
        Self {
            method: entry.method,
            declaring_class,
            signature: entry.signature,
            implementation: entry.implementation,
        }
    }
}

/// Find the nearest declaration of `method`, starting at `class` and
/// ascending the inheritance chain
pub fn find_method(rt: &dyn ObjectRuntime, class: ClassId, method: &MethodId) -> Option<MethodInfo> {
    let mut current = Some(class);
    while let Some(id) = current {
        if let Some(entry) = rt.method_entry(id, method) {
            return Some(MethodInfo::from_entry(id, entry));
        }
        current = rt.superclass(id);
    }
    None
}

/// Whether `class` itself declares `method` (ancestors are not searched)
pub fn directly_implements(rt: &dyn ObjectRuntime, class: ClassId, method: &MethodId) -> bool {
    rt.declared_methods(class)
        .iter()
        .any(|entry| &entry.method == method)
}

/// Walk to the implementation `class` would dispatch `method` to
///
/// Returns `None` when the method is missing or its nearest declaration is
/// abstract.
pub fn nearest_implementation(
    rt: &dyn ObjectRuntime,
    class: ClassId,
    method: &MethodId,
) -> Option<ImpRef> {
    find_method(rt, class, method).and_then(|info| info.implementation)
}

/// Calling signature of `method` as seen from `class`
pub fn method_signature(rt: &dyn ObjectRuntime, class: ClassId, method: &MethodId) -> Option<Signature> {
    find_method(rt, class, method).map(|info| info.signature)
}

/// `class` followed by its ancestors, nearest first
pub fn class_hierarchy(rt: &dyn ObjectRuntime, class: ClassId) -> Vec<ClassId> {
    let mut chain = Vec::new();
    let mut current = Some(class);
    while let Some(id) = current {
        chain.push(id);
        current = rt.superclass(id);
    }
    chain
}

/// Printable class name, falling back to the class id
pub fn class_label(rt: &dyn ObjectRuntime, class: ClassId) -> String {
    rt.class_name(class).unwrap_or_else(|| class.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpose_runtime::{Runtime, Value, ValueKind};

    fn hierarchy() -> (Runtime, ClassId, ClassId, ClassId) {
        let rt = Runtime::new();
        let base = rt
            .define_class("Shape")
            .abstract_method("area", Signature::getter(ValueKind::Float))
            .method("name", Signature::getter(ValueKind::Str), |_| Ok(Value::str("shape")))
            .build()
            .unwrap();
        let square = rt
            .define_class("Square")
            .extends(base)
            .method("area", Signature::getter(ValueKind::Float), |_| Ok(Value::Float(4.0)))
            .build()
            .unwrap();
        let small = rt.define_class("SmallSquare").extends(square).build().unwrap();
        (rt, base, square, small)
    }

    #[test]
    fn test_find_method_walks_ancestry() {
        let (rt, base, square, small) = hierarchy();
        let info = find_method(&rt, small, &"name".into()).unwrap();
        assert_eq!(info.declaring_class, base);
        let info = find_method(&rt, small, &"area".into()).unwrap();
        assert_eq!(info.declaring_class, square);
        assert!(find_method(&rt, small, &"volume".into()).is_none());
    }

    #[test]
    fn test_directly_implements_ignores_ancestors() {
        let (rt, _, square, small) = hierarchy();
        assert!(directly_implements(&rt, square, &"area".into()));
        assert!(!directly_implements(&rt, small, &"area".into()));
        assert!(!directly_implements(&rt, square, &"name".into()));
    }

    #[test]
    fn test_nearest_implementation_stops_at_abstract() {
        let (rt, base, _, small) = hierarchy();
        assert!(nearest_implementation(&rt, small, &"area".into()).is_some());
        assert!(nearest_implementation(&rt, base, &"area".into()).is_none());
    }

    #[test]
    fn test_hierarchy_and_signature() {
        let (rt, base, square, small) = hierarchy();
        assert_eq!(class_hierarchy(&rt, small), vec![small, square, base]);
        assert_eq!(
            method_signature(&rt, small, &"name".into()),
            Some(Signature::getter(ValueKind::Str))
        );
        assert_eq!(class_label(&rt, square), "Square");
        assert_eq!(class_label(&rt, ClassId(99)), "#99");
    }
}
