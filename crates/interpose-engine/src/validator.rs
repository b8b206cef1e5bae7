//! Conflict detection against foreign runtime subclassing
//!
//! Observation mechanisms and other interception libraries also move
//! objects onto synthesized subclasses. Editing their tables or swapping
//! the object's class back out from under them corrupts their state, so the
//! engine refuses to touch such objects or classes at all.

use crate::error::{InterposeError, InterposeResult};
use crate::introspection::class_label;
use crate::shadow::ShadowTypeManager;
use interpose_runtime::{ClassId, ClassOrigin, ObjectId, ObjectRuntime};

/// Check that `object` dispatches through the shadow type `shadows` attached
/// to it, or through its declared class when it has none
pub fn check_instance(
    rt: &dyn ObjectRuntime,
    shadows: &ShadowTypeManager,
    object: ObjectId,
) -> InterposeResult<()> {
    let actual = rt
        .object_class(object)
        .ok_or_else(|| InterposeError::UnknownError(format!("Unknown object {}", object)))?;

    // An attached shadow must stay the dispatch class; otherwise edits to its
    // table would never be reached
    let expected = shadows.attached_class(object).or_else(|| rt.declared_class(object));
    if expected == Some(actual) {
        return Ok(());
    }

    let subject = format!("object {}", object);
    let err = if rt.is_observed(object) {
        InterposeError::ExternalObservationDetected { subject }
    } else {
        InterposeError::UnexpectedForeignShadowType {
            subject,
            actual: class_label(rt, actual),
        }
    };
    tracing::warn!(object = %object, class = %class_label(rt, actual), "refusing to hook: {}", err);
    Err(err)
}

/// Check that `class` was declared by the program rather than synthesized
/// at runtime
pub fn check_class(rt: &dyn ObjectRuntime, class: ClassId) -> InterposeResult<()> {
    let origin = rt
        .class_origin(class)
        .ok_or_else(|| InterposeError::UnknownError(format!("Unknown class {}", class)))?;
    let name = class_label(rt, class);
    let subject = format!("class {}", name);
    match origin {
        ClassOrigin::Declared => Ok(()),
        ClassOrigin::Observation => Err(InterposeError::ExternalObservationDetected { subject }),
        ClassOrigin::Synthesized => Err(InterposeError::UnexpectedForeignShadowType {
            subject,
            actual: name,
        }),
    }
}
