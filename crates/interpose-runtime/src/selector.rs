//! Method identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name-like key addressing one dispatchable operation, independent of the
/// class that defines it. Cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(Arc<str>);

impl MethodId {
    /// Create a method identifier
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The identifier's name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MethodId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MethodId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&MethodId> for MethodId {
    fn from(id: &MethodId) -> Self {
        id.clone()
    }
}

impl AsRef<str> for MethodId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({})", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
