//! Hook chain bookkeeping
//!
//! Several instance hooks on the same object and method stack up in one
//! shadow type slot: the table holds the newest replacement, and every hook
//! remembers the implementation it displaced in its [`ChainLink`]. The
//! [`HookChainRegistry`] maps an installed replacement back to its link so a
//! hook reverted out of order can find the link directly above it and splice
//! itself out.
//!
//! The registry holds weak references only. An entry dies with either the
//! replacement implementation or the hook owning the link.

use dashmap::DashMap;
use interpose_runtime::{ImpId, ImpRef, Implementation};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

static GLOBAL_REGISTRY: Lazy<HookChainRegistry> = Lazy::new(HookChainRegistry::new);

/// Per-hook record of the implementation it displaced
#[derive(Debug, Default)]
pub struct ChainLink {
    stored_original: Mutex<Option<ImpRef>>,
}

impl ChainLink {
    /// Create an empty link
    pub fn new() -> Self {
        Self::default()
    }

    /// Implementation displaced by the hook, if installed
    pub fn original(&self) -> Option<ImpRef> {
        self.stored_original.lock().clone()
    }

    /// Record the displaced implementation
    pub fn set_original(&self, imp: Option<ImpRef>) {
        *self.stored_original.lock() = imp;
    }

    /// Clear the link, returning what it held
    pub fn take_original(&self) -> Option<ImpRef> {
        self.stored_original.lock().take()
    }
}

struct ChainEntry {
    imp: Weak<Implementation>,
    link: Weak<ChainLink>,
}

/// Where a hook sits in a chain
#[derive(Debug)]
pub enum ChainPosition {
    /// The hook's replacement is the table entry
    Topmost,
    /// Another hook's link sits directly above this one
    Below(Arc<ChainLink>),
    /// The hook was not reached from the table entry
    Missing,
}

/// Weak map from replacement implementations to their chain links
pub struct HookChainRegistry {
    entries: DashMap<ImpId, ChainEntry>,
}

impl HookChainRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static HookChainRegistry {
        &GLOBAL_REGISTRY
    }

    /// Associate `link` with the replacement `imp`
    pub fn register(&self, imp: &ImpRef, link: &Arc<ChainLink>) {
        self.prune();
        self.entries.insert(
            imp.id(),
            ChainEntry {
                imp: Arc::downgrade(imp),
                link: Arc::downgrade(link),
            },
        );
        tracing::trace!(imp = %imp.id(), "registered chain link");
    }

    /// Link registered for `imp`, if both are still alive
    pub fn lookup(&self, imp: &ImpRef) -> Option<Arc<ChainLink>> {
        let entry = self.entries.get(&imp.id())?;
        entry.imp.upgrade()?;
        entry.link.upgrade()
    }

    /// Forget the link registered for `imp`
    pub fn unregister(&self, imp: ImpId) {
        self.entries.remove(&imp);
    }

    /// Drop entries whose implementation or link is gone
    pub fn prune(&self) {
        self.entries
            .retain(|_, entry| entry.imp.strong_count() > 0 && entry.link.strong_count() > 0);
    }

    /// Number of entries, dead ones included until the next prune
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Locate `own` in the chain hanging off the table entry `top`
    pub fn position(&self, top: Option<&ImpRef>, own: &Arc<ChainLink>) -> ChainPosition {
        let mut parent: Option<Arc<ChainLink>> = None;
        let mut current = top.cloned();
        while let Some(imp) = current {
            let Some(link) = self.lookup(&imp) else {
                break;
            };
            if Arc::ptr_eq(&link, own) {
                return match parent {
                    Some(parent) => ChainPosition::Below(parent),
                    None => ChainPosition::Topmost,
                };
            }
            current = link.original();
            parent = Some(link);
        }
        ChainPosition::Missing
    }
}

impl Default for HookChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}
