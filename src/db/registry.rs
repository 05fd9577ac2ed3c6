//! Manager registry
//!
//! Reference properties name a target class; decoding one asks that
//! class's manager to load the object. The registry is where managers make
//! themselves findable by class name.

use crate::error::{ManagerError, ManagerResult};
use crate::model::Record;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Weak};

/// Something that can load a persisted object by id
#[async_trait]
pub trait ObjectResolver: Send + Sync {
    /// Load the object's values
    ///
    /// # Errors
    /// Returns `ManagerError::ObjectNotFound` if no row has this id
    async fn resolve(&self, id: &str) -> ManagerResult<Record>;
}

static GLOBAL: LazyLock<Arc<ManagerRegistry>> = LazyLock::new(|| Arc::new(ManagerRegistry::new()));

/// Class name → manager lookup table.
///
/// Entries are weak so a manager holding the registry does not keep
/// itself alive through it.
#[derive(Default)]
pub struct ManagerRegistry {
    resolvers: RwLock<HashMap<String, Weak<dyn ObjectResolver>>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by managers that are not given one
    pub fn global() -> Arc<ManagerRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Make `resolver` the manager for `class`, replacing any previous one
    pub fn register<R>(&self, class: impl Into<String>, resolver: &Arc<R>)
    where
        R: ObjectResolver + 'static,
    {
        let weak: Weak<dyn ObjectResolver> = Arc::downgrade(resolver) as Weak<dyn ObjectResolver>;
        self.resolvers.write().insert(class.into(), weak);
    }

    pub fn unregister(&self, class: &str) {
        self.resolvers.write().remove(class);
    }

    /// Whether a live manager is registered for `class`
    pub fn contains(&self, class: &str) -> bool {
        self.lookup(class).is_some()
    }

    fn lookup(&self, class: &str) -> Option<Arc<dyn ObjectResolver>> {
        self.resolvers.read().get(class).and_then(Weak::upgrade)
    }

    /// Load `id` through the manager registered for `class`
    pub async fn resolve(&self, class: &str, id: &str) -> ManagerResult<Record> {
        let resolver = self.lookup(class).ok_or_else(|| {
            ManagerError::Persistence(format!("No manager registered for class {}", class))
        })?;
        resolver.resolve(id).await
    }
}

impl std::fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let classes: Vec<String> = self.resolvers.read().keys().cloned().collect();
        f.debug_struct("ManagerRegistry")
            .field("classes", &classes)
            .finish()
    }
}
