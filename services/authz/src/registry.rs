//! Name to module lookup shared by a plugin's modules and steps.
//!
//! Each [`crate::AuthzPlugin`] owns one registry and hands clones to the steps
//! it builds, so two plugins in one process never see each other's modules.
use crate::module::PolicyModule;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Arc<RwLock<HashMap<String, Arc<dyn PolicyModule>>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `module` under its own name.
    ///
    /// # What it does
    /// Inserts the module keyed by [`PolicyModule::name`]. A module already
    /// registered under that name is replaced and returned, and a `warn` event
    /// records the replacement.
    ///
    /// # Invariants
    /// - Steps resolve their module on every execution, so a replacement takes
    ///   effect for steps built earlier too.
    pub fn register(&self, module: Arc<dyn PolicyModule>) -> Option<Arc<dyn PolicyModule>> {
        let name = module.name().to_string();
        let previous = self.modules.write().insert(name.clone(), module);
        if previous.is_some() {
            tracing::warn!(module = %name, "replaced registered authz module");
        }
        previous
    }

    /// The module registered as `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<dyn PolicyModule>> {
        self.modules.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn PolicyModule>> {
        self.modules.write().remove(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }
}
