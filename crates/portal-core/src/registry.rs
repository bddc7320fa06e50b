// ── Module registry ──
//
// Holds modules in registration order and maps routing keys to their
// owner. The first module to claim a routing key keeps it; later claims
// are logged and ignored.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::module::Module;

#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
    by_name: HashMap<&'static str, usize>,
    by_route: HashMap<&'static str, usize>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module and claim its routing keys.
    pub fn register(&mut self, module: Box<dyn Module>) -> Result<(), CoreError> {
        let name = module.name();
        if name.is_empty() {
            return Err(CoreError::Registration {
                reason: "module name is empty".into(),
            });
        }
        if self.by_name.contains_key(name) {
            return Err(CoreError::Registration {
                reason: format!("module `{name}` is already registered"),
            });
        }

        let index = self.modules.len();
        for &route in module.routes() {
            if let Some(&owner) = self.by_route.get(route) {
                warn!(
                    route,
                    owner = self.modules[owner].name(),
                    ignored = name,
                    "routing key already claimed, keeping first registrant"
                );
                continue;
            }
            self.by_route.insert(route, index);
        }

        debug!(module = name, routes = ?module.routes(), "module registered");
        self.by_name.insert(name, index);
        self.modules.push(module);
        Ok(())
    }

    /// Run every module's `init` once, in registration order.
    ///
    /// A failing module is logged and left registered.
    pub fn init_all(&mut self) {
        for module in &mut self.modules {
            if let Err(e) = module.init() {
                warn!(module = module.name(), error = %e, "module init failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Position of a module by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Position of the module that owns a routing key.
    pub fn route(&self, key: &str) -> Option<usize> {
        self.by_route.get(key).copied()
    }

    /// Resolve a module by name, falling back to routing key.
    pub fn resolve(&self, key: &str) -> Option<&dyn Module> {
        self.index_of(key)
            .or_else(|| self.route(key))
            .map(|i| self.modules[i].as_ref())
    }

    pub fn get(&self, index: usize) -> Option<&dyn Module> {
        self.modules.get(index).map(AsRef::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Module + 'static)> {
        self.modules.get_mut(index).map(AsMut::as_mut)
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut (dyn Module + 'static)> {
        let index = self.index_of(name)?;
        self.get_mut(index)
    }

    /// Modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.iter().map(AsRef::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn Module + 'static)> {
        self.modules.iter_mut().map(AsMut::as_mut)
    }

    pub fn teardown(&mut self) {
        for module in &mut self.modules {
            module.teardown();
        }
    }
}
