//! Capability modules available to sessions
//!
//! The [`Catalog`] is the explicit registration table: the fixed core module
//! plus every known domain module, keyed by the aggregate name that an
//! application id maps to (`scm` -> `SCMAPI`). Modules are built fresh for
//! each session so domain state never leaks between plan runs.

pub mod core;
pub mod scm;

use std::collections::HashMap;

use crate::registry::CapabilityModule;

type ModuleFactory = Box<dyn Fn() -> CapabilityModule>;

pub struct Catalog {
    core: ModuleFactory,
    domains: HashMap<String, ModuleFactory>,
}

impl Catalog {
    /// Core module only, no domains
    pub fn new() -> Self {
        Self {
            core: Box::new(core::module),
            domains: HashMap::new(),
        }
    }

    /// Core plus the bundled sample domains
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register_domain(scm::MODULE_NAME, scm::module);
        catalog
    }

    pub fn register_domain<F>(&mut self, module_name: impl Into<String>, factory: F)
    where
        F: Fn() -> CapabilityModule + 'static,
    {
        self.domains.insert(module_name.into(), Box::new(factory));
    }

    /// `scm` -> `SCMAPI`
    pub fn domain_module_name(app_id: &str) -> String {
        format!("{}API", app_id.to_uppercase())
    }

    pub fn core(&self) -> CapabilityModule {
        (self.core)()
    }

    pub fn domain(&self, module_name: &str) -> Option<CapabilityModule> {
        self.domains.get(module_name).map(|factory| factory())
    }

    pub fn domain_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.domains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
