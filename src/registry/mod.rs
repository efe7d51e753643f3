//! Step Registry
//!
//! Maps qualified capability names (`"<namespace>.<method>"`) to callables.
//! A session registry is built once per plan execution from the fixed core
//! module plus exactly one domain module chosen by application id, and is not
//! modified afterwards.

pub mod capability;
pub mod manifest;

pub use capability::{
    Arguments, ArgumentError, Capability, CapabilityFn, CapabilityGroup, CapabilityModule,
    CapabilitySpec, ParamKind, ParamSpec,
};
pub use manifest::{Manifest, ManifestEntry, MANIFEST_VERSION};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::capabilities::Catalog;

/// Where a registry entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Core,
    Domain,
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub qualified_name: String,
    pub origin: Origin,
    capability: Capability,
}

impl RegistryEntry {
    pub fn spec(&self) -> &CapabilitySpec {
        self.capability.spec()
    }

    pub fn call(&self, args: Arguments) -> Result<JsonValue> {
        self.capability.call(args)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepRegistry {
    entries: HashMap<String, RegistryEntry>,
    app_id: Option<String>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session registry from the built-in catalog
    pub fn build_session(app_id: &str) -> Self {
        Self::build_session_with(app_id, &Catalog::builtin())
    }

    /// Core capabilities plus the domain module named `<APP_ID>API`.
    /// A missing domain module leaves a core-only session.
    pub fn build_session_with(app_id: &str, catalog: &Catalog) -> Self {
        let mut registry = Self::new();
        registry.app_id = Some(app_id.to_string());

        registry.register_module(&catalog.core(), Origin::Core);

        let module_name = Catalog::domain_module_name(app_id);
        match catalog.domain(&module_name) {
            Some(module) => registry.register_module(&module, Origin::Domain),
            None => warn!(
                app_id = %app_id,
                module = %module_name,
                "Domain module not found; continuing with core capabilities only"
            ),
        }

        info!(
            app_id = %app_id,
            capabilities = registry.len(),
            "Step registry built"
        );
        registry
    }

    /// Add or overwrite one entry; the last registration for a name wins
    pub fn register(
        &mut self,
        namespace: &str,
        method: &str,
        capability: Capability,
        origin: Origin,
    ) {
        let qualified_name = format!("{}.{}", namespace.to_lowercase(), method);
        let entry = RegistryEntry {
            qualified_name: qualified_name.clone(),
            origin,
            capability,
        };
        if let Some(previous) = self.entries.insert(qualified_name.clone(), entry) {
            warn!(
                function = %qualified_name,
                previous = ?previous.origin,
                current = ?origin,
                "Capability registered twice; keeping the later one"
            );
        } else {
            debug!(function = %qualified_name, origin = ?origin, "Registered capability");
        }
    }

    pub fn register_group(&mut self, group: &CapabilityGroup, origin: Origin) {
        let namespace = group.namespace();
        for capability in group.capabilities() {
            self.register(&namespace, capability.method(), capability.clone(), origin);
        }
    }

    pub fn register_module(&mut self, module: &CapabilityModule, origin: Origin) {
        for group in module.groups() {
            self.register_group(group, origin);
        }
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<&RegistryEntry> {
        self.entries.get(qualified_name)
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.entries.contains_key(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Application id this session was built for
    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(method: &str, value: JsonValue) -> Capability {
        Capability::new(CapabilitySpec::new(method, "test"), move |_| Ok(value.clone()))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = StepRegistry::new();
        registry.register("Inventory", "check_stock", constant("check_stock", json!(5)), Origin::Domain);

        let entry = registry.lookup("inventory.check_stock").unwrap();
        assert_eq!(entry.qualified_name, "inventory.check_stock");
        assert_eq!(entry.origin, Origin::Domain);
        assert_eq!(entry.call(Arguments::new()).unwrap(), json!(5));
        assert!(registry.lookup("Inventory.check_stock").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = StepRegistry::new();
        registry.register("message", "write_message", constant("write_message", json!("core")), Origin::Core);
        registry.register("message", "write_message", constant("write_message", json!("app")), Origin::Domain);

        let entry = registry.lookup("message.write_message").unwrap();
        assert_eq!(entry.origin, Origin::Domain);
        assert_eq!(entry.call(Arguments::new()).unwrap(), json!("app"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_session_with_domain() {
        let registry = StepRegistry::build_session("scm");
        assert_eq!(registry.app_id(), Some("scm"));
        assert_eq!(registry.lookup("message.write_message").unwrap().origin, Origin::Core);
        assert_eq!(
            registry.lookup("customer_order.get_pending_orders").unwrap().origin,
            Origin::Domain
        );
        assert!(registry.contains("inventory.check_stock"));
    }

    #[test]
    fn test_missing_domain_is_core_only() {
        let registry = StepRegistry::build_session("nosuchapp");
        assert!(registry.contains("message.write_message"));
        assert!(registry
            .entries()
            .all(|entry| entry.origin == Origin::Core));
    }

    #[test]
    fn test_custom_domain_in_catalog() {
        let mut catalog = Catalog::builtin();
        catalog.register_domain("WMSAPI", || {
            CapabilityModule::new("WMSAPI").with_group(
                CapabilityGroup::new("Shipping").with(constant("dispatch", json!({"shipped": true}))),
            )
        });

        let registry = StepRegistry::build_session_with("wms", &catalog);
        assert!(registry.contains("shipping.dispatch"));
        assert!(!registry.contains("inventory.check_stock"));
        assert_eq!(registry.names(), vec!["message.write_message", "shipping.dispatch"]);
    }
}
