//! Versioned capability manifest
//!
//! Describes every capability of a session (name, parameters, example step)
//! for the plan-generation side. Execution never reads it.

use serde::{Deserialize, Serialize};

use super::{CapabilitySpec, Origin, StepRegistry};

pub const MANIFEST_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub app_id: String,
    pub capabilities: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub qualified_name: String,
    pub origin: Origin,
    #[serde(flatten)]
    pub spec: CapabilitySpec,
}

impl StepRegistry {
    /// Manifest of this registry, sorted by qualified name
    pub fn manifest(&self, app_id: &str) -> Manifest {
        let mut capabilities: Vec<ManifestEntry> = self
            .entries()
            .map(|entry| ManifestEntry {
                qualified_name: entry.qualified_name.clone(),
                origin: entry.origin,
                spec: entry.spec().clone(),
            })
            .collect();
        capabilities.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));

        Manifest {
            version: MANIFEST_VERSION.to_string(),
            app_id: app_id.to_string(),
            capabilities,
        }
    }
}

impl Manifest {
    pub fn get(&self, qualified_name: &str) -> Option<&ManifestEntry> {
        self.capabilities
            .iter()
            .find(|entry| entry.qualified_name == qualified_name)
    }
}
