//! Next-free port pair for a new project
//!
//! Frontend and backend are scanned independently, each starting from its
//! base and stepping by one past any port already claimed in the registry.
//! Nothing is reserved; callers serialize creations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{PortPair, ProjectConfig};
use crate::registry::RegistryStore;
use crate::storage::KeyValueStore;

pub const FRONTEND_BASE_PORT: u16 = 5173;
pub const BACKEND_BASE_PORT: u16 = 8000;

/// Where the scan starts for each side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePorts {
    #[serde(default = "default_frontend_base")]
    pub frontend: u16,
    #[serde(default = "default_backend_base")]
    pub backend: u16,
}

fn default_frontend_base() -> u16 {
    FRONTEND_BASE_PORT
}
fn default_backend_base() -> u16 {
    BACKEND_BASE_PORT
}

impl Default for BasePorts {
    fn default() -> Self {
        Self {
            frontend: FRONTEND_BASE_PORT,
            backend: BACKEND_BASE_PORT,
        }
    }
}

/// First unused frontend and backend ports at or above `base`.
pub fn next_available_ports(projects: &[ProjectConfig], base: BasePorts) -> PortPair {
    let frontend_used: BTreeSet<u16> = projects.iter().map(|p| p.frontend.port).collect();
    let backend_used: BTreeSet<u16> = projects.iter().map(|p| p.backend.port).collect();

    PortPair {
        frontend: first_free(base.frontend, &frontend_used),
        backend: first_free(base.backend, &backend_used),
    }
}

impl<S: KeyValueStore> RegistryStore<S> {
    /// Next free pair against the current effective registry
    pub fn next_available_ports(&self, base: BasePorts) -> PortPair {
        next_available_ports(&self.get_projects(), base)
    }
}

fn first_free(start: u16, used: &BTreeSet<u16>) -> u16 {
    // Every port from the base up is taken; hand back the base rather than wrap to 0
    (start..=u16::MAX)
        .find(|port| !used.contains(port))
        .unwrap_or(start)
}
