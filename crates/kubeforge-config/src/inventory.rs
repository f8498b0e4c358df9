//! Static host inventory.
//!
//! The inventory is declarative: hosts carry a role, and the orchestrator
//! derives the "all", "master", and "workers" target groups from it. Nothing
//! about grouping is computed at runtime.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ConfigError;

/// Role a host plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    /// Control-plane host. Exactly one per inventory.
    Master,
    /// Worker host that joins the cluster after bootstrap.
    Worker,
}

impl HostRole {
    /// Canonical lowercase name used in reports and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Worker => "worker",
        }
    }
}

/// One host from the static inventory. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Host {
    /// Local hostname, also used as the node name inside the cluster.
    pub name: String,
    /// Address the transport reaches the host at.
    pub address: String,
    /// Role in the cluster.
    pub role: HostRole,
}

/// The full static inventory for one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    #[serde(rename = "hosts")]
    hosts: Vec<Host>,
}

impl Inventory {
    /// Build an inventory from parts, running the same validation as
    /// [`Inventory::load`].
    ///
    /// # Errors
    /// Returns [`ConfigError`] on an empty inventory, duplicate names, or a
    /// master count other than one.
    pub fn new(hosts: Vec<Host>) -> Result<Self, ConfigError> {
        let inventory = Self { hosts };
        inventory.validate()?;
        Ok(inventory)
    }

    /// Load and validate an inventory file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is missing, malformed, or the
    /// host set is inconsistent.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_string(),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;

        let inventory: Self = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        inventory.validate()?;
        Ok(inventory)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::EmptyInventory);
        }

        let mut seen = HashSet::new();
        for host in &self.hosts {
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::DuplicateHost {
                    name: host.name.clone(),
                });
            }
        }

        let masters = self.masters().count();
        match masters {
            0 => Err(ConfigError::NoMaster),
            1 => Ok(()),
            count => Err(ConfigError::MultipleMasters { count }),
        }
    }

    /// Every host, regardless of role.
    #[must_use]
    pub fn all(&self) -> &[Host] {
        &self.hosts
    }

    /// The single control-plane host.
    #[must_use]
    pub fn master(&self) -> &Host {
        // Validation guarantees exactly one master.
        self.masters().next().expect("validated inventory has a master")
    }

    /// All worker hosts, in inventory order.
    pub fn workers(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(|h| h.role == HostRole::Worker)
    }

    fn masters(&self) -> impl Iterator<Item = &Host> {
        self.hosts.iter().filter(|h| h.role == HostRole::Master)
    }
}
