//! Configuration model, discovery, and validation for kubeforge.
//!
//! Two TOML files drive a run: the cluster configuration (versions, pod
//! network range, fan-out limit) and the static host inventory (who is the
//! master, who are the workers). Both are validated on load so the
//! orchestrator never sees a half-formed model.

mod config;
mod inventory;

pub use config::{ClusterConfig, DEFAULT_POD_CIDR};
pub use inventory::{Host, HostRole, Inventory};

use thiserror::Error;

/// Configuration and inventory loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("file not found at {path}")]
    NotFound { path: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("inventory has no master host")]
    NoMaster,

    #[error("inventory has {count} master hosts, expected exactly one")]
    MultipleMasters { count: usize },

    #[error("duplicate host name in inventory: {name}")]
    DuplicateHost { name: String },

    #[error("inventory is empty")]
    EmptyInventory,

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
