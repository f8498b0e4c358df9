//! Cluster configuration model.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default pod network range, matching the flannel add-on's default.
pub const DEFAULT_POD_CIDR: &str = "10.244.0.0/16";

fn default_pod_cidr() -> String {
    DEFAULT_POD_CIDR.to_string()
}

fn default_fan_out() -> usize {
    8
}

fn default_ssh_user() -> String {
    "root".to_string()
}

/// Cluster-wide configuration loaded from a TOML file.
///
/// # Example
///
/// ```toml
/// kubernetes_version = "1.30"
/// cri_version = "1.30"
/// pod_cidr = "10.244.0.0/16"
/// fan_out = 8
/// ssh_user = "ubuntu"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Kubernetes minor version used to select the package repository and
    /// the kubelet/kubeadm/kubectl packages (e.g. `"1.30"`).
    pub kubernetes_version: String,

    /// Container runtime tooling version. Defaults to `kubernetes_version`
    /// when omitted, which is correct for the cri-tools packages.
    #[serde(default)]
    pub cri_version: Option<String>,

    /// Address range handed to `kubeadm init --pod-network-cidr` and assumed
    /// by the pod-network add-on manifest.
    #[serde(default = "default_pod_cidr")]
    pub pod_cidr: String,

    /// Upper bound on hosts touched concurrently within a step.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    /// User the SSH transport connects as and whose profile receives the
    /// admin credential on the master.
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
}

impl ClusterConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is missing, malformed, or fails
    /// validation.
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

        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate field values beyond what deserialization enforces.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kubernetes_version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "kubernetes_version".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if !self.pod_cidr.contains('/') {
            return Err(ConfigError::InvalidValue {
                key: "pod_cidr".to_string(),
                reason: format!("expected CIDR notation, got {}", self.pod_cidr),
            });
        }

        if self.fan_out == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fan_out".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Effective cri-tools version: explicit `cri_version` or the Kubernetes
    /// version.
    #[must_use]
    pub fn cri_version(&self) -> &str {
        self.cri_version.as_deref().unwrap_or(&self.kubernetes_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> (NamedTempFile, Utf8PathBuf) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).unwrap();
        (file, path)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let (_file, path) = write_config("kubernetes_version = \"1.30\"\n");
        let config = ClusterConfig::load(&path).unwrap();

        assert_eq!(config.kubernetes_version, "1.30");
        assert_eq!(config.pod_cidr, DEFAULT_POD_CIDR);
        assert_eq!(config.fan_out, 8);
        assert_eq!(config.ssh_user, "root");
        assert_eq!(config.cri_version(), "1.30");
    }

    #[test]
    fn explicit_cri_version_wins() {
        let (_file, path) =
            write_config("kubernetes_version = \"1.30\"\ncri_version = \"1.29\"\n");
        let config = ClusterConfig::load(&path).unwrap();
        assert_eq!(config.cri_version(), "1.29");
    }

    #[test]
    fn rejects_bad_pod_cidr() {
        let (_file, path) =
            write_config("kubernetes_version = \"1.30\"\npod_cidr = \"10.244.0.0\"\n");
        let err = ClusterConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "pod_cidr"));
    }

    #[test]
    fn rejects_zero_fan_out() {
        let (_file, path) = write_config("kubernetes_version = \"1.30\"\nfan_out = 0\n");
        let err = ClusterConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "fan_out"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let (_file, path) =
            write_config("kubernetes_version = \"1.30\"\nkubernets_version = \"oops\"\n");
        let err = ClusterConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ClusterConfig::load(Utf8Path::new("/nonexistent/kubeforge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }
}
