//! On-host paths used as idempotency markers and persisted configuration.

/// Admin credential written by `kubeadm init`. Its presence means the
/// control plane is initialized.
pub const ADMIN_CONF: &str = "/etc/kubernetes/admin.conf";

/// Node membership configuration written by `kubeadm join` (and by init on
/// the master). Its presence means the node is a cluster member.
pub const KUBELET_CONF: &str = "/etc/kubernetes/kubelet.conf";

/// Persisted kernel module list, survives reboot.
pub const MODULES_CONF: &str = "/etc/modules-load.d/kubernetes.conf";

/// Persisted networking sysctls for pod traffic.
pub const SYSCTL_CONF: &str = "/etc/sysctl.d/99-kubernetes-cri.conf";

/// Kubelet defaults file carrying the discovered node IP.
pub const KUBELET_DEFAULTS: &str = "/etc/default/kubelet";
