//! Transport error types.

use thiserror::Error;

/// Errors from the remote execution transport.
///
/// A non-zero exit status of a remote command is *not* a transport error;
/// these variants all mean the transport itself could not do its job.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("host {host} unreachable: {reason}")]
    Unreachable { host: String, reason: String },

    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("copy on {host} from {src} to {dst} failed: {reason}")]
    CopyFailed {
        host: String,
        src: String,
        dst: String,
        reason: String,
    },

    #[error("write of {path} on {host} failed: {reason}")]
    WriteFailed {
        host: String,
        path: String,
        reason: String,
    },

    #[error("existence check for {path} on {host} could not be evaluated: {reason}")]
    ExistenceCheckFailed {
        host: String,
        path: String,
        reason: String,
    },

    #[error("address discovery on {host} failed: {reason}")]
    AddressDiscoveryFailed { host: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
