//! Join-credential hand-off channel.
//!
//! Single producer (the control-plane host, after bootstrap), many readers
//! (every worker), scoped to one orchestration run and never persisted. The
//! phase barrier orders the write before any read; the error variants exist
//! so a violated ordering fails loudly instead of joining with an empty
//! credential.

use std::sync::OnceLock;
use thiserror::Error;

/// Errors from the join-credential channel.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    /// `publish` was called twice within one run.
    #[error("join credential already published for this run")]
    AlreadyPublished,

    /// `read` was reached before `publish`. The phase barrier makes this
    /// unreachable in a correct run.
    #[error("join credential not published; control-plane bootstrap has not committed")]
    Unpublished,
}

/// Single-writer, many-reader slot for the worker join credential.
#[derive(Debug, Default)]
pub struct JoinCredentialChannel {
    slot: OnceLock<String>,
}

impl JoinCredentialChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the credential for this run. Called exactly once, by the
    /// control-plane host, after bootstrap succeeds.
    ///
    /// # Errors
    /// Returns [`CredentialError::AlreadyPublished`] on a second publish.
    pub fn publish(&self, value: String) -> Result<(), CredentialError> {
        self.slot
            .set(value)
            .map_err(|_| CredentialError::AlreadyPublished)
    }

    /// Read the credential published in this run.
    ///
    /// # Errors
    /// Returns [`CredentialError::Unpublished`] if the control-plane phase
    /// has not committed a value.
    pub fn read(&self) -> Result<&str, CredentialError> {
        self.slot
            .get()
            .map(String::as_str)
            .ok_or(CredentialError::Unpublished)
    }

    /// Whether a credential has been published in this run.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.slot.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_before_publish_is_a_hard_error() {
        let channel = JoinCredentialChannel::new();
        assert!(!channel.is_published());
        assert_eq!(channel.read(), Err(CredentialError::Unpublished));
    }

    #[test]
    fn publish_then_read_many_times() {
        let channel = JoinCredentialChannel::new();
        channel
            .publish("kubeadm join 10.0.0.10:6443 --token abc".to_string())
            .unwrap();

        assert!(channel.is_published());
        for _ in 0..3 {
            assert_eq!(
                channel.read().unwrap(),
                "kubeadm join 10.0.0.10:6443 --token abc"
            );
        }
    }

    #[test]
    fn second_publish_is_rejected() {
        let channel = JoinCredentialChannel::new();
        channel.publish("first".to_string()).unwrap();
        assert_eq!(
            channel.publish("second".to_string()),
            Err(CredentialError::AlreadyPublished)
        );
        // The first value wins.
        assert_eq!(channel.read().unwrap(), "first");
    }
}
