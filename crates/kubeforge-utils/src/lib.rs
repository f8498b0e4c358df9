//! Foundation utilities shared across the kubeforge workspace.

pub mod exit_codes;
pub mod logging;

pub use exit_codes::ExitCode;
