//! Exit code constants for the kubeforge CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | All targeted hosts converged |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, config, or inventory |
//! | 3 | `PARTIAL_CONVERGENCE` | Some hosts failed; run completed |
//! | 4 | `CONTROL_PLANE_FAILED` | Control-plane bootstrap failed; run aborted |

/// Exit codes matching the documented exit code table.
///
/// The numeric values are part of the public API: scripts wrapping the CLI
/// distinguish partial convergence (re-run is safe and useful) from a failed
/// control plane (re-run will retry initialization from scratch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - every targeted host converged.
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure.
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid flags, config file, or inventory file.
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Partial convergence - one or more hosts failed a step but the run
    /// completed; the run report lists the failures.
    pub const PARTIAL_CONVERGENCE: ExitCode = ExitCode(3);

    /// Control-plane bootstrap failed - the run aborted before worker join.
    pub const CONTROL_PLANE_FAILED: ExitCode = ExitCode(4);

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an `ExitCode` from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}
