//! Argv-style command specification.

use std::ffi::OsString;

/// Specification for a command to execute on a remote host.
///
/// All remote execution goes through this type to ensure argv-style
/// invocation: arguments are `Vec<OsString>`, never concatenated shell
/// strings, so inventory-supplied values (addresses, versions) cannot inject
/// into a shell.
///
/// # Example
///
/// ```rust
/// use kubeforge_transport::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::new("kubeadm")
///     .arg("init")
///     .arg("--pod-network-cidr")
///     .arg("10.244.0.0/16");
///
/// assert_eq!(cmd.program, OsString::from("kubeadm"));
/// assert_eq!(cmd.args.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// The program to execute on the remote host.
    pub program: OsString,
    /// Arguments as discrete elements (NOT shell strings).
    pub args: Vec<OsString>,
}

impl CommandSpec {
    /// Create a new `CommandSpec` for the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Render the command as a single display string for logs and the mock
    /// transport's command journal. Lossy; never fed back into a shell.
    #[must_use]
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}
