//! SSH transport implementation.
//!
//! Shells out to the system `ssh`/`scp` binaries with argv-style invocation.
//! ssh space-joins the remote part of its argv and the remote login shell
//! re-parses it, so every remote element is shell-quoted first; the remote
//! shell then sees each element as one literal word. Exit code 255 is
//! `ssh`'s own failure code and is mapped to
//! [`TransportError::Unreachable`]; every other exit code belongs to the
//! remote command and is handed back to the caller untouched.

use async_trait::async_trait;
use camino::Utf8Path;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use tokio::process::Command;
use tracing::debug;

use kubeforge_config::Host;

use crate::{CommandSpec, ExecOutput, Transport, TransportError};

/// SSH exit code indicating the connection itself failed.
const SSH_CONNECT_FAILURE: i32 = 255;

/// Transport that reaches hosts over SSH.
pub struct SshTransport {
    user: String,
    connect_timeout_secs: u64,
}

impl SshTransport {
    /// Create a transport connecting as the given user.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            connect_timeout_secs: 10,
        }
    }

    /// Override the SSH connection timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    fn destination(&self, host: &Host) -> String {
        format!("{}@{}", self.user, host.address)
    }

    /// Arguments handed to the local `ssh` binary for a remote command.
    ///
    /// The option terminator sits before the destination so ssh never parses
    /// a destination or command word as one of its own flags; everything
    /// after the destination belongs to the remote command and is quoted for
    /// the remote shell.
    fn ssh_args(&self, host: &Host, cmd: &CommandSpec) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout_secs).into(),
            "--".into(),
            self.destination(host).into(),
            shell_quote(&cmd.program),
        ];
        args.extend(cmd.args.iter().map(|a| shell_quote(a)));
        args
    }

    async fn exec_local(
        &self,
        program: &str,
        args: Vec<OsString>,
    ) -> Result<std::process::Output, TransportError> {
        Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| TransportError::Spawn {
                program: program.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn run(&self, host: &Host, cmd: &CommandSpec) -> Result<ExecOutput, TransportError> {
        debug!(host = %host.name, command = %cmd.display(), "running remote command");
        let output = self.exec_local("ssh", self.ssh_args(host, cmd)).await?;

        if output.status.code() == Some(SSH_CONNECT_FAILURE) {
            return Err(TransportError::Unreachable {
                host: host.name.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(ExecOutput::new(
            output.stdout,
            output.stderr,
            output.status.code(),
        ))
    }

    async fn copy_file(
        &self,
        host: &Host,
        src: &Utf8Path,
        dst: &Utf8Path,
        owner: Option<&str>,
    ) -> Result<(), TransportError> {
        // install(1) copies and sets ownership in one argv command; plain cp
        // when no owner is requested.
        let cmd = match owner {
            Some(owner) => CommandSpec::new("install")
                .args(["-o", owner, "-g", owner, "-m", "0600"])
                .arg(src.as_str())
                .arg(dst.as_str()),
            None => CommandSpec::new("cp").arg(src.as_str()).arg(dst.as_str()),
        };

        let output = self.run(host, &cmd).await?;
        if output.success() {
            Ok(())
        } else {
            Err(TransportError::CopyFailed {
                host: host.name.clone(),
                src: src.to_string(),
                dst: dst.to_string(),
                reason: output.stderr_string().trim().to_string(),
            })
        }
    }

    async fn write_file(
        &self,
        host: &Host,
        path: &Utf8Path,
        contents: &str,
    ) -> Result<(), TransportError> {
        // Stage the contents locally and scp them into place. No remote
        // shell redirection involved.
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(contents.as_bytes())?;
        staged.flush()?;

        let args: Vec<OsString> = vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            format!("ConnectTimeout={}", self.connect_timeout_secs).into(),
            staged.path().as_os_str().to_owned(),
            format!("{}:{}", self.destination(host), path).into(),
        ];

        let output = self.exec_local("scp", args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(TransportError::WriteFailed {
                host: host.name.clone(),
                path: path.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn file_exists(&self, host: &Host, path: &Utf8Path) -> Result<bool, TransportError> {
        let cmd = CommandSpec::new("test").arg("-e").arg(path.as_str());
        let output = self.run(host, &cmd).await.map_err(|e| {
            TransportError::ExistenceCheckFailed {
                host: host.name.clone(),
                path: path.to_string(),
                reason: e.to_string(),
            }
        })?;

        match output.exit_code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            other => Err(TransportError::ExistenceCheckFailed {
                host: host.name.clone(),
                path: path.to_string(),
                reason: format!("unexpected exit status {other:?}"),
            }),
        }
    }

    async fn discover_address(&self, host: &Host) -> Result<String, TransportError> {
        let cmd = CommandSpec::new("ip").args(["-4", "route", "get", "1.1.1.1"]);
        let output = self.run(host, &cmd).await?;

        if !output.success() {
            return Err(TransportError::AddressDiscoveryFailed {
                host: host.name.clone(),
                reason: output.stderr_string().trim().to_string(),
            });
        }

        parse_route_src(&output.stdout_string()).ok_or_else(|| {
            TransportError::AddressDiscoveryFailed {
                host: host.name.clone(),
                reason: "no src address in route output".to_string(),
            }
        })
    }
}

/// Quote one argv element so the remote login shell treats it as a single
/// literal word. ssh hands the remote side a space-joined string, not a
/// vector, so without this the remote shell would expand globs and
/// metacharacters (`kubelet=1.30*`, sed expressions) before the command
/// ever ran.
fn shell_quote(arg: &OsStr) -> OsString {
    let raw = arg.to_string_lossy();
    let safe = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        return arg.to_owned();
    }

    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('\'');
    for ch in raw.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted.into()
}

/// Extract the `src` address from `ip route get` output.
fn parse_route_src(route_output: &str) -> Option<String> {
    let mut tokens = route_output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "src" {
            return tokens.next().map(ToString::to_string);
        }
    }
    None
}
