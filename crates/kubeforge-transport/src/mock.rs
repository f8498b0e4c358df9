//! In-memory mock transport for tests.
//!
//! Simulates a fleet of hosts: each host has a set of existing paths (the
//! idempotency markers), commands are journaled, and stubs script the stdout,
//! exit code, and marker side effects of selected commands. This is enough to
//! drive the entire orchestration without a network.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use kubeforge_config::Host;

use crate::{CommandSpec, ExecOutput, Transport, TransportError};

/// One command observed by the mock, as rendered display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub host: String,
    pub command: String,
}

/// Scripted response for commands matching a substring.
#[derive(Debug, Clone)]
pub struct StubResponse {
    stdout: String,
    exit_code: i32,
    creates: Vec<Utf8PathBuf>,
}

impl StubResponse {
    /// A successful, silent command.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            stdout: String::new(),
            exit_code: 0,
            creates: Vec::new(),
        }
    }

    /// A failing command with the given exit code.
    #[must_use]
    pub fn failure(exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            exit_code,
            creates: Vec::new(),
        }
    }

    /// Set the stdout the command produces.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Declare a path that appears on the host when the command succeeds.
    /// This is how the mock models marker files created by real tools
    /// (e.g. `kubeadm init` creating the admin credential).
    #[must_use]
    pub fn creates(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }
}

struct Stub {
    host: Option<String>,
    needle: String,
    response: StubResponse,
}

#[derive(Default)]
struct MockState {
    files: HashMap<String, BTreeSet<Utf8PathBuf>>,
    commands: Vec<RecordedCommand>,
    stubs: Vec<Stub>,
    unreachable: HashSet<String>,
    addresses: HashMap<String, String>,
}

/// Scriptable in-memory [`Transport`].
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub commands containing `needle` on every host. Later stubs win over
    /// earlier ones so a test can override a broad default.
    pub fn stub(&self, needle: impl Into<String>, response: StubResponse) {
        self.state.lock().unwrap().stubs.push(Stub {
            host: None,
            needle: needle.into(),
            response,
        });
    }

    /// Stub commands containing `needle` on one specific host.
    pub fn stub_for_host(
        &self,
        host: impl Into<String>,
        needle: impl Into<String>,
        response: StubResponse,
    ) {
        self.state.lock().unwrap().stubs.push(Stub {
            host: Some(host.into()),
            needle: needle.into(),
            response,
        });
    }

    /// Pre-create a path on a host, e.g. an idempotency marker from an
    /// earlier run.
    pub fn seed_file(&self, host: impl Into<String>, path: impl Into<Utf8PathBuf>) {
        self.state
            .lock()
            .unwrap()
            .files
            .entry(host.into())
            .or_default()
            .insert(path.into());
    }

    /// Make a host unreachable: every transport operation against it fails.
    pub fn mark_unreachable(&self, host: impl Into<String>) {
        self.state.lock().unwrap().unreachable.insert(host.into());
    }

    /// Set the address returned by discovery for a host. Defaults to the
    /// inventory address when unset.
    pub fn set_discovered_address(&self, host: impl Into<String>, address: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .addresses
            .insert(host.into(), address.into());
    }

    /// Whether a path currently exists on a host.
    #[must_use]
    pub fn has_file(&self, host: &str, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .files
            .get(host)
            .is_some_and(|files| files.contains(Utf8Path::new(path)))
    }

    /// Every command the mock has observed, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Commands observed on one host, rendered as display strings.
    #[must_use]
    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|c| c.host == host)
            .map(|c| c.command.clone())
            .collect()
    }

    /// Count observed commands containing `needle`, across all hosts.
    #[must_use]
    pub fn command_count_matching(&self, needle: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|c| c.command.contains(needle))
            .count()
    }

    fn ensure_reachable(&self, host: &Host) -> Result<(), TransportError> {
        if self.state.lock().unwrap().unreachable.contains(&host.name) {
            return Err(TransportError::Unreachable {
                host: host.name.clone(),
                reason: "marked unreachable by test".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn run(&self, host: &Host, cmd: &CommandSpec) -> Result<ExecOutput, TransportError> {
        self.ensure_reachable(host)?;

        let rendered = cmd.display();
        let mut state = self.state.lock().unwrap();
        state.commands.push(RecordedCommand {
            host: host.name.clone(),
            command: rendered.clone(),
        });

        let response = state
            .stubs
            .iter()
            .rev()
            .find(|stub| {
                rendered.contains(&stub.needle)
                    && stub.host.as_ref().is_none_or(|h| *h == host.name)
            })
            .map(|stub| stub.response.clone())
            .unwrap_or_else(StubResponse::ok);

        if response.exit_code == 0 {
            let files = state.files.entry(host.name.clone()).or_default();
            for path in &response.creates {
                files.insert(path.clone());
            }
        }

        Ok(ExecOutput::new(
            response.stdout.into_bytes(),
            Vec::new(),
            Some(response.exit_code),
        ))
    }

    async fn copy_file(
        &self,
        host: &Host,
        src: &Utf8Path,
        dst: &Utf8Path,
        owner: Option<&str>,
    ) -> Result<(), TransportError> {
        self.ensure_reachable(host)?;

        let mut state = self.state.lock().unwrap();
        state.commands.push(RecordedCommand {
            host: host.name.clone(),
            command: format!("copy {src} {dst} owner={}", owner.unwrap_or("-")),
        });

        let files = state.files.entry(host.name.clone()).or_default();
        if !files.contains(src) {
            return Err(TransportError::CopyFailed {
                host: host.name.clone(),
                src: src.to_string(),
                dst: dst.to_string(),
                reason: "source does not exist".to_string(),
            });
        }
        files.insert(dst.to_owned());
        Ok(())
    }

    async fn write_file(
        &self,
        host: &Host,
        path: &Utf8Path,
        _contents: &str,
    ) -> Result<(), TransportError> {
        self.ensure_reachable(host)?;

        let mut state = self.state.lock().unwrap();
        state.commands.push(RecordedCommand {
            host: host.name.clone(),
            command: format!("write {path}"),
        });
        state
            .files
            .entry(host.name.clone())
            .or_default()
            .insert(path.to_owned());
        Ok(())
    }

    async fn file_exists(&self, host: &Host, path: &Utf8Path) -> Result<bool, TransportError> {
        if self.state.lock().unwrap().unreachable.contains(&host.name) {
            return Err(TransportError::ExistenceCheckFailed {
                host: host.name.clone(),
                path: path.to_string(),
                reason: "host unreachable".to_string(),
            });
        }

        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .get(&host.name)
            .is_some_and(|files| files.contains(path)))
    }

    async fn discover_address(&self, host: &Host) -> Result<String, TransportError> {
        self.ensure_reachable(host)
            .map_err(|_| TransportError::AddressDiscoveryFailed {
                host: host.name.clone(),
                reason: "host unreachable".to_string(),
            })?;

        Ok(self
            .state
            .lock()
            .unwrap()
            .addresses
            .get(&host.name)
            .cloned()
            .unwrap_or_else(|| host.address.clone()))
    }
}
