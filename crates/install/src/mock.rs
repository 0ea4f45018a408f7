//! Scriptable in-memory device for tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rootdeploy_remote::{
    BoxFuture, CommandOutput, DeviceConnector, DeviceTarget, RemoteCommand, RemoteDevice,
    RemoteError,
};

/// Directory the mock `mktemp -d` hands out.
pub(crate) const MOCK_TEMP_DIR: &str = "/tmp/tmp.mock01";

#[derive(Debug, Clone)]
enum Reply {
    Stdout(String),
    Stderr(String),
    Unreachable,
    Transfer(String),
}

/// A scripted reply for commands starting with `prefix` (rendered form) or
/// uploads whose remote path ends with `prefix`.
#[derive(Debug, Clone)]
pub(crate) struct Fault {
    prefix: String,
    upload: bool,
    reply: Reply,
    remaining: Option<usize>,
}

impl Fault {
    fn command(prefix: &str, reply: Reply) -> Self {
        Self {
            prefix: prefix.into(),
            upload: false,
            reply,
            remaining: None,
        }
    }

    fn for_upload(suffix: &str, reply: Reply) -> Self {
        Self {
            prefix: suffix.into(),
            upload: true,
            reply,
            remaining: None,
        }
    }

    pub(crate) fn stderr(prefix: &str, message: &str) -> Self {
        Self::command(prefix, Reply::Stderr(message.into()))
    }

    pub(crate) fn stdout(prefix: &str, output: &str) -> Self {
        Self::command(prefix, Reply::Stdout(output.into()))
    }

    pub(crate) fn unreachable(prefix: &str) -> Self {
        Self::command(prefix, Reply::Unreachable)
    }

    pub(crate) fn transfer(suffix: &str, message: &str) -> Self {
        Self::for_upload(suffix, Reply::Transfer(message.into()))
    }

    pub(crate) fn upload_unreachable(suffix: &str) -> Self {
        Self::for_upload(suffix, Reply::Unreachable)
    }

    /// Fires only the first `n` times it matches.
    pub(crate) fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Upload {
    pub(crate) local: PathBuf,
    pub(crate) remote: String,
    /// Whether the local file existed when the upload was issued.
    pub(crate) local_existed: bool,
}

/// Mock device that records every command and upload attempt.
pub(crate) struct MockDevice {
    install_root_exists: bool,
    faults: Mutex<Vec<Fault>>,
    commands: Mutex<Vec<String>>,
    uploads: Mutex<Vec<Upload>>,
}

impl MockDevice {
    pub(crate) fn new(install_root_exists: bool) -> Self {
        Self {
            install_root_exists,
            faults: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn inject(&self, fault: Fault) {
        self.faults.lock().unwrap().push(fault);
    }

    /// Rendered commands, in issue order.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    fn scripted(&self, subject: &str, upload: bool) -> Option<Reply> {
        let mut faults = self.faults.lock().unwrap();
        let index = faults.iter().position(|f| {
            f.upload == upload
                && f.remaining != Some(0)
                && if upload {
                    subject.ends_with(&f.prefix)
                } else {
                    subject.starts_with(&f.prefix)
                }
        })?;
        let fault = &mut faults[index];
        if let Some(n) = fault.remaining.as_mut() {
            *n -= 1;
        }
        Some(fault.reply.clone())
    }

    fn unreachable(&self) -> RemoteError {
        RemoteError::Unreachable {
            destination: "mock".into(),
            detail: "Connection refused".into(),
        }
    }

    fn reply_to(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        let rendered = command.to_string();
        self.commands.lock().unwrap().push(rendered.clone());

        match self.scripted(&rendered, false) {
            Some(Reply::Stdout(out)) => return Ok(CommandOutput::success(out)),
            Some(Reply::Stderr(err)) => return Ok(CommandOutput::failure(err)),
            Some(Reply::Unreachable) => return Err(self.unreachable()),
            Some(Reply::Transfer(msg)) => return Err(RemoteError::Transfer(msg)),
            None => {}
        }

        let stdout = match command.program() {
            "sh" if self.install_root_exists => "exists\n".to_string(),
            "sh" => "missing\n".to_string(),
            "mktemp" => format!("{MOCK_TEMP_DIR}\n"),
            _ => String::new(),
        };
        Ok(CommandOutput::success(stdout))
    }

    fn accept_upload(&self, local: &Path, remote: &str) -> Result<(), RemoteError> {
        self.uploads.lock().unwrap().push(Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            local_existed: local.exists(),
        });

        match self.scripted(remote, true) {
            Some(Reply::Unreachable) => Err(self.unreachable()),
            Some(Reply::Transfer(msg) | Reply::Stderr(msg)) => Err(RemoteError::Transfer(msg)),
            Some(Reply::Stdout(_)) | None => Ok(()),
        }
    }
}

impl RemoteDevice for MockDevice {
    fn run_command<'a>(
        &'a self,
        command: &'a RemoteCommand,
    ) -> BoxFuture<'a, Result<CommandOutput, RemoteError>> {
        Box::pin(async move { self.reply_to(command) })
    }

    fn upload<'a>(
        &'a self,
        local: &'a Path,
        remote: &'a str,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        Box::pin(async move { self.accept_upload(local, remote) })
    }

    fn destination(&self) -> &str {
        "mock"
    }
}

/// Connector handing out one shared [`MockDevice`].
pub(crate) struct MockConnector(pub(crate) Arc<MockDevice>);

impl DeviceConnector for MockConnector {
    fn connect(&self, _target: &DeviceTarget) -> Result<Arc<dyn RemoteDevice>, RemoteError> {
        Ok(self.0.clone())
    }
}
