//! Per-run install state.

use rootdeploy_bundle::BundleArchive;
use tracing::debug;

use crate::error::{InstallError, InstallWarning};
use crate::phase::Phase;
use crate::types::InstallMode;

/// State of one install run against one device.
///
/// Owns the session's temporary resources: at most one local archive and
/// at most one remote temp dir. Cleanup takes them back out with
/// [`take_archive`](Self::take_archive) and
/// [`take_remote_temp_dir`](Self::take_remote_temp_dir).
#[derive(Debug)]
pub struct InstallSession {
    device_id: String,
    phase: Phase,
    history: Vec<Phase>,
    mode: Option<InstallMode>,
    archive: Option<BundleArchive>,
    remote_temp_dir: Option<String>,
    warnings: Vec<InstallWarning>,
}

impl InstallSession {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            phase: Phase::Init,
            history: vec![Phase::Init],
            mode: None,
            archive: None,
            remote_temp_dir: None,
            warnings: Vec::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn mode(&self) -> Option<InstallMode> {
        self.mode
    }

    pub fn archive(&self) -> Option<&BundleArchive> {
        self.archive.as_ref()
    }

    pub fn remote_temp_dir(&self) -> Option<&str> {
        self.remote_temp_dir.as_deref()
    }

    pub fn warnings(&self) -> &[InstallWarning] {
        &self.warnings
    }

    /// Moves to `next`, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: Phase) -> Result<(), InstallError> {
        let allowed = self.phase.can_advance_to(&next)
            && (next != Phase::IdentityProvisioned || self.mode == Some(InstallMode::Fresh));
        if !allowed {
            return Err(InstallError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }

        debug!(device = %self.device_id, from = %self.phase, to = %next, "phase transition");
        self.history.push(next.clone());
        self.phase = next;
        Ok(())
    }

    /// Records the packaged archive and enters `Packaged`.
    pub fn set_archive(&mut self, archive: BundleArchive) -> Result<(), InstallError> {
        self.advance(Phase::Packaged)?;
        self.archive = Some(archive);
        Ok(())
    }

    /// Records the install mode and enters `ModeDetected`.
    pub fn set_mode(&mut self, mode: InstallMode) -> Result<(), InstallError> {
        self.advance(Phase::ModeDetected)?;
        self.mode = Some(mode);
        Ok(())
    }

    /// Registers the remote temp dir so cleanup removes it.
    pub fn set_remote_temp_dir(&mut self, dir: String) -> Result<(), InstallError> {
        if let Some(existing) = &self.remote_temp_dir {
            return Err(InstallError::InvalidTransition {
                from: format!("temp dir {existing}"),
                to: format!("temp dir {dir}"),
            });
        }
        self.remote_temp_dir = Some(dir);
        Ok(())
    }

    /// Enters `Failed` unless the session already terminated.
    pub fn fail(&mut self, cause: &InstallError) {
        let failed = Phase::Failed {
            cause: cause.to_string(),
        };
        if self.phase.can_advance_to(&failed) {
            self.history.push(failed.clone());
            self.phase = failed;
        }
    }

    pub fn warn(&mut self, warning: InstallWarning) {
        self.warnings.push(warning);
    }

    pub fn take_archive(&mut self) -> Option<BundleArchive> {
        self.archive.take()
    }

    pub fn take_remote_temp_dir(&mut self) -> Option<String> {
        self.remote_temp_dir.take()
    }

    /// Splits the session into the parts reported to the caller.
    pub(crate) fn into_report(self) -> (Vec<Phase>, Vec<InstallWarning>) {
        (self.history, self.warnings)
    }
}
