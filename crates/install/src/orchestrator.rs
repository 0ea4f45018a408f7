//! Install orchestrator.
//!
//! Drives one session per call: resolve, connect, package, detect, upload,
//! apply, provision, clean up. Progress is published as [`InstallEvent`]s.

use std::io;
use std::sync::Arc;

use rootdeploy_bundle::{BundleArchive, BundleError, pack_bundle};
use rootdeploy_remote::{DeviceConnector, DeviceTarget, RemoteDevice};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::apply::{IdentityProvision, apply, apply_plan, provision_identity};
use crate::cleanup::release;
use crate::error::{InstallError, InstallWarning};
use crate::mode::detect_mode;
use crate::phase::Phase;
use crate::registry::DeviceRegistry;
use crate::session::InstallSession;
use crate::types::{InstallEvent, InstallMode, InstallOutcome, SessionContext};
use crate::upload::stage_archive;

const EVENT_CAPACITY: usize = 64;

/// Installs the configured bundle onto devices from a registry.
pub struct InstallOrchestrator {
    registry: Box<dyn DeviceRegistry>,
    connector: Box<dyn DeviceConnector>,
    context: SessionContext,
    events_tx: mpsc::Sender<InstallEvent>,
    events_rx: Option<mpsc::Receiver<InstallEvent>>,
}

impl InstallOrchestrator {
    pub fn new(
        registry: Box<dyn DeviceRegistry>,
        connector: Box<dyn DeviceConnector>,
        context: SessionContext,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            registry,
            connector,
            context,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    ///
    /// Events are dropped rather than awaited when the receiver falls
    /// behind or is gone.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<InstallEvent>> {
        self.events_rx.take()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Runs one install session against `device_id`.
    ///
    /// Never panics on device faults: every failure ends up in the
    /// returned outcome, after the session's resources were released.
    pub async fn install(&self, device_id: &str) -> InstallOutcome {
        let mut session = InstallSession::new(device_id);

        let (target, device) = match self.prepare(device_id) {
            Ok(prepared) => prepared,
            Err(e) => return self.finish(session, Err(e)),
        };
        self.emit(InstallEvent::PhaseChanged {
            device_id: device_id.to_string(),
            phase: Phase::Init,
        });

        let result = self
            .run_phases(&mut session, &target, device.as_ref())
            .await;
        if let Err(e) = &result {
            self.fail(&mut session, e);
        }

        for warning in release(device.as_ref(), &mut session).await {
            self.record_warning(&mut session, warning);
        }

        let result = result
            .and_then(|()| self.advance(&mut session, Phase::CleanedUp))
            .and_then(|()| self.advance(&mut session, Phase::Done));
        self.finish(session, result)
    }

    /// Pre-flight checks. Performs no remote I/O.
    fn prepare(
        &self,
        device_id: &str,
    ) -> Result<(DeviceTarget, Arc<dyn RemoteDevice>), InstallError> {
        self.context.layout.validate()?;
        let target = self.registry.resolve(device_id)?;
        let device = self.connector.connect(&target)?;
        Ok((target, device))
    }

    async fn run_phases(
        &self,
        session: &mut InstallSession,
        target: &DeviceTarget,
        device: &dyn RemoteDevice,
    ) -> Result<(), InstallError> {
        let ctx = &self.context;

        let archive = self.package().await?;
        info!(
            device = %target.id,
            archive = %archive.path().display(),
            size = archive.size(),
            sha256 = %archive.sha256(),
            "bundle packaged"
        );
        session.set_archive(archive)?;
        self.emit_phase(session);

        let mode = detect_mode(device, &ctx.layout, &ctx.retry).await?;
        session.set_mode(mode)?;
        self.emit_phase(session);
        self.emit(InstallEvent::ModeDetected {
            device_id: target.id.clone(),
            mode,
        });

        let remote_archive = stage_archive(device, session, &ctx.retry).await?;
        self.advance(session, Phase::Uploaded)?;

        info!(
            device = %target.id,
            %mode,
            install_root = %ctx.layout.install_root,
            "applying bundle"
        );
        apply(device, &apply_plan(mode, &ctx.layout, &remote_archive)).await?;
        self.advance(session, Phase::Applied)?;

        if mode == InstallMode::Fresh {
            match provision_identity(device, target, &ctx.layout).await? {
                IdentityProvision::Provisioned(_) => {
                    self.advance(session, Phase::IdentityProvisioned)?;
                }
                IdentityProvision::Missing(path) => {
                    self.record_warning(session, InstallWarning::IdentityArtifactMissing(path));
                }
                IdentityProvision::NotConfigured => {}
            }
        }
        Ok(())
    }

    /// Archives the bundle on the blocking pool.
    async fn package(&self) -> Result<BundleArchive, InstallError> {
        let bundle_dir = self.context.bundle_dir.clone();
        let scratch_dir = self.context.scratch_dir.clone();
        let archive = tokio::task::spawn_blocking(move || {
            pack_bundle(&bundle_dir, scratch_dir.as_deref())
        })
        .await
        .map_err(|e| BundleError::Io(io::Error::other(e)))??;
        Ok(archive)
    }

    fn advance(&self, session: &mut InstallSession, phase: Phase) -> Result<(), InstallError> {
        session.advance(phase)?;
        self.emit_phase(session);
        Ok(())
    }

    fn fail(&self, session: &mut InstallSession, cause: &InstallError) {
        if session.phase().is_terminal() {
            return;
        }
        session.fail(cause);
        self.emit_phase(session);
    }

    fn record_warning(&self, session: &mut InstallSession, warning: InstallWarning) {
        warn!(device = %session.device_id(), warning = %warning, "install warning");
        self.emit(InstallEvent::Warning {
            device_id: session.device_id().to_string(),
            warning: warning.clone(),
        });
        session.warn(warning);
    }

    fn finish(
        &self,
        mut session: InstallSession,
        result: Result<(), InstallError>,
    ) -> InstallOutcome {
        let device_id = session.device_id().to_string();
        let mode = session.mode();

        let error = match result {
            Ok(()) => {
                let install_root = self.context.layout.install_root.clone();
                info!(
                    device = %device_id,
                    mode = ?mode,
                    install_root = %install_root,
                    "install completed"
                );
                if let Some(mode) = mode {
                    self.emit(InstallEvent::Completed {
                        device_id: device_id.clone(),
                        mode,
                        install_root,
                    });
                }
                None
            }
            Err(e) => {
                self.fail(&mut session, &e);
                error!(device = %device_id, error = %e, "install failed");
                self.emit(InstallEvent::Failed {
                    device_id: device_id.clone(),
                    error: e.to_string(),
                });
                Some(e)
            }
        };

        let (phases, warnings) = session.into_report();
        InstallOutcome {
            device_id,
            success: error.is_none(),
            mode,
            error,
            warnings,
            phases,
        }
    }

    fn emit_phase(&self, session: &InstallSession) {
        self.emit(InstallEvent::PhaseChanged {
            device_id: session.device_id().to_string(),
            phase: session.phase().clone(),
        });
    }

    fn emit(&self, event: InstallEvent) {
        let _ = self.events_tx.try_send(event);
    }
}
