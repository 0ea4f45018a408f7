//! Runs one install and renders its progress.

use rootdeploy_install::{InstallEvent, InstallMode, InstallOrchestrator, InstallOutcome, Phase};
use rootdeploy_remote::TransportConnector;
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::config::Config;

/// Installs onto `cli.device_id`. Returns whether the install succeeded.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<bool> {
    let mut context = config.session_context();
    if let Some(bundle) = cli.bundle {
        context.bundle_dir = bundle;
    }
    if let Some(root) = cli.install_root {
        context.layout.install_root = root;
    }
    let registry = config.registry();
    if registry.is_empty() {
        tracing::warn!("no devices configured");
    }
    tracing::debug!(
        bundle = %context.bundle_dir.display(),
        install_root = %context.layout.install_root,
        devices = registry.len(),
        "starting install"
    );

    let mut orchestrator = InstallOrchestrator::new(
        Box::new(registry),
        Box::new(TransportConnector::new(config.ssh_options())),
        context,
    );
    let events = orchestrator
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;
    let printer = tokio::spawn(print_progress(events));

    let outcome = orchestrator.install(&cli.device_id).await;
    let install_root = orchestrator.context().layout.install_root.clone();
    // Closes the event channel so the printer drains and exits.
    drop(orchestrator);
    printer.await?;

    print_summary(&outcome, &install_root);
    Ok(outcome.success)
}

async fn print_progress(mut events: mpsc::Receiver<InstallEvent>) {
    let mut mode = None;
    while let Some(event) = events.recv().await {
        if let Some(line) = progress_line(&event, &mut mode) {
            println!("{line}");
        }
        if let InstallEvent::Warning { warning, .. } = &event {
            eprintln!("warning: {warning}");
        }
    }
}

/// Maps an event to its progress line, tracking the mode as it goes.
fn progress_line(event: &InstallEvent, mode: &mut Option<InstallMode>) -> Option<&'static str> {
    match event {
        InstallEvent::PhaseChanged { phase, .. } => match phase {
            Phase::Init => Some("Creating rootfs tarball..."),
            Phase::ModeDetected => Some("Uploading rootfs..."),
            Phase::Uploaded => match mode {
                Some(InstallMode::Fresh) => Some("Performing fresh installation..."),
                Some(InstallMode::Update) => Some("Updating existing installation..."),
                None => None,
            },
            _ => None,
        },
        InstallEvent::ModeDetected { mode: detected, .. } => {
            *mode = Some(*detected);
            None
        }
        _ => None,
    }
}

fn summary(outcome: &InstallOutcome, install_root: &str) -> String {
    match (outcome.success, outcome.mode) {
        (true, Some(InstallMode::Fresh)) => format!(
            "Fresh installation completed on {}: rootfs installed to {install_root}",
            outcome.device_id
        ),
        (true, Some(InstallMode::Update)) => format!(
            "Update completed on {}: replaced {}/bin",
            outcome.device_id,
            install_root.trim_end_matches('/')
        ),
        _ => format!(
            "Installation on {} failed: {}",
            outcome.device_id,
            outcome.cause().unwrap_or_else(|| "unknown error".into())
        ),
    }
}

fn print_summary(outcome: &InstallOutcome, install_root: &str) {
    let line = summary(outcome, install_root);
    if outcome.success {
        println!("{line}");
    } else {
        eprintln!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use rootdeploy_install::InstallError;

    use super::*;

    fn phase(phase: Phase) -> InstallEvent {
        InstallEvent::PhaseChanged {
            device_id: "ood1".into(),
            phase,
        }
    }

    fn outcome(success: bool, mode: Option<InstallMode>) -> InstallOutcome {
        InstallOutcome {
            device_id: "ood1".into(),
            success,
            mode,
            error: (!success).then(|| InstallError::DeviceNotFound("ood1".into())),
            warnings: Vec::new(),
            phases: Vec::new(),
        }
    }

    #[test]
    fn progress_lines_follow_the_mode() {
        let mut mode = None;
        let lines: Vec<_> = [
            phase(Phase::Init),
            phase(Phase::Packaged),
            phase(Phase::ModeDetected),
            InstallEvent::ModeDetected {
                device_id: "ood1".into(),
                mode: InstallMode::Update,
            },
            phase(Phase::Uploaded),
            phase(Phase::Applied),
        ]
        .iter()
        .filter_map(|event| progress_line(event, &mut mode))
        .collect();

        assert_eq!(
            lines,
            vec![
                "Creating rootfs tarball...",
                "Uploading rootfs...",
                "Updating existing installation...",
            ]
        );
    }

    #[test]
    fn fresh_progress_line() {
        let mut mode = Some(InstallMode::Fresh);
        assert_eq!(
            progress_line(&phase(Phase::Uploaded), &mut mode),
            Some("Performing fresh installation...")
        );
    }

    #[test]
    fn summaries() {
        assert_eq!(
            summary(&outcome(true, Some(InstallMode::Fresh)), "/opt/buckyos"),
            "Fresh installation completed on ood1: rootfs installed to /opt/buckyos"
        );
        assert_eq!(
            summary(&outcome(true, Some(InstallMode::Update)), "/opt/buckyos/"),
            "Update completed on ood1: replaced /opt/buckyos/bin"
        );
        assert_eq!(
            summary(&outcome(false, None), "/opt/buckyos"),
            "Installation on ood1 failed: unknown device: ood1"
        );
    }
}
