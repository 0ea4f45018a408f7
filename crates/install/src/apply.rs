//! Applying a staged archive and provisioning device identity.

use std::path::PathBuf;

use rootdeploy_bundle::BIN_DIR;
use rootdeploy_remote::{DeviceTarget, RemoteCommand, RemoteDevice};
use tracing::{debug, info};

use crate::error::InstallError;
use crate::exec::run_checked;
use crate::types::{InstallLayout, InstallMode};

/// Commands that apply `remote_archive` under the install root.
///
/// - `Fresh`: create the root, extract the whole archive, make sure `etc`
///   exists even when the bundle had none.
/// - `Update`: drop the old `bin`, extract only the `bin` member. Nothing
///   else under the root is touched.
pub fn apply_plan(
    mode: InstallMode,
    layout: &InstallLayout,
    remote_archive: &str,
) -> Vec<RemoteCommand> {
    let root = layout.install_root.as_str();
    match mode {
        InstallMode::Fresh => vec![
            RemoteCommand::new("mkdir").args(["-p", root]),
            RemoteCommand::new("tar").args(["-xzf", remote_archive, "-C", root]),
            RemoteCommand::new("mkdir").args(["-p".to_string(), layout.etc_dir()]),
        ],
        InstallMode::Update => vec![
            RemoteCommand::new("rm").args(["-rf".to_string(), layout.bin_dir()]),
            RemoteCommand::new("tar").args(["-xzf", remote_archive, "-C", root, BIN_DIR]),
        ],
    }
}

/// Runs the plan in order, stopping at the first failing command.
pub(crate) async fn apply(
    device: &dyn RemoteDevice,
    plan: &[RemoteCommand],
) -> Result<(), InstallError> {
    for command in plan {
        run_checked(device, command).await?;
    }
    Ok(())
}

/// What happened to the device identity on a fresh install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IdentityProvision {
    /// Copied to this remote path.
    Provisioned(String),
    /// The target names no identity artifact.
    NotConfigured,
    /// The configured artifact does not exist locally.
    Missing(PathBuf),
}

/// Copies the target's identity artifact into `etc` under its well-known
/// name. Single attempt: this runs inside the apply phase.
pub(crate) async fn provision_identity(
    device: &dyn RemoteDevice,
    target: &DeviceTarget,
    layout: &InstallLayout,
) -> Result<IdentityProvision, InstallError> {
    let Some(configured) = target.identity_artifact.as_deref() else {
        debug!(device = %target.id, "no identity artifact configured");
        return Ok(IdentityProvision::NotConfigured);
    };
    let Some(local) = target.existing_identity_artifact() else {
        return Ok(IdentityProvision::Missing(configured.to_path_buf()));
    };

    let remote = layout.identity_path();
    info!(
        device = %target.id,
        local = %local.display(),
        remote = %remote,
        "provisioning device identity"
    );
    device.upload(local, &remote).await?;
    Ok(IdentityProvision::Provisioned(remote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Fault, MockDevice};

    const ARCHIVE: &str = "/tmp/tmp.mock01/rootfs.tar.gz";

    fn rendered(plan: &[RemoteCommand]) -> Vec<String> {
        plan.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn fresh_plan_extracts_everything() {
        let plan = apply_plan(InstallMode::Fresh, &InstallLayout::default(), ARCHIVE);
        assert_eq!(
            rendered(&plan),
            vec![
                "mkdir -p /opt/buckyos",
                "tar -xzf /tmp/tmp.mock01/rootfs.tar.gz -C /opt/buckyos",
                "mkdir -p /opt/buckyos/etc",
            ]
        );
    }

    #[test]
    fn update_plan_touches_only_bin() {
        let plan = apply_plan(InstallMode::Update, &InstallLayout::default(), ARCHIVE);
        assert_eq!(
            rendered(&plan),
            vec![
                "rm -rf /opt/buckyos/bin",
                "tar -xzf /tmp/tmp.mock01/rootfs.tar.gz -C /opt/buckyos bin",
            ]
        );
    }

    #[test]
    fn plan_quotes_unusual_roots() {
        let plan = apply_plan(InstallMode::Update, &InstallLayout::new("/opt/bucky os"), ARCHIVE);
        assert_eq!(plan[0].to_string(), "rm -rf '/opt/bucky os/bin'");
    }

    #[tokio::test]
    async fn apply_stops_at_first_failure() {
        let device = MockDevice::new(false);
        device.inject(Fault::stderr("tar", "tar: invalid magic"));
        let plan = apply_plan(InstallMode::Fresh, &InstallLayout::default(), ARCHIVE);

        let err = apply(&device, &plan).await.unwrap_err();

        match err {
            InstallError::RemoteCommandFailed { command, stderr } => {
                assert!(command.starts_with("tar -xzf"));
                assert_eq!(stderr, "tar: invalid magic");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(device.commands().len(), 2);
    }

    #[tokio::test]
    async fn identity_not_configured() {
        let device = MockDevice::new(false);
        let target = DeviceTarget::new("ood1", "10.0.0.2", "root");
        let result = provision_identity(&device, &target, &InstallLayout::default())
            .await
            .unwrap();
        assert_eq!(result, IdentityProvision::NotConfigured);
        assert!(device.uploads().is_empty());
    }

    #[tokio::test]
    async fn identity_missing_locally() {
        let device = MockDevice::new(false);
        let target = DeviceTarget::new("ood1", "10.0.0.2", "root")
            .with_identity_artifact("/nonexistent/ood1.conf");
        let result = provision_identity(&device, &target, &InstallLayout::default())
            .await
            .unwrap();
        assert_eq!(
            result,
            IdentityProvision::Missing(PathBuf::from("/nonexistent/ood1.conf"))
        );
        assert!(device.uploads().is_empty());
    }

    #[tokio::test]
    async fn identity_copied_to_well_known_name() {
        let identity = tempfile::NamedTempFile::new().unwrap();
        let device = MockDevice::new(false);
        let target =
            DeviceTarget::new("ood1", "10.0.0.2", "root").with_identity_artifact(identity.path());

        let result = provision_identity(&device, &target, &InstallLayout::default())
            .await
            .unwrap();

        assert_eq!(
            result,
            IdentityProvision::Provisioned("/opt/buckyos/etc/device.conf".into())
        );
        let uploads = device.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].local, identity.path());
    }
}
