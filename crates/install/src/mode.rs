//! Install mode detection.

use rootdeploy_remote::{RemoteCommand, RemoteDevice, RetryPolicy, retry_transient};
use tracing::info;

use crate::error::InstallError;
use crate::exec::check_output;
use crate::types::{InstallLayout, InstallMode};

const PRESENT: &str = "exists";
const ABSENT: &str = "missing";

/// Read-only check printing `exists` or `missing` for the install root.
///
/// The root is passed as a positional parameter to `sh -c`, never spliced
/// into the script.
pub fn mode_check(layout: &InstallLayout) -> RemoteCommand {
    RemoteCommand::new("sh").args([
        "-c",
        "if [ -d \"$1\" ]; then echo exists; else echo missing; fi",
        "sh",
        layout.install_root.as_str(),
    ])
}

/// Decides between `Fresh` and `Update` by probing the install root.
pub(crate) async fn detect_mode(
    device: &dyn RemoteDevice,
    layout: &InstallLayout,
    retry: &RetryPolicy,
) -> Result<InstallMode, InstallError> {
    let check = mode_check(layout);
    let check_ref = &check;
    let output = retry_transient(retry, "mode detection", move || {
        device.run_command(check_ref)
    })
    .await?;
    let output = check_output(&check, output)?;

    let mode = match output.stdout.trim() {
        PRESENT => InstallMode::Update,
        ABSENT => InstallMode::Fresh,
        other => {
            return Err(InstallError::RemoteCommandFailed {
                command: check.to_string(),
                stderr: format!("unexpected mode check output: {other:?}"),
            });
        }
    };

    info!(
        destination = device.destination(),
        install_root = %layout.install_root,
        %mode,
        "install mode detected"
    );
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Fault, MockDevice};

    #[test]
    fn check_keeps_root_as_separate_argument() {
        let check = mode_check(&InstallLayout::new("/opt/my root"));
        assert_eq!(check.program(), "sh");
        assert_eq!(check.arguments().last().unwrap(), "/opt/my root");
    }

    #[tokio::test]
    async fn absent_root_is_fresh() {
        let device = MockDevice::new(false);
        let mode = detect_mode(&device, &InstallLayout::default(), &RetryPolicy::none())
            .await
            .unwrap();
        assert_eq!(mode, InstallMode::Fresh);
    }

    #[tokio::test]
    async fn present_root_is_update() {
        let device = MockDevice::new(true);
        let mode = detect_mode(&device, &InstallLayout::default(), &RetryPolicy::none())
            .await
            .unwrap();
        assert_eq!(mode, InstallMode::Update);
    }

    #[tokio::test]
    async fn stderr_is_fatal() {
        let device = MockDevice::new(true);
        device.inject(Fault::stderr("sh -c", "sh: permission denied"));
        let err = detect_mode(&device, &InstallLayout::default(), &RetryPolicy::none())
            .await
            .unwrap_err();
        let InstallError::RemoteCommandFailed { stderr, .. } = err else {
            panic!("expected RemoteCommandFailed, got {err:?}");
        };
        assert!(stderr.contains("permission denied"));
    }

    #[tokio::test]
    async fn garbage_output_is_fatal() {
        let device = MockDevice::new(true);
        device.inject(Fault::stdout("sh -c", "Welcome to BuckyOS!\n"));
        let err = detect_mode(&device, &InstallLayout::default(), &RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::RemoteCommandFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let device = MockDevice::new(false);
        device.inject(Fault::unreachable("sh -c").times(1));
        let mode = detect_mode(&device, &InstallLayout::default(), &RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(mode, InstallMode::Fresh);
        assert_eq!(device.commands().len(), 2);
    }

    #[tokio::test]
    async fn unreachable_without_retry_fails() {
        let device = MockDevice::new(false);
        device.inject(Fault::unreachable("sh -c"));
        let err = detect_mode(&device, &InstallLayout::default(), &RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::DeviceUnreachable(_)));
    }
}
