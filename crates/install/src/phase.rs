//! Install session phases.

use std::fmt;

/// Where an install session is.
///
/// ```text
/// Init -> Packaged -> ModeDetected -> Uploaded -> Applied
///      -> [IdentityProvisioned] -> CleanedUp -> Done
/// ```
///
/// `Failed` is reachable from every non-terminal phase. `Done` and
/// `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    Packaged,
    ModeDetected,
    Uploaded,
    Applied,
    /// Fresh installs only, and only when an identity file was copied.
    IdentityProvisioned,
    CleanedUp,
    Done,
    Failed { cause: String },
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_advance_to(&self, next: &Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (current, Failed { .. }) => !current.is_terminal(),
            (Init, Packaged)
            | (Packaged, ModeDetected)
            | (ModeDetected, Uploaded)
            | (Uploaded, Applied)
            | (Applied, IdentityProvisioned)
            | (Applied, CleanedUp)
            | (IdentityProvisioned, CleanedUp)
            | (CleanedUp, Done) => true,
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Packaged => "packaged",
            Self::ModeDetected => "mode-detected",
            Self::Uploaded => "uploaded",
            Self::Applied => "applied",
            Self::IdentityProvisioned => "identity-provisioned",
            Self::CleanedUp => "cleaned-up",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
