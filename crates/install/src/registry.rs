//! Device resolution.

use std::collections::HashMap;

use rootdeploy_remote::DeviceTarget;
use tracing::debug;

use crate::error::InstallError;

/// Resolves a device identifier to its connection parameters.
pub trait DeviceRegistry: Send + Sync {
    /// Returns the validated target for `device_id`.
    fn resolve(&self, device_id: &str) -> Result<DeviceTarget, InstallError>;
}

/// Registry backed by an in-memory map, typically built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    devices: HashMap<String, DeviceTarget>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the target under its own id.
    pub fn insert(&mut self, target: DeviceTarget) {
        self.devices.insert(target.id.clone(), target);
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Known device ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.devices.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<DeviceTarget> for StaticRegistry {
    fn from_iter<I: IntoIterator<Item = DeviceTarget>>(iter: I) -> Self {
        let mut registry = Self::new();
        for target in iter {
            registry.insert(target);
        }
        registry
    }
}

impl DeviceRegistry for StaticRegistry {
    fn resolve(&self, device_id: &str) -> Result<DeviceTarget, InstallError> {
        let Some(target) = self.devices.get(device_id).cloned() else {
            debug!(device = device_id, known = ?self.ids(), "device not in registry");
            return Err(InstallError::DeviceNotFound(device_id.to_string()));
        };
        target.validate()?;
        Ok(target)
    }
}
