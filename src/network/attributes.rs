//! Device attribute definitions and defaulting rules.
//!
//! Every device carries a fixed, enumerated attribute set. Attributes are
//! seeded in three layers, later layers overriding earlier ones:
//!
//! 1. Built-in defaults (`device_type = "workstation"`, `admin_user = true`)
//! 2. A single uniform overlay applied to every device, if supplied
//! 3. Ordered node-definition batches (see [`crate::network::batches`])

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_device_type() -> Option<String> {
    Some("workstation".to_string())
}

/// Security-relevant attributes of a single device.
///
/// The key set is fixed so typos in scenario files fail at parse time
/// instead of silently creating untyped keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    /// Operating system label (e.g. "Windows Server 2019")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Patch level label (e.g. "patched", "unpatched")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_status: Option<String>,
    /// Device category (default: "workstation")
    #[serde(default = "default_device_type")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antivirus: Option<bool>,
    /// Whether the device runs with administrative privileges.
    /// Non-admin devices cannot propagate infection into admin devices.
    #[serde(default = "default_true")]
    pub admin_user: bool,
}

impl Default for DeviceAttributes {
    fn default() -> Self {
        Self {
            os: None,
            patch_status: None,
            device_type: default_device_type(),
            firewall_enabled: None,
            antivirus: None,
            admin_user: true,
        }
    }
}

impl DeviceAttributes {
    /// Apply a partial overlay, overriding only the fields it sets.
    pub fn apply(&mut self, overlay: &AttributeOverlay) {
        if let Some(os) = &overlay.os {
            self.os = Some(os.clone());
        }
        if let Some(patch_status) = &overlay.patch_status {
            self.patch_status = Some(patch_status.clone());
        }
        if let Some(device_type) = &overlay.device_type {
            self.device_type = Some(device_type.clone());
        }
        if let Some(firewall_enabled) = overlay.firewall_enabled {
            self.firewall_enabled = Some(firewall_enabled);
        }
        if let Some(antivirus) = overlay.antivirus {
            self.antivirus = Some(antivirus);
        }
        if let Some(admin_user) = overlay.admin_user {
            self.admin_user = admin_user;
        }
    }
}

/// Partial attribute map used by uniform overlays and node-definition batches.
///
/// Unknown keys are rejected at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub antivirus: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<bool>,
}

impl AttributeOverlay {
    /// Returns true if the overlay sets no fields at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
