//! Permission module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every platform-defined permission.
const PLATFORM_PERMISSION_PREFIX: &str = "android.permission.";

/// Declared enforcement strength of a custom permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtectionLevel {
    /// Granted to any application asking for it.
    Normal,
    /// Granted after user confirmation.
    Dangerous,
    /// Granted only to applications signed with the same key.
    Signature,
    /// Signature, or system image applications.
    SignatureOrSystem,
}

impl ProtectionLevel {
    /// Checks if any third-party application can obtain the permission.
    pub fn is_weak(self) -> bool {
        match self {
            Self::Normal | Self::Dangerous => true,
            Self::Signature | Self::SignatureOrSystem => false,
        }
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Dangerous => "dangerous",
            Self::Signature => "signature",
            Self::SignatureOrSystem => "signature-or-system",
        };
        f.write_str(name)
    }
}

/// `<permission>` declaration of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDeclaration {
    name: String,
    #[serde(default)]
    protection: Option<ProtectionLevel>,
}

impl PermissionDeclaration {
    /// Creates a declaration without a protection level.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            protection: None,
        }
    }

    /// Sets the protection level.
    pub fn with_protection(mut self, protection: ProtectionLevel) -> Self {
        self.protection = Some(protection);
        self
    }

    /// Gets the name of the permission.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the declared protection level.
    pub fn protection(&self) -> Option<ProtectionLevel> {
        self.protection
    }
}

/// How a permission reference was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Resolved to exactly one declaration in the application.
    Declared,
    /// Platform permission, enforced by the system.
    Platform,
    /// Dangling reference.
    Unresolved,
}

/// Relation between a permission, its protection and the components enforcing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionEdge {
    permission: String,
    protection: Option<ProtectionLevel>,
    resolution: Resolution,
    enforced_by: Vec<String>,
}

impl PermissionEdge {
    pub(crate) fn new<S: Into<String>>(
        permission: S,
        protection: Option<ProtectionLevel>,
        resolution: Resolution,
    ) -> Self {
        Self {
            permission: permission.into(),
            protection,
            resolution,
            enforced_by: Vec::new(),
        }
    }

    pub(crate) fn add_enforcer<S: Into<String>>(&mut self, component: S) {
        self.enforced_by.push(component.into());
        self.enforced_by.sort();
        self.enforced_by.dedup();
    }

    /// Gets the permission name.
    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Gets the declared protection level, if any.
    pub fn protection(&self) -> Option<ProtectionLevel> {
        self.protection
    }

    /// Gets the resolution of the permission.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Gets the components enforcing the permission, sorted.
    pub fn enforced_by(&self) -> &[String] {
        &self.enforced_by
    }

    /// Checks if the permission fails to keep third-party applications out.
    ///
    /// A custom permission with no protection level defaults to `normal`.
    pub fn is_weak(&self) -> bool {
        self.resolution == Resolution::Declared
            && self.protection.map_or(true, ProtectionLevel::is_weak)
    }
}

/// Checks if the permission is defined by the platform.
pub fn is_platform_permission(name: &str) -> bool {
    name.starts_with(PLATFORM_PERMISSION_PREFIX)
}
