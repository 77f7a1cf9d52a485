//! Pre-shared keys and the `PSKsecrets` file.
//!
//! stunnel reads PSK identities from a separate file, one `IDENTITY:KEY` per
//! line. The file must not carry a byte-order mark and should not be readable
//! by other users, so it is written with 0600 permissions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use super::error::StunnelError;
use super::workspace::{Workspace, write_private_file};

/// Separator between identity and key on a secrets line.
pub const PSK_SEPARATOR: char = ':';

/// A PSK identity and its key.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PreSharedKey {
    identity: String,
    key: String,
}

impl PreSharedKey {
    /// Create a PSK entry.
    ///
    /// # Errors
    ///
    /// Returns [`StunnelError::InvalidValue`] if either part is empty or
    /// contains a line break, or if the identity contains `:`.
    pub fn new(identity: impl Into<String>, key: impl Into<String>) -> Result<Self, StunnelError> {
        let psk = Self {
            identity: identity.into(),
            key: key.into(),
        };
        psk.validate()?;
        Ok(psk)
    }

    /// The PSK identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Check the invariants that keep a secrets line parseable.
    ///
    /// Entries built with [`PreSharedKey::new`] already hold; this matters for
    /// entries deserialized from a config file.
    pub fn validate(&self) -> Result<(), StunnelError> {
        let invalid = |field: &str, message: &str| StunnelError::InvalidValue {
            field: field.to_string(),
            message: message.to_string(),
        };

        if self.identity.is_empty() {
            return Err(invalid("PSK identity", "must not be empty"));
        }
        if self.key.is_empty() {
            return Err(invalid("PSK key", "must not be empty"));
        }
        if self.identity.contains(PSK_SEPARATOR) {
            return Err(invalid("PSK identity", "must not contain ':'"));
        }
        if self.identity.contains(['\n', '\r']) || self.key.contains(['\n', '\r']) {
            return Err(invalid("PSK entry", "must not contain line breaks"));
        }
        Ok(())
    }

    /// Format as a secrets file line (`identity:key`).
    pub fn to_config_line(&self) -> String {
        format!("{}{}{}", self.identity, PSK_SEPARATOR, self.key)
    }
}

impl std::fmt::Debug for PreSharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreSharedKey")
            .field("identity", &self.identity)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Render the content of a `PSKsecrets` file: one line per entry, no trailing
/// newline.
pub fn secrets_file_content(entries: &[PreSharedKey]) -> String {
    entries
        .iter()
        .map(PreSharedKey::to_config_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write a `PSKsecrets` file into `workspace` and return its absolute path.
///
/// # Errors
///
/// Returns [`StunnelError::InvalidValue`] for an invalid entry, or
/// [`StunnelError::ConfigWrite`] if the workspace or the file cannot be
/// written. A partially written file is removed first.
pub fn write_secrets_file(
    workspace: &mut Workspace,
    entries: &[PreSharedKey],
) -> Result<PathBuf, StunnelError> {
    for entry in entries {
        entry.validate()?;
    }

    let path = workspace.secondary_file()?;
    write_private_file(&path, secrets_file_content(entries).as_bytes())?;

    debug!("Wrote {} PSK entries to {:?}", entries.len(), path);
    Ok(path)
}
