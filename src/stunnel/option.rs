//! A single `key = value` option.

use super::value::OptionValue;

/// A key/value pair as it appears in a stunnel config file.
///
/// Uniqueness of keys is the owning builder's business; see
/// [`ConfigLines::set_option`](super::lines::ConfigLines::set_option).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunnelOption {
    key: String,
    value: OptionValue,
}

impl StunnelOption {
    /// Create an option.
    pub fn new(key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The option key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The option value.
    pub fn value(&self) -> &OptionValue {
        &self.value
    }

    /// Format as a config file line (`key = value`).
    pub fn to_config_line(&self) -> String {
        format!("{} = {}", self.key, self.value)
    }
}
