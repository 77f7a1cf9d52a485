//! Typed option values and their stunnel text form.
//!
//! stunnel's config format has no quoting or escaping, so every value is
//! rendered as a bare token:
//!
//! - booleans become `yes` / `no`
//! - enumerations become their canonical token (`TLSv1.2`, not `TlsV1_2`)
//! - lists are joined with `:` (an empty list renders as an empty string)
//! - raw strings are passed through unchanged
//!
//! Raw strings are not validated. Line breaks or `[` at the start of a value
//! will corrupt the generated file; callers must avoid them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter used between list elements.
pub const LIST_DELIMITER: &str = ":";

/// A value that can appear on the right-hand side of `key = value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Rendered as `yes` or `no`.
    Bool(bool),
    /// A token from a fixed vocabulary.
    Token(&'static str),
    /// Ordered values joined with `:`.
    List(Vec<OptionValue>),
    /// Opaque text, rendered verbatim.
    Raw(String),
}

impl OptionValue {
    /// Build a list value from anything convertible into option values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OptionValue>,
    {
        OptionValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => f.write_str("yes"),
            OptionValue::Bool(false) => f.write_str("no"),
            OptionValue::Token(token) => f.write_str(token),
            OptionValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(LIST_DELIMITER)?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            OptionValue::Raw(text) => f.write_str(text),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Raw(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Raw(value.to_string())
    }
}

impl From<u16> for OptionValue {
    fn from(value: u16) -> Self {
        OptionValue::Raw(value.to_string())
    }
}

/// TLS protocol versions understood by `sslVersion`, `sslVersionMin` and
/// `sslVersionMax`.
///
/// Which versions actually work depends on the OpenSSL build linked into the
/// stunnel binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SslVersion {
    /// Every version supported by the linked OpenSSL.
    #[serde(rename = "all")]
    All,
    /// SSLv2 (obsolete).
    #[serde(rename = "SSLv2")]
    SslV2,
    /// SSLv3 (obsolete).
    #[serde(rename = "SSLv3")]
    SslV3,
    /// TLS 1.0.
    #[serde(rename = "TLSv1")]
    TlsV1,
    /// TLS 1.1.
    #[serde(rename = "TLSv1.1")]
    TlsV1_1,
    /// TLS 1.2.
    #[serde(rename = "TLSv1.2")]
    TlsV1_2,
    /// TLS 1.3.
    #[serde(rename = "TLSv1.3")]
    TlsV1_3,
}

impl SslVersion {
    /// The token stunnel expects for this version.
    pub fn as_str(self) -> &'static str {
        match self {
            SslVersion::All => "all",
            SslVersion::SslV2 => "SSLv2",
            SslVersion::SslV3 => "SSLv3",
            SslVersion::TlsV1 => "TLSv1",
            SslVersion::TlsV1_1 => "TLSv1.1",
            SslVersion::TlsV1_2 => "TLSv1.2",
            SslVersion::TlsV1_3 => "TLSv1.3",
        }
    }
}

impl From<SslVersion> for OptionValue {
    fn from(value: SslVersion) -> Self {
        OptionValue::Token(value.as_str())
    }
}

/// TLS 1.3 ciphersuites for the `ciphersuites` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Tls13CipherSuite {
    /// `TLS_AES_256_GCM_SHA384`
    #[serde(rename = "TLS_AES_256_GCM_SHA384")]
    Aes256GcmSha384,
    /// `TLS_CHACHA20_POLY1305_SHA256`
    #[serde(rename = "TLS_CHACHA20_POLY1305_SHA256")]
    Chacha20Poly1305Sha256,
    /// `TLS_AES_128_GCM_SHA256`
    #[serde(rename = "TLS_AES_128_GCM_SHA256")]
    Aes128GcmSha256,
}

impl Tls13CipherSuite {
    /// The IANA name stunnel expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Tls13CipherSuite::Aes256GcmSha384 => "TLS_AES_256_GCM_SHA384",
            Tls13CipherSuite::Chacha20Poly1305Sha256 => "TLS_CHACHA20_POLY1305_SHA256",
            Tls13CipherSuite::Aes128GcmSha256 => "TLS_AES_128_GCM_SHA256",
        }
    }
}

impl From<Tls13CipherSuite> for OptionValue {
    fn from(value: Tls13CipherSuite) -> Self {
        OptionValue::Token(value.as_str())
    }
}

/// An OpenSSL cipher name for the `ciphers` option (TLS 1.2 and below).
///
/// The set of names depends on the linked OpenSSL, so this is an open
/// newtype rather than an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SslCipher(String);

impl SslCipher {
    /// Wrap an OpenSSL cipher name such as `ECDHE-RSA-AES256-GCM-SHA384`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The cipher name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SslCipher> for OptionValue {
    fn from(value: SslCipher) -> Self {
        OptionValue::Raw(value.0)
    }
}

impl From<&SslCipher> for OptionValue {
    fn from(value: &SslCipher) -> Self {
        OptionValue::Raw(value.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_formatting() {
        assert_eq!(OptionValue::Bool(true).to_string(), "yes");
        assert_eq!(OptionValue::Bool(false).to_string(), "no");
    }

    #[test]
    fn test_version_uses_canonical_token() {
        assert_eq!(OptionValue::from(SslVersion::TlsV1_2).to_string(), "TLSv1.2");
        assert_eq!(OptionValue::from(SslVersion::All).to_string(), "all");
        assert_eq!(OptionValue::from(SslVersion::SslV3).to_string(), "SSLv3");
    }

    #[test]
    fn test_empty_list_is_empty_string() {
        let empty: Vec<SslCipher> = Vec::new();
        assert_eq!(OptionValue::list(empty).to_string(), "");
    }

    #[test]
    fn test_list_splits_back_into_tokens() {
        let suites = [
            Tls13CipherSuite::Chacha20Poly1305Sha256,
            Tls13CipherSuite::Aes256GcmSha384,
            Tls13CipherSuite::Aes128GcmSha256,
        ];
        let rendered = OptionValue::list(suites).to_string();
        let tokens: Vec<&str> = rendered.split(LIST_DELIMITER).collect();
        let expected: Vec<&str> = suites.iter().map(|s| s.as_str()).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_single_element_list_has_no_delimiter() {
        let value = OptionValue::list([SslCipher::new("AES256-SHA")]);
        assert_eq!(value.to_string(), "AES256-SHA");
    }

    #[test]
    fn test_nested_list_elements_format_recursively() {
        let value = OptionValue::List(vec![
            OptionValue::Bool(true),
            OptionValue::List(vec!["a".into(), "b".into()]),
            OptionValue::from(SslVersion::TlsV1_3),
        ]);
        assert_eq!(value.to_string(), "yes:a:b:TLSv1.3");
    }

    #[test]
    fn test_raw_is_unchanged() {
        let value = OptionValue::from("host with spaces:443");
        assert_eq!(value.to_string(), "host with spaces:443");
    }

    #[test]
    fn test_version_deserializes_from_token() {
        #[derive(Deserialize)]
        struct Holder {
            v: SslVersion,
        }
        let holder: Holder = toml::from_str(r#"v = "TLSv1.1""#).unwrap();
        assert_eq!(holder.v, SslVersion::TlsV1_1);
    }
}
