//! Configuration schema definitions.
//!
//! ```toml
//! [general]
//! binary = "/usr/bin/stunnel"
//! app_dir = "/var/lib/stunnel-launcher"
//!
//! [global]
//! debug = "5"
//!
//! [[services]]
//! name = "imap"
//! client = true
//! accept = { host = "localhost", port = 1143 }
//! connect = [{ host = "imap.example.com", port = 993 }]
//! ssl_version_min = "TLSv1.2"
//!
//! [[services.psk_secrets]]
//! identity = "laptop"
//! key = "0123456789abcdef0123456789abcdef"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use super::error::ConfigError;
use crate::stunnel::{
    PreSharedKey, SslCipher, SslVersion, StunnelBuilder, StunnelError, Tls13CipherSuite,
};

/// Binary used when none is configured (looked up in `PATH`).
pub const DEFAULT_BINARY: &str = "stunnel";

/// Directory name under the user's data directory used as default app dir.
pub const DEFAULT_APP_DIR_NAME: &str = "stunnel-launcher";

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Global stunnel options, written before any service.
    #[serde(default)]
    pub global: BTreeMap<String, String>,

    /// Service sections, in file order.
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

impl Config {
    /// Merge another config into this one.
    ///
    /// Scalars are overridden, global options are merged by key (later values
    /// win) and services are appended.
    pub fn merge(&mut self, other: Config) {
        self.general.merge(other.general);
        self.global.extend(other.global);
        self.services.extend(other.services);
    }

    /// Check the parts stunnel would reject or this crate cannot write.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for (i, service) in self.services.iter().enumerate() {
            let label = service.label(i);

            if let Some(name) = &service.name {
                if name.is_empty() {
                    return Err(ConfigError::invalid(label, "name must not be empty"));
                }
                if !names.insert(name.as_str()) {
                    return Err(ConfigError::invalid(label, "duplicate service name"));
                }
            }
            if service.accept.is_none() {
                return Err(ConfigError::invalid(label, "missing accept address"));
            }
            if service.connect.is_empty() {
                return Err(ConfigError::invalid(label, "at least one connect address is required"));
            }
            for psk in &service.psk_secrets {
                psk.validate().map_err(|e| ConfigError::invalid(label.clone(), e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Add the global options and every service to `builder`.
    pub fn apply_to(&self, builder: &mut StunnelBuilder) -> Result<(), StunnelError> {
        for (key, value) in &self.global {
            builder.option(key, value.as_str());
        }
        for service in &self.services {
            service.apply_to(builder)?;
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Path to the stunnel binary.
    pub binary: Option<PathBuf>,
    /// Directory holding `stunnel/tmp`.
    pub app_dir: Option<PathBuf>,
}

impl GeneralConfig {
    fn merge(&mut self, other: GeneralConfig) {
        if other.binary.is_some() {
            self.binary = other.binary;
        }
        if other.app_dir.is_some() {
            self.app_dir = other.app_dir;
        }
    }

    /// Configured binary, or `stunnel` from `PATH`.
    pub fn binary(&self) -> PathBuf {
        self.binary
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY))
    }

    /// Configured app dir, or `<data_local_dir>/stunnel-launcher`.
    pub fn app_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.app_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|d| d.join(DEFAULT_APP_DIR_NAME))
                .ok_or(ConfigError::NoDataDirectory),
        }
    }
}

/// A `host:port` pair; the host may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddressConfig {
    /// Host name or address.
    #[serde(default)]
    pub host: Option<String>,
    /// TCP port.
    pub port: u16,
}

/// One stunnel service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Section name; random when omitted.
    pub name: Option<String>,
    /// Client mode.
    pub client: Option<bool>,
    /// Listen address.
    pub accept: Option<AddressConfig>,
    /// Destinations, used round-robin.
    #[serde(default)]
    pub connect: Vec<AddressConfig>,
    /// Delay DNS lookup of the destinations.
    pub delay: Option<bool>,
    /// Ciphers for TLS 1.2 and below.
    #[serde(default)]
    pub ciphers: Vec<SslCipher>,
    /// TLS 1.3 ciphersuites.
    #[serde(default)]
    pub ciphersuites: Vec<Tls13CipherSuite>,
    /// Exact protocol version.
    pub ssl_version: Option<SslVersion>,
    /// Highest protocol version.
    pub ssl_version_max: Option<SslVersion>,
    /// Lowest protocol version.
    pub ssl_version_min: Option<SslVersion>,
    /// PSK identity presented by a client.
    pub psk_identity: Option<String>,
    /// PSK identities and keys.
    #[serde(default)]
    pub psk_secrets: Vec<PreSharedKey>,
    /// Certificate chain file.
    pub cert: Option<PathBuf>,
    /// Private key file.
    pub key: Option<PathBuf>,
    /// CA file for peer verification.
    pub ca_file: Option<PathBuf>,
    /// Verify the peer certificate chain.
    pub verify_chain: Option<bool>,
    /// Host name the peer certificate must match.
    pub check_host: Option<String>,
    /// SNI sent by a client.
    pub sni: Option<String>,
    /// Any other stunnel service options, written verbatim.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ServiceConfig {
    fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("services[{index}] ({name})"),
            None => format!("services[{index}]"),
        }
    }

    /// Add this service to `builder`.
    pub fn apply_to(&self, builder: &mut StunnelBuilder) -> Result<(), StunnelError> {
        let mut svc = match &self.name {
            Some(name) => builder.add_service(name.as_str()),
            None => builder.add_unnamed_service(),
        };

        if let Some(client) = self.client {
            svc = svc.client(client);
        }
        if let Some(accept) = &self.accept {
            svc = svc.accept(accept.host.as_deref(), accept.port);
        }
        for target in &self.connect {
            svc = svc.connect(target.host.as_deref(), target.port);
        }
        if let Some(delay) = self.delay {
            svc = svc.delay(delay);
        }
        if !self.ciphers.is_empty() {
            svc = svc.ciphers(&self.ciphers);
        }
        if !self.ciphersuites.is_empty() {
            svc = svc.ciphersuites(&self.ciphersuites);
        }
        if let Some(version) = self.ssl_version {
            svc = svc.ssl_version(version);
        }
        if let Some(version) = self.ssl_version_max {
            svc = svc.ssl_version_max(version);
        }
        if let Some(version) = self.ssl_version_min {
            svc = svc.ssl_version_min(version);
        }
        if let Some(identity) = &self.psk_identity {
            svc = svc.psk_identity(identity);
        }
        if !self.psk_secrets.is_empty() {
            svc = svc.psk_secrets(&self.psk_secrets)?;
        }
        if let Some(cert) = &self.cert {
            svc = svc.cert(cert);
        }
        if let Some(key) = &self.key {
            svc = svc.key(key);
        }
        if let Some(ca_file) = &self.ca_file {
            svc = svc.ca_file(ca_file);
        }
        if let Some(verify) = self.verify_chain {
            svc = svc.verify_chain(verify);
        }
        if let Some(host) = &self.check_host {
            svc = svc.check_host(host);
        }
        if let Some(sni) = &self.sni {
            svc = svc.sni(sni);
        }
        for (key, value) in &self.options {
            svc = svc.option(key, value.as_str());
        }

        svc.apply();
        Ok(())
    }
}
