//! Builder for one stunnel service section.
//!
//! A service is a single proxy: it listens on `accept`, forwards to one or
//! more `connect` targets, and runs either as a client (plaintext in, TLS out)
//! or as a server (TLS in, plaintext out, the default).
//!
//! Call [`ServiceBuilder::apply`] when done. It consumes the builder, writes
//! `[name]` plus the collected options into the parent and hands the parent
//! back. A service that is never applied contributes nothing.
//!
//! # Example
//!
//! ```no_run
//! use stunnel_launcher::stunnel::{SslVersion, StunnelBuilder};
//!
//! let mut builder = StunnelBuilder::new("/usr/bin/stunnel", "/var/lib/myapp");
//! builder
//!     .add_service("imap")
//!     .client(true)
//!     .accept_local(1143)
//!     .connect(Some("imap.example.com"), 993)
//!     .ssl_version_min(SslVersion::TlsV1_2)
//!     .apply();
//! let stunnel = builder.start()?;
//! # Ok::<(), stunnel_launcher::stunnel::StunnelError>(())
//! ```

use std::path::Path;

use super::builder::StunnelBuilder;
use super::error::StunnelError;
use super::lines::ConfigLines;
use super::option::StunnelOption;
use super::psk::{PreSharedKey, write_secrets_file};
use super::value::{OptionValue, SslCipher, SslVersion, Tls13CipherSuite};

const KEY_ACCEPT: &str = "accept";
const KEY_CA_FILE: &str = "CAfile";
const KEY_CERT: &str = "cert";
const KEY_CHECK_HOST: &str = "checkHost";
const KEY_CIPHERS: &str = "ciphers";
const KEY_CIPHERSUITES: &str = "ciphersuites";
const KEY_CLIENT: &str = "client";
const KEY_CONNECT: &str = "connect";
const KEY_DELAY: &str = "delay";
const KEY_KEY: &str = "key";
const KEY_PSK_IDENTITY: &str = "PSKidentity";
const KEY_PSK_SECRETS: &str = "PSKsecrets";
const KEY_SNI: &str = "sni";
const KEY_SSL_VERSION: &str = "sslVersion";
const KEY_SSL_VERSION_MAX: &str = "sslVersionMax";
const KEY_SSL_VERSION_MIN: &str = "sslVersionMin";
const KEY_VERIFY_CHAIN: &str = "verifyChain";

/// `host:port`, or just `port` when there is no host.
fn address(host: Option<&str>, port: u16) -> String {
    match host {
        Some(host) if !host.is_empty() => format!("{host}:{port}"),
        _ => port.to_string(),
    }
}

fn path_value(path: &Path) -> OptionValue {
    OptionValue::Raw(path.to_string_lossy().into_owned())
}

/// Builder for one `[name]` section of a stunnel config.
pub struct ServiceBuilder<'a> {
    parent: &'a mut StunnelBuilder,
    name: String,
    config: ConfigLines,
}

impl<'a> ServiceBuilder<'a> {
    pub(crate) fn new(parent: &'a mut StunnelBuilder, name: String) -> Self {
        Self {
            parent,
            name,
            config: ConfigLines::new(),
        }
    }

    /// The service name used for the section header.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lines collected so far, without the section header.
    pub fn lines(&self) -> Vec<&str> {
        self.config.lines()
    }

    /// Set an arbitrary option, replacing an earlier value for the same key.
    pub fn option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.config.set_option(StunnelOption::new(key, value));
        self
    }

    /// Listen on `host:port`.
    ///
    /// Without a host stunnel listens on all IPv4 addresses. Pass `localhost`
    /// (or use [`accept_local`](Self::accept_local)) to refuse connections
    /// from other machines.
    pub fn accept(self, host: Option<&str>, port: u16) -> Self {
        self.option(KEY_ACCEPT, address(host, port))
    }

    /// Listen on all IPv4 addresses.
    pub fn accept_port(self, port: u16) -> Self {
        self.accept(None, port)
    }

    /// Listen on all IPv6 addresses (`:::port`).
    pub fn accept_ipv6(self, port: u16) -> Self {
        self.accept(Some("::"), port)
    }

    /// Listen on the loopback interface only.
    pub fn accept_local(self, port: u16) -> Self {
        self.accept(Some("localhost"), port)
    }

    /// Add a destination.
    ///
    /// Unlike every other option, `connect` is not deduplicated: each call adds
    /// its own line and stunnel picks among them round-robin. Without a host
    /// stunnel connects to localhost.
    pub fn connect(mut self, host: Option<&str>, port: u16) -> Self {
        let line = StunnelOption::new(KEY_CONNECT, address(host, port)).to_config_line();
        self.config.add_raw_line(line);
        self
    }

    /// Add a destination on localhost.
    pub fn connect_port(self, port: u16) -> Self {
        self.connect(None, port)
    }

    /// Client mode (remote side speaks TLS). Default: server mode.
    pub fn client(self, is_client: bool) -> Self {
        self.option(KEY_CLIENT, is_client)
    }

    /// Permitted ciphers for TLS 1.2 and below, in order.
    ///
    /// Does not affect TLS 1.3; see [`ciphersuites`](Self::ciphersuites).
    pub fn ciphers(self, ciphers: &[SslCipher]) -> Self {
        self.option(KEY_CIPHERS, OptionValue::list(ciphers))
    }

    /// Permitted TLS 1.3 ciphersuites in order of preference.
    pub fn ciphersuites(self, suites: &[Tls13CipherSuite]) -> Self {
        self.option(KEY_CIPHERSUITES, OptionValue::list(suites.iter().copied()))
    }

    /// Delay DNS lookup of the `connect` targets until a client connects.
    ///
    /// Needed for dynamic DNS names, or when DNS is unavailable at startup.
    pub fn delay(self, delay: bool) -> Self {
        self.option(KEY_DELAY, delay)
    }

    /// PSK identity a client presents. Ignored in server mode.
    pub fn psk_identity(self, identity: &str) -> Self {
        self.option(KEY_PSK_IDENTITY, identity)
    }

    /// Write `secrets` to a file in the build's workspace and point
    /// `PSKsecrets` at it.
    ///
    /// # Errors
    ///
    /// Fails if an entry is invalid or the file cannot be written. Nothing
    /// written by this call survives a failure.
    pub fn psk_secrets(mut self, secrets: &[PreSharedKey]) -> Result<Self, StunnelError> {
        let path = write_secrets_file(self.parent.workspace_mut(), secrets)?;
        Ok(self.option(KEY_PSK_SECRETS, path_value(&path)))
    }

    /// Exact TLS protocol version (sets both floor and ceiling).
    pub fn ssl_version(self, version: SslVersion) -> Self {
        self.option(KEY_SSL_VERSION, version)
    }

    /// Highest accepted protocol version.
    pub fn ssl_version_max(self, version: SslVersion) -> Self {
        self.option(KEY_SSL_VERSION_MAX, version)
    }

    /// Lowest accepted protocol version.
    pub fn ssl_version_min(self, version: SslVersion) -> Self {
        self.option(KEY_SSL_VERSION_MIN, version)
    }

    /// Certificate chain file (PEM).
    pub fn cert(self, path: &Path) -> Self {
        self.option(KEY_CERT, path_value(path))
    }

    /// Private key file (PEM).
    pub fn key(self, path: &Path) -> Self {
        self.option(KEY_KEY, path_value(path))
    }

    /// CA certificates used to verify the peer.
    pub fn ca_file(self, path: &Path) -> Self {
        self.option(KEY_CA_FILE, path_value(path))
    }

    /// Verify the peer certificate chain.
    pub fn verify_chain(self, verify: bool) -> Self {
        self.option(KEY_VERIFY_CHAIN, verify)
    }

    /// Host name the peer certificate must match.
    pub fn check_host(self, host: &str) -> Self {
        self.option(KEY_CHECK_HOST, host)
    }

    /// Server Name Indication sent by a client.
    pub fn sni(self, server_name: &str) -> Self {
        self.option(KEY_SNI, server_name)
    }

    /// Finish the service: append `[name]` and its lines to the parent.
    pub fn apply(self) -> &'a mut StunnelBuilder {
        let header = format!("[{}]", self.name);
        let lines: Vec<String> = self.config.lines().into_iter().map(String::from).collect();
        self.parent.push_section(header, lines);
        self.parent
    }
}
