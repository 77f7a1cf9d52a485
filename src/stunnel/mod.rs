//! stunnel configuration building and process supervision.
//!
//! This module turns a typed description of TLS proxy services into a stunnel
//! config file, runs stunnel against it and waits until stunnel reports that
//! the configuration is applied.
//!
//! # Flow
//!
//! ```text
//! StunnelBuilder ──add_service()──► ServiceBuilder ──apply()──┐
//!       ▲                                                       │
//!       └───────────────────────────────────────────────────────┘
//!       │
//!       │ create()
//!       ▼
//! <app_dir>/stunnel/tmp/<uuid>/stunnel.conf   (+ PSK secrets files)
//!       │
//!       │ StunnelProcess::start()
//!       ▼
//! stunnel <config>  ── stderr ──► "Configuration successful" ──► Ready
//! ```
//!
//! The workspace directory is deleted as soon as `start` returns.
//!
//! # Limitations
//!
//! - No escaping: values and section names are written verbatim
//! - No readiness timeout: `start` blocks until the sentinel or end of stderr
//! - Files stunnel might re-read later (PSK secrets) are already gone by then

pub mod builder;
pub mod error;
pub mod lines;
pub mod option;
pub mod process;
pub mod psk;
pub mod service;
pub mod value;
pub mod workspace;

// Re-export main types for convenience
pub use builder::{BYTE_ORDER_MARK, StunnelBuilder};
pub use error::StunnelError;
pub use lines::ConfigLines;
pub use option::StunnelOption;
pub use process::{
    ProcessState, READY_SENTINEL, Readiness, StunnelProcess, stunnel_available, stunnel_version,
    wait_for_ready,
};
pub use psk::{PreSharedKey, secrets_file_content, write_secrets_file};
pub use service::ServiceBuilder;
pub use value::{OptionValue, SslCipher, SslVersion, Tls13CipherSuite};
pub use workspace::{CONFIG_FILE_NAME, PurgeGate, WORKSPACE_SUBDIR, Workspace};
