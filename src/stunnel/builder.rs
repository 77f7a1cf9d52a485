//! Top-level stunnel configuration builder.
//!
//! [`StunnelBuilder`] collects global options and service sections, writes
//! them to a private config file and hands back a [`StunnelProcess`] bound to
//! that file.
//!
//! # File layout
//!
//! The generated file starts with a UTF-8 byte-order mark, then:
//!
//! 1. static options this crate depends on (`foreground = yes`, so stunnel
//!    logs to the stderr pipe that readiness detection reads)
//! 2. global options, in the order they were set
//! 3. service sections, in the order they were applied
//!
//! # Cleanup
//!
//! The workspace holding the config and PSK files moves into the returned
//! process handle and is removed as soon as `start` returns, successful or
//! not.

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::StunnelError;
use super::lines::ConfigLines;
use super::option::StunnelOption;
use super::process::StunnelProcess;
use super::service::ServiceBuilder;
use super::value::OptionValue;
use super::workspace::{PurgeGate, Workspace, write_private_file};

/// Byte-order mark written at the start of the primary config file.
pub const BYTE_ORDER_MARK: char = '\u{FEFF}';

const KEY_FOREGROUND: &str = "foreground";

/// Builder for a complete stunnel configuration.
#[derive(Debug)]
pub struct StunnelBuilder {
    binary: PathBuf,
    app_dir: PathBuf,
    global: ConfigLines,
    sections: ConfigLines,
    workspace: Workspace,
}

impl StunnelBuilder {
    /// Create a builder for the stunnel at `binary`.
    ///
    /// Temporary files go to `<app_dir>/stunnel/tmp/<uuid>/`.
    pub fn new(binary: impl Into<PathBuf>, app_dir: impl AsRef<Path>) -> Self {
        let app_dir = app_dir.as_ref().to_path_buf();
        Self {
            binary: binary.into(),
            workspace: Workspace::new(&app_dir),
            app_dir,
            global: ConfigLines::new(),
            sections: ConfigLines::new(),
        }
    }

    /// Use `gate` instead of the process-wide purge gate.
    ///
    /// Must be called before anything is written to the workspace.
    pub fn with_purge_gate(mut self, gate: &'static PurgeGate) -> Self {
        self.workspace = Workspace::with_gate(&self.app_dir, gate);
        self
    }

    /// Path of the stunnel binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Application directory the workspace lives under.
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    /// Set a global option, replacing an earlier value for the same key.
    pub fn set_option(&mut self, option: StunnelOption) -> &mut Self {
        self.global.set_option(option);
        self
    }

    /// Set a global option from a key and value.
    pub fn option(&mut self, key: &str, value: impl Into<OptionValue>) -> &mut Self {
        self.set_option(StunnelOption::new(key, value))
    }

    /// Start a new service section.
    ///
    /// An empty name is replaced by a random one, since stunnel needs a
    /// non-empty section header.
    pub fn add_service(&mut self, name: impl Into<String>) -> ServiceBuilder<'_> {
        let mut name = name.into();
        if name.is_empty() {
            name = Uuid::new_v4().to_string();
        }
        ServiceBuilder::new(self, name)
    }

    /// Start a new service section with a random name.
    pub fn add_unnamed_service(&mut self) -> ServiceBuilder<'_> {
        self.add_service(Uuid::new_v4().to_string())
    }

    pub(crate) fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub(crate) fn push_section(&mut self, header: String, lines: Vec<String>) {
        debug!("Adding stunnel service {} ({} options)", header, lines.len());
        self.sections.add_raw_line(header);
        for line in lines {
            self.sections.add_raw_line(line);
        }
    }

    /// Options added to every config regardless of user settings.
    pub fn static_config() -> ConfigLines {
        let mut lines = ConfigLines::new();
        lines.set_option(StunnelOption::new(KEY_FOREGROUND, true));
        lines
    }

    /// Global options set so far.
    pub fn global_options(&self) -> Vec<&str> {
        self.global.lines()
    }

    /// Lines of every applied service section, headers included.
    pub fn sections(&self) -> Vec<&str> {
        self.sections.lines()
    }

    /// Every line of the config file: static, global, then sections.
    pub fn config_lines(&self) -> Vec<String> {
        let static_config = Self::static_config();
        static_config
            .lines()
            .into_iter()
            .chain(self.global.lines())
            .chain(self.sections.lines())
            .map(String::from)
            .collect()
    }

    /// Config file text without the byte-order mark. Every line ends with `\n`.
    pub fn config_content(&self) -> String {
        let mut content = String::new();
        for line in self.config_lines() {
            content.push_str(&line);
            content.push('\n');
        }
        content
    }

    /// Write the config file and return a process handle that is not started.
    ///
    /// Starting the handle removes the workspace once `start` returns.
    ///
    /// # Errors
    ///
    /// Returns [`StunnelError::ConfigWrite`] if the workspace or the config
    /// file cannot be written.
    pub fn create(self) -> Result<StunnelProcess, StunnelError> {
        let content = self.config_content();
        let Self {
            binary,
            mut workspace,
            ..
        } = self;

        let config_path = workspace.config_file()?;
        let mut data = String::with_capacity(content.len() + BYTE_ORDER_MARK.len_utf8());
        data.push(BYTE_ORDER_MARK);
        data.push_str(&content);
        write_private_file(&config_path, data.as_bytes())?;

        info!("Wrote stunnel config to {:?}", config_path);

        Ok(StunnelProcess::new(binary, config_path).with_start_hook(move || {
            workspace.remove();
        }))
    }

    /// [`create`](Self::create) and start the process.
    ///
    /// Blocks until stunnel reports readiness. If starting fails the process is
    /// closed before the error is returned.
    pub fn start(self) -> Result<StunnelProcess, StunnelError> {
        let mut process = self.create()?;
        if let Err(e) = process.start() {
            process.close();
            return Err(e);
        }
        Ok(process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stunnel::process::ProcessState;
    use crate::stunnel::value::SslVersion;
    use std::fs;

    fn builder(app_dir: &Path) -> StunnelBuilder {
        static GATE: PurgeGate = PurgeGate::new();
        StunnelBuilder::new("/nonexistent/stunnel", app_dir).with_purge_gate(&GATE)
    }

    #[test]
    fn test_static_config() {
        assert_eq!(StunnelBuilder::static_config().lines(), vec!["foreground = yes"]);
    }

    #[test]
    fn test_section_order_follows_apply_order() {
        let mut b = builder(Path::new("/unused"));
        b.option("debug", "5");
        b.add_service("A").accept_port(1000).apply();
        b.add_service("B").accept_port(2000).apply();

        assert_eq!(
            b.config_lines(),
            vec![
                "foreground = yes",
                "debug = 5",
                "[A]",
                "accept = 1000",
                "[B]",
                "accept = 2000",
            ]
        );
    }

    #[test]
    fn test_globals_precede_sections_even_when_set_later() {
        let mut b = builder(Path::new("/unused"));
        b.add_service("A").client(true).apply();
        b.option("debug", "7").option("syslog", false);

        assert_eq!(
            b.config_lines(),
            vec!["foreground = yes", "debug = 7", "syslog = no", "[A]", "client = yes"]
        );
    }

    #[test]
    fn test_global_keys_do_not_touch_sections() {
        let mut b = builder(Path::new("/unused"));
        b.add_service("A").option("debug", "3").apply();
        b.option("debug", "5");
        b.option("debug", "6");

        assert_eq!(b.global_options(), vec!["debug = 6"]);
        assert_eq!(b.sections(), vec!["[A]", "debug = 3"]);
    }

    #[test]
    fn test_empty_and_missing_names_are_generated() {
        let mut b = builder(Path::new("/unused"));
        let name = b.add_service("").name().to_string();
        assert!(!name.is_empty());
        assert!(Uuid::parse_str(&name).is_ok());

        let a = b.add_unnamed_service().name().to_string();
        let c = b.add_unnamed_service().name().to_string();
        assert_ne!(a, c);
    }

    #[test]
    fn test_config_content_newlines() {
        let mut b = builder(Path::new("/unused"));
        b.add_service("x").ssl_version(SslVersion::TlsV1_3).apply();
        assert_eq!(
            b.config_content(),
            "foreground = yes\n[x]\nsslVersion = TLSv1.3\n"
        );
    }

    #[test]
    fn test_create_writes_bom_prefixed_file() {
        let app = tempfile::tempdir().unwrap();
        let mut b = builder(app.path());
        b.add_service("A").accept_port(1000).apply();
        let expected = format!("\u{FEFF}{}", b.config_content());

        let process = b.create().unwrap();
        assert_eq!(process.state(), ProcessState::NotStarted);
        assert_eq!(process.binary(), Path::new("/nonexistent/stunnel"));

        let path = process.config_path();
        assert_eq!(path.file_name().unwrap(), "stunnel.conf");
        assert!(path.starts_with(app.path().join("stunnel/tmp")));

        let bytes = fs::read(path).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_workspace_removed_after_failed_start() {
        let app = tempfile::tempdir().unwrap();
        let mut b = builder(app.path());
        b.add_service("A").accept_port(1000).apply();

        let mut process = b.create().unwrap();
        let workspace = process.config_path().parent().unwrap().to_path_buf();
        assert!(workspace.exists());

        assert!(matches!(process.start(), Err(StunnelError::Launch { .. })));
        assert!(!workspace.exists());
    }

    #[test]
    fn test_start_failure_closes_process() {
        let app = tempfile::tempdir().unwrap();
        let b = builder(app.path());
        let err = b.start().unwrap_err();
        assert!(matches!(err, StunnelError::Launch { .. }));

        let tmp = app.path().join("stunnel/tmp");
        let leftovers = fs::read_dir(&tmp).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_dropping_unstarted_process_removes_workspace() {
        let app = tempfile::tempdir().unwrap();
        let process = builder(app.path()).create().unwrap();
        let workspace = process.config_path().parent().unwrap().to_path_buf();
        assert!(workspace.exists());

        drop(process);
        assert!(!workspace.exists());
    }

    #[test]
    fn test_create_fails_when_workspace_unwritable() {
        let app = tempfile::tempdir().unwrap();
        fs::write(app.path().join("stunnel"), "not a directory").unwrap();
        let err = builder(app.path()).create().unwrap_err();
        assert!(matches!(err, StunnelError::ConfigWrite { .. }));
    }
}
