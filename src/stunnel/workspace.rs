//! Private temporary directories for stunnel config files.
//!
//! Every build gets its own directory under `<app_dir>/stunnel/tmp/<uuid>`.
//! The directory is created on first use, holds the primary config file and
//! secondary files such as PSK secrets, and is removed as soon as stunnel has
//! read them.
//!
//! # Stale content
//!
//! A process that was killed mid-start never removes its workspace. The first
//! workspace allocation in a process therefore wipes the whole `stunnel/tmp`
//! tree once. The check and the wipe run under one lock, and every
//! allocation passes that lock before creating its own directory, so a
//! directory created by this process can never be wiped.
//!
//! # Known risk
//!
//! stunnel may re-read secondary files on reconfiguration. Those files are gone
//! once the workspace is removed after startup.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::StunnelError;

/// Subdirectory of the application directory that holds all workspaces.
pub const WORKSPACE_SUBDIR: &str = "stunnel/tmp";

/// File name of the primary config file inside a workspace.
pub const CONFIG_FILE_NAME: &str = "stunnel.conf";

/// One-time purge of stale workspaces.
///
/// Starts closed (`false`) and flips to `true` exactly once, on the first
/// [`PurgeGate::pass`]. The flag and the purge share one mutex.
#[derive(Debug)]
pub struct PurgeGate {
    purged: Mutex<bool>,
}

/// Gate shared by every workspace in the process.
static HOUSEKEEPING: PurgeGate = PurgeGate::new();

impl PurgeGate {
    /// Create a gate that has not purged yet.
    pub const fn new() -> Self {
        Self {
            purged: Mutex::new(false),
        }
    }

    /// Purge `base_dir` if this is the first call on this gate.
    ///
    /// Returns `true` for the one call that performed the purge. Concurrent
    /// callers block until the purge has finished.
    pub fn pass(&self, base_dir: &Path) -> bool {
        let mut purged = match self.purged.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *purged {
            return false;
        }
        *purged = true;

        if base_dir.exists() {
            info!("Purging stale stunnel workspaces in {:?}", base_dir);
            remove_best_effort(base_dir);
        }
        true
    }

    /// Whether the purge has already happened.
    pub fn has_purged(&self) -> bool {
        match self.purged.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Default for PurgeGate {
    fn default() -> Self {
        Self::new()
    }
}

/// A private temporary directory owned by one build.
///
/// The directory is removed on [`Workspace::remove`] or when the workspace is
/// dropped.
#[derive(Debug)]
pub struct Workspace {
    base_dir: PathBuf,
    dir: Option<PathBuf>,
    gate: &'static PurgeGate,
}

impl Workspace {
    /// Workspace under `<app_dir>/stunnel/tmp`, using the process-wide gate.
    pub fn new(app_dir: &Path) -> Self {
        Self::with_gate(app_dir, &HOUSEKEEPING)
    }

    /// Workspace using a specific purge gate (for testing).
    pub fn with_gate(app_dir: &Path, gate: &'static PurgeGate) -> Self {
        Self {
            base_dir: app_dir.join(WORKSPACE_SUBDIR),
            dir: None,
            gate,
        }
    }

    /// Directory holding every workspace of the application.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The workspace directory, if it has been created.
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Get the workspace directory, creating it on first use.
    ///
    /// The base directory is made absolute on first use, so every path handed
    /// to stunnel is absolute no matter where stunnel runs.
    pub fn dir(&mut self) -> Result<&Path, StunnelError> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => {
                self.base_dir = std::path::absolute(&self.base_dir)
                    .map_err(|e| StunnelError::write(&self.base_dir, e))?;
                self.gate.pass(&self.base_dir);

                fs::create_dir_all(&self.base_dir)
                    .map_err(|e| StunnelError::write(&self.base_dir, e))?;

                let temp_dir = tempfile::Builder::new()
                    .prefix(&Uuid::new_v4().to_string())
                    .rand_bytes(0)
                    .tempdir_in(&self.base_dir)
                    .map_err(|e| StunnelError::write(&self.base_dir, e))?;

                // Restrictive permissions on the directory (0700)
                fs::set_permissions(temp_dir.path(), fs::Permissions::from_mode(0o700))
                    .map_err(|e| StunnelError::write(temp_dir.path(), e))?;

                // Removed by `remove` or on drop
                let dir = temp_dir.keep();
                debug!("Created stunnel workspace {:?}", dir);
                dir
            }
        };

        Ok(self.dir.insert(dir).as_path())
    }

    /// Path of the primary config file.
    pub fn config_file(&mut self) -> Result<PathBuf, StunnelError> {
        Ok(self.dir()?.join(CONFIG_FILE_NAME))
    }

    /// Path of a new, uniquely named secondary file.
    pub fn secondary_file(&mut self) -> Result<PathBuf, StunnelError> {
        Ok(self.dir()?.join(Uuid::new_v4().to_string()))
    }

    /// Remove the workspace directory and everything in it (best-effort).
    pub fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            debug!("Removing stunnel workspace {:?}", dir);
            remove_best_effort(&dir);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Write `content` to `path` with 0600 permissions.
///
/// A partially written file is removed before the error is returned.
pub(crate) fn write_private_file(path: &Path, content: &[u8]) -> Result<(), StunnelError> {
    let result = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.flush()
        });

    result.map_err(|e| {
        remove_best_effort(path);
        StunnelError::write(path, e)
    })
}

/// Delete a file or a directory tree, logging instead of failing.
pub(crate) fn remove_best_effort(path: &Path) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    if let Err(e) = result
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_directory_created_lazily() {
        static GATE: PurgeGate = PurgeGate::new();
        let app = tempfile::tempdir().unwrap();
        let mut ws = Workspace::with_gate(app.path(), &GATE);

        assert!(ws.path().is_none());
        assert!(!ws.base_dir().exists());

        let dir = ws.dir().unwrap().to_path_buf();
        assert!(dir.is_dir());
        assert!(dir.starts_with(app.path().join("stunnel/tmp")));
        assert_eq!(ws.path(), Some(dir.as_path()));

        // Second call reuses the directory.
        assert_eq!(ws.dir().unwrap(), dir.as_path());
    }

    #[test]
    fn test_directory_permissions() {
        static GATE: PurgeGate = PurgeGate::new();
        let app = tempfile::tempdir().unwrap();
        let mut ws = Workspace::with_gate(app.path(), &GATE);
        let dir = ws.dir().unwrap().to_path_buf();

        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_file_naming() {
        static GATE: PurgeGate = PurgeGate::new();
        let app = tempfile::tempdir().unwrap();
        let mut ws = Workspace::with_gate(app.path(), &GATE);

        let config = ws.config_file().unwrap();
        assert_eq!(config.file_name().unwrap(), CONFIG_FILE_NAME);

        let a = ws.secondary_file().unwrap();
        let b = ws.secondary_file().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.parent(), config.parent());
    }

    #[test]
    fn test_remove_and_drop() {
        static GATE: PurgeGate = PurgeGate::new();
        let app = tempfile::tempdir().unwrap();

        let mut ws = Workspace::with_gate(app.path(), &GATE);
        let dir = ws.dir().unwrap().to_path_buf();
        fs::write(dir.join("x"), "data").unwrap();
        ws.remove();
        assert!(!dir.exists());
        // Removing twice is harmless.
        ws.remove();

        let dropped_dir;
        {
            let mut ws = Workspace::with_gate(app.path(), &GATE);
            dropped_dir = ws.dir().unwrap().to_path_buf();
        }
        assert!(!dropped_dir.exists());
    }

    #[test]
    fn test_first_allocation_purges_stale_content() {
        static GATE: PurgeGate = PurgeGate::new();
        let app = tempfile::tempdir().unwrap();
        let stale = app.path().join("stunnel/tmp/stale-run");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join(CONFIG_FILE_NAME), "old").unwrap();

        let mut first = Workspace::with_gate(app.path(), &GATE);
        let first_dir = first.dir().unwrap().to_path_buf();
        assert!(!stale.exists());
        assert!(GATE.has_purged());

        // Later allocations must not purge again.
        let mut second = Workspace::with_gate(app.path(), &GATE);
        let second_dir = second.dir().unwrap().to_path_buf();
        assert!(first_dir.exists());
        assert!(second_dir.exists());
    }

    #[test]
    fn test_concurrent_first_allocations_purge_once() {
        static GATE: PurgeGate = PurgeGate::new();
        let app = tempfile::tempdir().unwrap();
        let stale = app.path().join("stunnel/tmp/stale-run");
        fs::create_dir_all(&stale).unwrap();
        assert!(!GATE.has_purged());

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let app_dir = app.path().to_path_buf();
                thread::spawn(move || {
                    let mut ws = Workspace::with_gate(&app_dir, &GATE);
                    barrier.wait();
                    let dir = ws.dir().unwrap().to_path_buf();
                    // Keep the directory alive past the drop.
                    ws.dir = None;
                    dir
                })
            })
            .collect();

        let dirs: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(GATE.has_purged());
        assert!(!stale.exists());
        for dir in &dirs {
            assert!(dir.exists(), "workspace {:?} was purged", dir);
        }

        // Only the stale directory was wiped; every allocation survived.
        let survivors = fs::read_dir(app.path().join(WORKSPACE_SUBDIR))
            .unwrap()
            .count();
        assert_eq!(survivors, threads);

        // The gate is spent: a later allocation leaves existing directories alone.
        let mut late = Workspace::with_gate(app.path(), &GATE);
        late.dir().unwrap();
        assert!(dirs.iter().all(|dir| dir.exists()));
    }

    #[test]
    fn test_relative_app_dir_made_absolute() {
        static GATE: PurgeGate = PurgeGate::new();
        let relative = PathBuf::from(format!("target/workspace-relative-{}", Uuid::new_v4()));

        let (dir, config) = {
            let mut ws = Workspace::with_gate(&relative, &GATE);
            let config = ws.config_file().unwrap();
            (ws.path().unwrap().to_path_buf(), config)
        };
        fs::remove_dir_all(&relative).ok();

        assert!(dir.is_absolute());
        assert!(config.is_absolute());
        assert!(dir.starts_with(std::env::current_dir().unwrap().join(&relative)));
    }

    #[test]
    fn test_write_private_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets");
        write_private_file(&path, b"id:key").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "id:key");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_private_file_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/secrets");
        let err = write_private_file(&path, b"id:key").unwrap_err();
        assert!(matches!(err, StunnelError::ConfigWrite { .. }));
        assert!(!path.exists());
    }
}
