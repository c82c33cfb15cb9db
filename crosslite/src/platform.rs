//! Platform shim resolution.
//!
//! A [`Platform`] bundles the two collaborators a connection needs: the
//! native function table ([`Provider`]) and the OS file-path rules
//! ([`Storage`]). [`resolve`] hands out the shim compiled into this build;
//! the bundle can also be constructed explicitly and injected through
//! [`Connection::open_with`](crate::Connection::open_with), which is how
//! test suites substitute a fake platform.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::provider::{NativeProvider, Provider};

/// OS-level file-path rules for database files.
///
/// Consulted exactly once per [`Connection::open`](crate::Connection::open),
/// before the path is encoded; the reserved in-memory and temporary-database
/// targets never reach it.
pub trait Storage: Send + Sync {
    /// Resolves `name` to the local file path the engine should open.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPath`] when `name` cannot be represented as a file
    /// path on this platform.
    fn local_file_path(&self, name: &str) -> Result<PathBuf>;

    /// The platform's directory for transient files.
    fn temp_directory(&self) -> PathBuf;
}

/// The built-in storage rules for this build's target.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeStorage;

impl Storage for NativeStorage {
    fn local_file_path(&self, name: &str) -> Result<PathBuf> {
        if name.bytes().any(|b| b == 0) {
            return Err(Error::InvalidPath {
                path: name.to_string(),
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            std::path::absolute(name).map_err(|_| Error::InvalidPath {
                path: name.to_string(),
            })
        }

        // WASM file names are VFS keys, not OS paths.
        #[cfg(target_arch = "wasm32")]
        {
            Ok(PathBuf::from(name))
        }
    }

    fn temp_directory(&self) -> PathBuf {
        #[cfg(not(target_arch = "wasm32"))]
        {
            std::env::temp_dir()
        }

        #[cfg(target_arch = "wasm32")]
        {
            PathBuf::from("/tmp")
        }
    }
}

/// One platform shim: the provider/storage bundle a connection runs on.
#[derive(Clone, Copy)]
pub struct Platform {
    provider: &'static dyn Provider,
    storage: &'static dyn Storage,
}

impl Platform {
    /// Bundles a provider and storage implementation.
    #[must_use]
    pub const fn new(provider: &'static dyn Provider, storage: &'static dyn Storage) -> Self {
        Self { provider, storage }
    }

    /// The native function table.
    #[must_use]
    pub fn provider(&self) -> &'static dyn Provider {
        self.provider
    }

    /// The file-path rules.
    #[must_use]
    pub fn storage(&self) -> &'static dyn Storage {
        self.storage
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

#[cfg(any(test, feature = "test-platform"))]
static OVERRIDE: std::sync::Mutex<Option<&'static Platform>> = std::sync::Mutex::new(None);

/// Installs (or, with `None`, removes) a process-wide platform override.
///
/// Test-build-only escape hatch; production resolution always lands on the
/// shim compiled into the build.
#[cfg(any(test, feature = "test-platform"))]
pub fn set_platform(platform: Option<&'static Platform>) {
    *OVERRIDE
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner) = platform;
}

/// Returns the platform shim for this process.
///
/// Idempotent: every call yields the same bundle for the process lifetime
/// (unless a test override is installed).
///
/// # Errors
///
/// [`Error::Configuration`] when no shim is compiled in for the current
/// target. A deployment error, not a runtime condition to recover from.
pub fn resolve() -> Result<&'static Platform> {
    #[cfg(any(test, feature = "test-platform"))]
    {
        if let Some(platform) = *OVERRIDE
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
        {
            return Ok(platform);
        }
    }

    builtin().ok_or(Error::Configuration)
}

#[cfg(any(unix, windows, target_arch = "wasm32"))]
fn builtin() -> Option<&'static Platform> {
    static PROVIDER: NativeProvider = NativeProvider;
    static STORAGE: NativeStorage = NativeStorage;
    static BUILTIN: Platform = Platform::new(&PROVIDER, &STORAGE);
    Some(&BUILTIN)
}

#[cfg(not(any(unix, windows, target_arch = "wasm32")))]
fn builtin() -> Option<&'static Platform> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_rejects_unrepresentable_path() {
        let err = NativeStorage
            .local_file_path("bad\0name.db")
            .expect_err("nul byte must be rejected");
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn storage_resolves_relative_names() {
        let path = NativeStorage
            .local_file_path("some.db")
            .expect("resolve path");
        assert!(path.is_absolute());
    }
}
