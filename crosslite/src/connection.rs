//! A SQLite database connection.

use std::sync::Mutex;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::ffi;
use crate::functions::{self, AggregateState, FunctionResult, Slot};
use crate::marshal::{self, Utf8CString};
use crate::platform::{self, Platform};
use crate::provider::DbHandle;
use crate::statement::Statement;
use crate::value::ColumnValue;
use crate::FunctionError;

/// The reserved connection target for a private in-memory database.
pub const MEMORY_DB: &str = ":memory:";

/// The reserved connection target for an unnamed on-disk database that the
/// engine deletes on close. (The empty string.)
pub const TEMPORARY_DB: &str = "";

/// A connection owning one native database handle.
///
/// Closed by [`close`](Self::close) or, as a safety net, on drop; both paths
/// release the native handle exactly once. Not `Sync` -- all access must
/// happen from a single thread at a time, matching the guarantee the native
/// engine itself provides.
pub struct Connection {
    db: DbHandle,
    platform: &'static Platform,
    /// Callback-registry keys to purge when this connection closes.
    functions: Mutex<Vec<usize>>,
}

// Safety: Connection is not Sync but is Send -- it can move to another thread
// as long as only one thread accesses it at a time.
unsafe impl Send for Connection {}

impl Connection {
    /// Opens (or creates) the database named by `path` on the process
    /// platform shim.
    ///
    /// `path` is translated through the shim's storage rules unless it is
    /// one of the reserved targets [`MEMORY_DB`] and [`TEMPORARY_DB`], which
    /// go to the engine untouched.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when no shim is compiled in,
    /// [`Error::InvalidPath`] when the storage layer rejects `path`, and
    /// [`Error::Sqlite`] when the engine refuses to open it.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with(platform::resolve()?, path)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// As for [`open`](Self::open).
    pub fn open_in_memory() -> Result<Self> {
        Self::open(MEMORY_DB)
    }

    /// Like [`open`](Self::open), but on an explicitly supplied platform
    /// bundle instead of the process-wide one.
    ///
    /// # Errors
    ///
    /// As for [`open`](Self::open), minus [`Error::Configuration`].
    pub fn open_with(platform: &'static Platform, path: &str) -> Result<Self> {
        let target = if path == MEMORY_DB || path == TEMPORARY_DB {
            path.to_string()
        } else {
            platform
                .storage()
                .local_file_path(path)?
                .to_string_lossy()
                .into_owned()
        };

        let c_path = Utf8CString::new(&target)?;
        let (rc, db) = platform.provider().open(c_path.as_cstr());
        if rc != ffi::SQLITE_OK {
            // A failed open may still produce a handle carrying the error
            // message; it must be closed here, nothing else ever sees it.
            if !db.is_null() {
                let message = unsafe { marshal::decode_utf8(platform.provider().errmsg(db)) }
                    .unwrap_or_else(|| "unknown error".to_string());
                let _ = platform.provider().close(db);
                return Err(Error::sqlite(
                    rc,
                    format!("unable to open database file {path:?}: {message}"),
                ));
            }
            return Err(Error::sqlite(
                rc,
                format!("unable to open database file {path:?}"),
            ));
        }

        debug!(path, "opened database");
        Ok(Self {
            db,
            platform,
            functions: Mutex::new(Vec::new()),
        })
    }

    /// Compiles `sql` into a prepared statement backed by this connection.
    ///
    /// # Errors
    ///
    /// [`Error::Sqlite`] with the engine's message and the offending SQL
    /// when compilation fails; the connection itself stays usable.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let db = self.handle()?;
        let c_sql = Utf8CString::new(sql)?;
        let (rc, stmt) = self
            .platform
            .provider()
            .prepare(db, c_sql.as_cstr(), c_sql.len_with_nul());
        if rc != ffi::SQLITE_OK || stmt.is_null() {
            let message = self
                .error_message()
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(Error::sqlite(
                rc,
                format!("unable to prepare sql statement {sql:?}: {message}"),
            ));
        }
        trace!(sql, "prepared statement");
        Ok(Statement::new(self, stmt))
    }

    /// The engine's most recent error message for this connection, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        if self.db.is_null() {
            return None;
        }
        // SAFETY: errmsg returns a NUL-terminated buffer owned by the
        // engine, valid until the next call on this connection.
        unsafe { marshal::decode_utf8(self.platform.provider().errmsg(self.db)) }
    }

    /// Registers a scalar SQL function of the given arity (`-1` accepts any
    /// number of arguments).
    ///
    /// `function` runs synchronously on whatever thread is stepping a query
    /// that calls it, and stays registered until this connection closes.
    /// Flag `deterministic` only for functions whose result depends on
    /// nothing but their arguments; the engine uses it to cache calls.
    ///
    /// # Errors
    ///
    /// [`Error::Sqlite`] when the engine rejects the registration.
    pub fn create_scalar_function<F>(
        &self,
        name: &str,
        n_args: i32,
        deterministic: bool,
        function: F,
    ) -> Result<()>
    where
        F: Fn(&[ColumnValue]) -> FunctionResult + Send + Sync + 'static,
    {
        let db = self.handle()?;
        let c_name = Utf8CString::new(name)?;
        let key = functions::register(Slot::scalar(self.platform, function));
        let rc = self.platform.provider().create_function(
            db,
            c_name.as_cstr(),
            n_args,
            function_flags(deterministic),
            functions::key_to_user_data(key),
            Some(functions::scalar_trampoline),
            None,
            None,
        );
        self.track_registration(key, rc)?;
        debug!(name, n_args, "registered scalar function");
        Ok(())
    }

    /// Registers an aggregate SQL function from a step/final closure pair.
    ///
    /// `step` sees one row's arguments per grouped row and accumulates into
    /// the group's [`AggregateState`]; `final_` consumes that state exactly
    /// once per group (an empty state when the group produced no rows).
    ///
    /// # Errors
    ///
    /// [`Error::Sqlite`] when the engine rejects the registration.
    pub fn create_aggregate<S, F>(
        &self,
        name: &str,
        n_args: i32,
        deterministic: bool,
        step: S,
        final_: F,
    ) -> Result<()>
    where
        S: Fn(&mut AggregateState, &[ColumnValue]) -> std::result::Result<(), FunctionError>
            + Send
            + Sync
            + 'static,
        F: Fn(AggregateState) -> FunctionResult + Send + Sync + 'static,
    {
        let db = self.handle()?;
        let c_name = Utf8CString::new(name)?;
        let key = functions::register(Slot::aggregate(self.platform, step, final_));
        let rc = self.platform.provider().create_function(
            db,
            c_name.as_cstr(),
            n_args,
            function_flags(deterministic),
            functions::key_to_user_data(key),
            None,
            Some(functions::aggregate_step_trampoline),
            Some(functions::aggregate_final_trampoline),
        );
        self.track_registration(key, rc)?;
        debug!(name, n_args, "registered aggregate");
        Ok(())
    }

    /// Closes the connection. Idempotent and best-effort: the native return
    /// code is ignored, and a second call (or the drop safety net after an
    /// explicit close) is a no-op.
    pub fn close(&mut self) {
        if self.db.is_null() {
            return;
        }
        let keys = std::mem::take(
            &mut *self
                .functions
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        functions::unregister_all(&keys);
        let _ = self.platform.provider().close(self.db);
        self.db = DbHandle::null();
        debug!("closed database");
    }

    pub(crate) fn handle(&self) -> Result<DbHandle> {
        if self.db.is_null() {
            return Err(Error::sqlite(
                ffi::SQLITE_MISUSE,
                "connection is already closed",
            ));
        }
        Ok(self.db)
    }

    pub(crate) fn platform(&self) -> &'static Platform {
        self.platform
    }

    /// Builds the error for a non-OK status, attaching the connection's
    /// current message when one is available.
    pub(crate) fn error_for(&self, code: i32) -> Error {
        let message = self
            .error_message()
            .unwrap_or_else(|| "unknown error".to_string());
        Error::sqlite(code, message)
    }

    fn track_registration(&self, key: usize, rc: i32) -> Result<()> {
        if rc != ffi::SQLITE_OK {
            functions::unregister(key);
            return Err(self.error_for(rc));
        }
        self.functions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(key);
        Ok(())
    }
}

const fn function_flags(deterministic: bool) -> i32 {
    if deterministic {
        ffi::SQLITE_UTF8 | ffi::SQLITE_DETERMINISTIC
    } else {
        ffi::SQLITE_UTF8
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &!self.db.is_null())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
