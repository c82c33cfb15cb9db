//! The native function table.
//!
//! [`Provider`] declares the SQLite entry points the core needs, over opaque
//! handles. The core never inspects how a provider is implemented; it calls
//! through the table and interprets status codes. [`NativeProvider`] is the
//! built-in implementation whose backend is resolved at compile time in the
//! `ffi` module (system library on native targets, `sqlite-wasm-rs` on
//! `wasm32`).
//!
//! Handles originate exclusively from [`Provider::open`] and
//! [`Provider::prepare`] (or, on the callback path, from the engine itself);
//! the connection and statement wrappers guarantee they are never used after
//! release, which is what lets these signatures stay safe.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};

use crate::ffi;

/// Native calling convention of a scalar-function or aggregate-step
/// callback: `(context, argument count, argument vector)`.
pub type RawFunction = unsafe extern "C" fn(*mut c_void, c_int, *mut *mut c_void);

/// Native calling convention of an aggregate-final callback.
pub type RawFinal = unsafe extern "C" fn(*mut c_void);

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub(crate) *mut c_void);

        impl $name {
            /// The released / not-open sentinel.
            #[must_use]
            pub const fn null() -> Self {
                Self(std::ptr::null_mut())
            }

            /// Wraps a raw pointer produced by a platform shim.
            #[must_use]
            pub const fn from_raw(ptr: *mut c_void) -> Self {
                Self(ptr)
            }

            /// Whether this handle holds the sentinel.
            #[must_use]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }
    };
}

handle!(
    /// An opaque native database handle (`sqlite3*`).
    DbHandle
);
handle!(
    /// An opaque native prepared-statement handle (`sqlite3_stmt*`).
    StmtHandle
);
handle!(
    /// An opaque native SQL value handle (`sqlite3_value*`), only seen
    /// inside custom-function invocations.
    ValueHandle
);
handle!(
    /// An opaque native function-invocation context (`sqlite3_context*`).
    ContextHandle
);

/// The set of native operations a platform shim must supply.
///
/// Purely a function table: every method forwards to one native entry point
/// and reports the raw status code or value. Pointer-valued results (error
/// messages, column text, blobs) are decoded by the caller through the
/// crate's marshal helpers.
pub trait Provider: Send + Sync {
    /// Opens a database, returning the status code and the handle (which may
    /// be non-null even on failure; the caller must close it).
    fn open(&self, filename: &CStr) -> (c_int, DbHandle);

    /// Closes a database handle. Best-effort; the return code is advisory.
    fn close(&self, db: DbHandle) -> c_int;

    /// Compiles one SQL statement. `n_bytes` is the encoded length,
    /// terminator included.
    fn prepare(&self, db: DbHandle, sql: &CStr, n_bytes: c_int) -> (c_int, StmtHandle);

    /// The last error message for `db`, as a native UTF-8 buffer.
    fn errmsg(&self, db: DbHandle) -> *const c_char;

    /// Binds a 32-bit integer to the 1-based parameter `index`.
    fn bind_int(&self, stmt: StmtHandle, index: c_int, value: i32) -> c_int;
    /// Binds a 64-bit integer.
    fn bind_int64(&self, stmt: StmtHandle, index: c_int, value: i64) -> c_int;
    /// Binds a 64-bit float.
    fn bind_double(&self, stmt: StmtHandle, index: c_int, value: f64) -> c_int;
    /// Binds UTF-8 text. `n_bytes` excludes the terminator; the engine
    /// copies the buffer before returning.
    fn bind_text(&self, stmt: StmtHandle, index: c_int, text: &CStr, n_bytes: c_int) -> c_int;
    /// Binds a byte sequence by copy.
    fn bind_blob(&self, stmt: StmtHandle, index: c_int, data: &[u8]) -> c_int;
    /// Binds SQL NULL.
    fn bind_null(&self, stmt: StmtHandle, index: c_int) -> c_int;

    /// Number of parameters in the statement.
    fn bind_parameter_count(&self, stmt: StmtHandle) -> c_int;
    /// Name of the 1-based parameter `index`, or null.
    fn bind_parameter_name(&self, stmt: StmtHandle, index: c_int) -> *const c_char;
    /// 1-based index of the named parameter, or 0 when unknown.
    fn bind_parameter_index(&self, stmt: StmtHandle, name: &CStr) -> c_int;

    /// Advances the statement one step.
    fn step(&self, stmt: StmtHandle) -> c_int;
    /// Resets the statement for re-execution.
    fn reset(&self, stmt: StmtHandle) -> c_int;
    /// Clears all parameter bindings.
    fn clear_bindings(&self, stmt: StmtHandle) -> c_int;
    /// Releases the statement handle. Best-effort, like [`Self::close`].
    fn finalize(&self, stmt: StmtHandle) -> c_int;

    /// Column count of the compiled statement (stable across steps).
    fn column_count(&self, stmt: StmtHandle) -> c_int;
    /// Count of columns with data in the current row; 0 outside a row.
    fn data_count(&self, stmt: StmtHandle) -> c_int;
    /// The type tag of column `index` in the current row.
    fn column_type(&self, stmt: StmtHandle, index: c_int) -> c_int;
    /// Column read as a 64-bit integer.
    fn column_int64(&self, stmt: StmtHandle, index: c_int) -> i64;
    /// Column read as a 64-bit float.
    fn column_double(&self, stmt: StmtHandle, index: c_int) -> f64;
    /// Column read as a native UTF-8 buffer.
    fn column_text(&self, stmt: StmtHandle, index: c_int) -> *const c_char;
    /// Column read as a native byte range (pair with [`Self::column_bytes`]).
    fn column_blob(&self, stmt: StmtHandle, index: c_int) -> *const c_void;
    /// Byte length of the blob/text in column `index`.
    fn column_bytes(&self, stmt: StmtHandle, index: c_int) -> c_int;
    /// Name of column `index`, as assigned by the SQL.
    fn column_name(&self, stmt: StmtHandle, index: c_int) -> *const c_char;

    /// Registers a custom function or aggregate. `user_data` is handed back
    /// verbatim through [`Self::user_data`] on every invocation.
    #[allow(clippy::too_many_arguments)]
    fn create_function(
        &self,
        db: DbHandle,
        name: &CStr,
        n_args: c_int,
        flags: c_int,
        user_data: *mut c_void,
        func: Option<RawFunction>,
        step: Option<RawFunction>,
        final_: Option<RawFinal>,
    ) -> c_int;

    /// The user-data pointer registered with the invoked function.
    fn user_data(&self, context: ContextHandle) -> *mut c_void;
    /// Per-group scratch memory, zeroed on first call per group.
    fn aggregate_context(&self, context: ContextHandle, n_bytes: c_int) -> *mut c_void;

    /// The type tag of a function argument value.
    fn value_type(&self, value: ValueHandle) -> c_int;
    /// Argument read as a 64-bit integer.
    fn value_int64(&self, value: ValueHandle) -> i64;
    /// Argument read as a 64-bit float.
    fn value_double(&self, value: ValueHandle) -> f64;
    /// Argument read as a native UTF-8 buffer.
    fn value_text(&self, value: ValueHandle) -> *const c_char;
    /// Argument read as a native byte range (pair with [`Self::value_bytes`]).
    fn value_blob(&self, value: ValueHandle) -> *const c_void;
    /// Byte length of a blob/text argument.
    fn value_bytes(&self, value: ValueHandle) -> c_int;

    /// Sets a 32-bit integer function result.
    fn result_int(&self, context: ContextHandle, value: i32);
    /// Sets a 64-bit integer function result.
    fn result_int64(&self, context: ContextHandle, value: i64);
    /// Sets a 64-bit float function result.
    fn result_double(&self, context: ContextHandle, value: f64);
    /// Sets a text function result (copied by the engine).
    fn result_text(&self, context: ContextHandle, text: &str);
    /// Sets a blob function result (copied by the engine).
    fn result_blob(&self, context: ContextHandle, data: &[u8]);
    /// Sets a NULL function result.
    fn result_null(&self, context: ContextHandle);
    /// Makes the invocation fail with `message`.
    fn result_error(&self, context: ContextHandle, message: &str);
}

/// The built-in provider for this build's target, backed by the symbols
/// resolved in the `ffi` module.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProvider;

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
impl Provider for NativeProvider {
    fn open(&self, filename: &CStr) -> (c_int, DbHandle) {
        let flags =
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE | ffi::SQLITE_OPEN_FULLMUTEX;
        let mut db: *mut c_void = std::ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_open_v2(filename.as_ptr(), &mut db, flags, std::ptr::null())
        };
        (rc, DbHandle(db))
    }

    fn close(&self, db: DbHandle) -> c_int {
        unsafe { ffi::sqlite3_close_v2(db.0) }
    }

    fn prepare(&self, db: DbHandle, sql: &CStr, n_bytes: c_int) -> (c_int, StmtHandle) {
        let mut stmt: *mut c_void = std::ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db.0, sql.as_ptr(), n_bytes, &mut stmt, std::ptr::null_mut())
        };
        (rc, StmtHandle(stmt))
    }

    fn errmsg(&self, db: DbHandle) -> *const c_char {
        unsafe { ffi::sqlite3_errmsg(db.0) }
    }

    fn bind_int(&self, stmt: StmtHandle, index: c_int, value: i32) -> c_int {
        unsafe { ffi::sqlite3_bind_int(stmt.0, index, value) }
    }

    fn bind_int64(&self, stmt: StmtHandle, index: c_int, value: i64) -> c_int {
        unsafe { ffi::sqlite3_bind_int64(stmt.0, index, value) }
    }

    fn bind_double(&self, stmt: StmtHandle, index: c_int, value: f64) -> c_int {
        unsafe { ffi::sqlite3_bind_double(stmt.0, index, value) }
    }

    fn bind_text(&self, stmt: StmtHandle, index: c_int, text: &CStr, n_bytes: c_int) -> c_int {
        unsafe {
            ffi::sqlite3_bind_text(stmt.0, index, text.as_ptr(), n_bytes, ffi::SQLITE_TRANSIENT)
        }
    }

    fn bind_blob(&self, stmt: StmtHandle, index: c_int, data: &[u8]) -> c_int {
        // The engine stores NULL when handed a null pointer; a zero-length
        // blob must keep a valid non-null pointer to stay a blob.
        static EMPTY: [u8; 1] = [0];
        let ptr = if data.is_empty() {
            EMPTY.as_ptr()
        } else {
            data.as_ptr()
        };
        unsafe {
            ffi::sqlite3_bind_blob(
                stmt.0,
                index,
                ptr.cast(),
                data.len() as c_int,
                ffi::SQLITE_TRANSIENT,
            )
        }
    }

    fn bind_null(&self, stmt: StmtHandle, index: c_int) -> c_int {
        unsafe { ffi::sqlite3_bind_null(stmt.0, index) }
    }

    fn bind_parameter_count(&self, stmt: StmtHandle) -> c_int {
        unsafe { ffi::sqlite3_bind_parameter_count(stmt.0) }
    }

    fn bind_parameter_name(&self, stmt: StmtHandle, index: c_int) -> *const c_char {
        unsafe { ffi::sqlite3_bind_parameter_name(stmt.0, index) }
    }

    fn bind_parameter_index(&self, stmt: StmtHandle, name: &CStr) -> c_int {
        unsafe { ffi::sqlite3_bind_parameter_index(stmt.0, name.as_ptr()) }
    }

    fn step(&self, stmt: StmtHandle) -> c_int {
        unsafe { ffi::sqlite3_step(stmt.0) }
    }

    fn reset(&self, stmt: StmtHandle) -> c_int {
        unsafe { ffi::sqlite3_reset(stmt.0) }
    }

    fn clear_bindings(&self, stmt: StmtHandle) -> c_int {
        unsafe { ffi::sqlite3_clear_bindings(stmt.0) }
    }

    fn finalize(&self, stmt: StmtHandle) -> c_int {
        unsafe { ffi::sqlite3_finalize(stmt.0) }
    }

    fn column_count(&self, stmt: StmtHandle) -> c_int {
        unsafe { ffi::sqlite3_column_count(stmt.0) }
    }

    fn data_count(&self, stmt: StmtHandle) -> c_int {
        unsafe { ffi::sqlite3_data_count(stmt.0) }
    }

    fn column_type(&self, stmt: StmtHandle, index: c_int) -> c_int {
        unsafe { ffi::sqlite3_column_type(stmt.0, index) }
    }

    fn column_int64(&self, stmt: StmtHandle, index: c_int) -> i64 {
        unsafe { ffi::sqlite3_column_int64(stmt.0, index) }
    }

    fn column_double(&self, stmt: StmtHandle, index: c_int) -> f64 {
        unsafe { ffi::sqlite3_column_double(stmt.0, index) }
    }

    fn column_text(&self, stmt: StmtHandle, index: c_int) -> *const c_char {
        unsafe { ffi::sqlite3_column_text(stmt.0, index) }
    }

    fn column_blob(&self, stmt: StmtHandle, index: c_int) -> *const c_void {
        unsafe { ffi::sqlite3_column_blob(stmt.0, index) }
    }

    fn column_bytes(&self, stmt: StmtHandle, index: c_int) -> c_int {
        unsafe { ffi::sqlite3_column_bytes(stmt.0, index) }
    }

    fn column_name(&self, stmt: StmtHandle, index: c_int) -> *const c_char {
        unsafe { ffi::sqlite3_column_name(stmt.0, index) }
    }

    fn create_function(
        &self,
        db: DbHandle,
        name: &CStr,
        n_args: c_int,
        flags: c_int,
        user_data: *mut c_void,
        func: Option<RawFunction>,
        step: Option<RawFunction>,
        final_: Option<RawFinal>,
    ) -> c_int {
        unsafe {
            ffi::sqlite3_create_function(
                db.0,
                name.as_ptr(),
                n_args,
                flags,
                user_data,
                func,
                step,
                final_,
            )
        }
    }

    fn user_data(&self, context: ContextHandle) -> *mut c_void {
        unsafe { ffi::sqlite3_user_data(context.0) }
    }

    fn aggregate_context(&self, context: ContextHandle, n_bytes: c_int) -> *mut c_void {
        unsafe { ffi::sqlite3_aggregate_context(context.0, n_bytes) }
    }

    fn value_type(&self, value: ValueHandle) -> c_int {
        unsafe { ffi::sqlite3_value_type(value.0) }
    }

    fn value_int64(&self, value: ValueHandle) -> i64 {
        unsafe { ffi::sqlite3_value_int64(value.0) }
    }

    fn value_double(&self, value: ValueHandle) -> f64 {
        unsafe { ffi::sqlite3_value_double(value.0) }
    }

    fn value_text(&self, value: ValueHandle) -> *const c_char {
        unsafe { ffi::sqlite3_value_text(value.0) }
    }

    fn value_blob(&self, value: ValueHandle) -> *const c_void {
        unsafe { ffi::sqlite3_value_blob(value.0) }
    }

    fn value_bytes(&self, value: ValueHandle) -> c_int {
        unsafe { ffi::sqlite3_value_bytes(value.0) }
    }

    fn result_int(&self, context: ContextHandle, value: i32) {
        unsafe { ffi::sqlite3_result_int(context.0, value) };
    }

    fn result_int64(&self, context: ContextHandle, value: i64) {
        unsafe { ffi::sqlite3_result_int64(context.0, value) };
    }

    fn result_double(&self, context: ContextHandle, value: f64) {
        unsafe { ffi::sqlite3_result_double(context.0, value) };
    }

    fn result_text(&self, context: ContextHandle, text: &str) {
        unsafe {
            ffi::sqlite3_result_text(
                context.0,
                text.as_ptr().cast(),
                text.len() as c_int,
                ffi::SQLITE_TRANSIENT,
            );
        }
    }

    fn result_blob(&self, context: ContextHandle, data: &[u8]) {
        unsafe {
            ffi::sqlite3_result_blob(
                context.0,
                data.as_ptr().cast(),
                data.len() as c_int,
                ffi::SQLITE_TRANSIENT,
            );
        }
    }

    fn result_null(&self, context: ContextHandle) {
        unsafe { ffi::sqlite3_result_null(context.0) };
    }

    fn result_error(&self, context: ContextHandle, message: &str) {
        unsafe {
            ffi::sqlite3_result_error(context.0, message.as_ptr().cast(), message.len() as c_int);
        }
    }
}
