//! Raw FFI bindings to SQLite, resolved at compile time via `cfg`.
//!
//! On native targets the symbols come from the `sqlite3` library linked by
//! `build.rs` (the one the deployment target already ships). On `wasm32`
//! targets they come from `sqlite-wasm-rs`, which ships its own
//! WASM-compiled engine.
//!
//! All pointer types use `*mut c_void` so that backend-specific handle types
//! (`sqlite3`, `sqlite3_stmt`, `sqlite3_value`, `sqlite3_context`) do not
//! leak into the rest of the code. Nothing outside the provider, marshal and
//! function-trampoline modules touches these symbols.

#![allow(non_camel_case_types, dead_code)]

use std::os::raw::{c_char, c_int, c_void};

use crate::provider::{RawFinal, RawFunction};

// ── SQLite status codes ─────────────────────────────────────────────────

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_ERROR: c_int = 1;
pub const SQLITE_BUSY: c_int = 5;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_RANGE: c_int = 25;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

// Column / value type tags
pub const SQLITE_INTEGER: c_int = 1;
pub const SQLITE_FLOAT: c_int = 2;
pub const SQLITE_TEXT: c_int = 3;
pub const SQLITE_BLOB: c_int = 4;
pub const SQLITE_NULL: c_int = 5;

// Open flags
pub const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;
pub const SQLITE_OPEN_FULLMUTEX: c_int = 0x0001_0000;

// Text encoding / function flags for sqlite3_create_function
pub const SQLITE_UTF8: c_int = 1;
pub const SQLITE_DETERMINISTIC: c_int = 0x800;

// Destructor type aliases (transient = -1 means SQLite copies the data)
pub const SQLITE_TRANSIENT: isize = -1;

// ── Native backend ──────────────────────────────────────────────────────

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use super::*;

    type sqlite3 = c_void;
    type sqlite3_stmt = c_void;
    type sqlite3_value = c_void;
    type sqlite3_context = c_void;

    extern "C" {
        // Connection lifecycle
        pub fn sqlite3_open_v2(
            filename: *const c_char,
            pp_db: *mut *mut sqlite3,
            flags: c_int,
            z_vfs: *const c_char,
        ) -> c_int;

        pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;

        // Prepared statements
        pub fn sqlite3_prepare_v2(
            db: *mut sqlite3,
            z_sql: *const c_char,
            n_byte: c_int,
            pp_stmt: *mut *mut sqlite3_stmt,
            pz_tail: *mut *const c_char,
        ) -> c_int;

        pub fn sqlite3_step(stmt: *mut sqlite3_stmt) -> c_int;
        pub fn sqlite3_reset(stmt: *mut sqlite3_stmt) -> c_int;
        pub fn sqlite3_clear_bindings(stmt: *mut sqlite3_stmt) -> c_int;
        pub fn sqlite3_finalize(stmt: *mut sqlite3_stmt) -> c_int;

        // Parameter binding
        pub fn sqlite3_bind_int(stmt: *mut sqlite3_stmt, index: c_int, value: c_int) -> c_int;

        pub fn sqlite3_bind_int64(stmt: *mut sqlite3_stmt, index: c_int, value: i64) -> c_int;

        pub fn sqlite3_bind_double(stmt: *mut sqlite3_stmt, index: c_int, value: f64) -> c_int;

        pub fn sqlite3_bind_text(
            stmt: *mut sqlite3_stmt,
            index: c_int,
            value: *const c_char,
            n: c_int,
            destructor: isize,
        ) -> c_int;

        pub fn sqlite3_bind_blob(
            stmt: *mut sqlite3_stmt,
            index: c_int,
            value: *const c_void,
            n: c_int,
            destructor: isize,
        ) -> c_int;

        pub fn sqlite3_bind_null(stmt: *mut sqlite3_stmt, index: c_int) -> c_int;

        pub fn sqlite3_bind_parameter_count(stmt: *mut sqlite3_stmt) -> c_int;

        pub fn sqlite3_bind_parameter_name(
            stmt: *mut sqlite3_stmt,
            index: c_int,
        ) -> *const c_char;

        pub fn sqlite3_bind_parameter_index(
            stmt: *mut sqlite3_stmt,
            name: *const c_char,
        ) -> c_int;

        // Column reading
        pub fn sqlite3_column_count(stmt: *mut sqlite3_stmt) -> c_int;
        pub fn sqlite3_data_count(stmt: *mut sqlite3_stmt) -> c_int;

        pub fn sqlite3_column_type(stmt: *mut sqlite3_stmt, i_col: c_int) -> c_int;
        pub fn sqlite3_column_int64(stmt: *mut sqlite3_stmt, i_col: c_int) -> i64;
        pub fn sqlite3_column_double(stmt: *mut sqlite3_stmt, i_col: c_int) -> f64;
        pub fn sqlite3_column_text(stmt: *mut sqlite3_stmt, i_col: c_int) -> *const c_char;
        pub fn sqlite3_column_blob(stmt: *mut sqlite3_stmt, i_col: c_int) -> *const c_void;
        pub fn sqlite3_column_bytes(stmt: *mut sqlite3_stmt, i_col: c_int) -> c_int;
        pub fn sqlite3_column_name(stmt: *mut sqlite3_stmt, i_col: c_int) -> *const c_char;

        // Custom functions and aggregates
        pub fn sqlite3_create_function(
            db: *mut sqlite3,
            function_name: *const c_char,
            n_arg: c_int,
            e_text_rep: c_int,
            p_app: *mut c_void,
            x_func: Option<RawFunction>,
            x_step: Option<RawFunction>,
            x_final: Option<RawFinal>,
        ) -> c_int;

        pub fn sqlite3_user_data(context: *mut sqlite3_context) -> *mut c_void;

        pub fn sqlite3_aggregate_context(
            context: *mut sqlite3_context,
            n_bytes: c_int,
        ) -> *mut c_void;

        pub fn sqlite3_value_type(value: *mut sqlite3_value) -> c_int;
        pub fn sqlite3_value_int64(value: *mut sqlite3_value) -> i64;
        pub fn sqlite3_value_double(value: *mut sqlite3_value) -> f64;
        pub fn sqlite3_value_text(value: *mut sqlite3_value) -> *const c_char;
        pub fn sqlite3_value_blob(value: *mut sqlite3_value) -> *const c_void;
        pub fn sqlite3_value_bytes(value: *mut sqlite3_value) -> c_int;

        pub fn sqlite3_result_int(context: *mut sqlite3_context, value: c_int);
        pub fn sqlite3_result_int64(context: *mut sqlite3_context, value: i64);
        pub fn sqlite3_result_double(context: *mut sqlite3_context, value: f64);
        pub fn sqlite3_result_text(
            context: *mut sqlite3_context,
            value: *const c_char,
            n: c_int,
            destructor: isize,
        );
        pub fn sqlite3_result_blob(
            context: *mut sqlite3_context,
            value: *const c_void,
            n: c_int,
            destructor: isize,
        );
        pub fn sqlite3_result_null(context: *mut sqlite3_context);
        pub fn sqlite3_result_error(
            context: *mut sqlite3_context,
            message: *const c_char,
            n: c_int,
        );

        // Error reporting
        pub fn sqlite3_errmsg(db: *mut sqlite3) -> *const c_char;
    }
}

// ── WASM backend ────────────────────────────────────────────────────────

#[cfg(target_arch = "wasm32")]
mod imp {
    //! Thin wrappers around `sqlite_wasm_rs` that normalise pointer types
    //! to `*mut c_void` so callers are backend-agnostic.

    use super::*;

    use sqlite_wasm_rs as wasm;

    // ── Connection lifecycle ────────────────────────────────────────────

    pub unsafe fn sqlite3_open_v2(
        filename: *const c_char,
        pp_db: *mut *mut c_void,
        flags: c_int,
        z_vfs: *const c_char,
    ) -> c_int {
        let pp = pp_db.cast::<*mut wasm::sqlite3>();
        wasm::sqlite3_open_v2(filename.cast(), pp, flags, z_vfs.cast())
    }

    pub unsafe fn sqlite3_close_v2(db: *mut c_void) -> c_int {
        wasm::sqlite3_close_v2(db.cast())
    }

    // ── Prepared statements ─────────────────────────────────────────────

    pub unsafe fn sqlite3_prepare_v2(
        db: *mut c_void,
        z_sql: *const c_char,
        n_byte: c_int,
        pp_stmt: *mut *mut c_void,
        pz_tail: *mut *const c_char,
    ) -> c_int {
        let pp = pp_stmt.cast::<*mut wasm::sqlite3_stmt>();
        wasm::sqlite3_prepare_v2(db.cast(), z_sql.cast(), n_byte, pp, pz_tail.cast())
    }

    pub unsafe fn sqlite3_step(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_step(stmt.cast())
    }

    pub unsafe fn sqlite3_reset(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_reset(stmt.cast())
    }

    pub unsafe fn sqlite3_clear_bindings(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_clear_bindings(stmt.cast())
    }

    pub unsafe fn sqlite3_finalize(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_finalize(stmt.cast())
    }

    // ── Parameter binding ───────────────────────────────────────────────

    pub unsafe fn sqlite3_bind_int(stmt: *mut c_void, index: c_int, value: c_int) -> c_int {
        wasm::sqlite3_bind_int(stmt.cast(), index, value)
    }

    pub unsafe fn sqlite3_bind_int64(stmt: *mut c_void, index: c_int, value: i64) -> c_int {
        wasm::sqlite3_bind_int64(stmt.cast(), index, value)
    }

    pub unsafe fn sqlite3_bind_double(stmt: *mut c_void, index: c_int, value: f64) -> c_int {
        wasm::sqlite3_bind_double(stmt.cast(), index, value)
    }

    pub unsafe fn sqlite3_bind_text(
        stmt: *mut c_void,
        index: c_int,
        value: *const c_char,
        n: c_int,
        destructor: isize,
    ) -> c_int {
        wasm::sqlite3_bind_text(stmt.cast(), index, value.cast(), n, destructor)
    }

    pub unsafe fn sqlite3_bind_blob(
        stmt: *mut c_void,
        index: c_int,
        value: *const c_void,
        n: c_int,
        destructor: isize,
    ) -> c_int {
        wasm::sqlite3_bind_blob(stmt.cast(), index, value, n, destructor)
    }

    pub unsafe fn sqlite3_bind_null(stmt: *mut c_void, index: c_int) -> c_int {
        wasm::sqlite3_bind_null(stmt.cast(), index)
    }

    pub unsafe fn sqlite3_bind_parameter_count(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_bind_parameter_count(stmt.cast())
    }

    pub unsafe fn sqlite3_bind_parameter_name(stmt: *mut c_void, index: c_int) -> *const c_char {
        wasm::sqlite3_bind_parameter_name(stmt.cast(), index).cast()
    }

    pub unsafe fn sqlite3_bind_parameter_index(
        stmt: *mut c_void,
        name: *const c_char,
    ) -> c_int {
        wasm::sqlite3_bind_parameter_index(stmt.cast(), name.cast())
    }

    // ── Column reading ──────────────────────────────────────────────────

    pub unsafe fn sqlite3_column_count(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_column_count(stmt.cast())
    }

    pub unsafe fn sqlite3_data_count(stmt: *mut c_void) -> c_int {
        wasm::sqlite3_data_count(stmt.cast())
    }

    pub unsafe fn sqlite3_column_type(stmt: *mut c_void, i_col: c_int) -> c_int {
        wasm::sqlite3_column_type(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_int64(stmt: *mut c_void, i_col: c_int) -> i64 {
        wasm::sqlite3_column_int64(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_double(stmt: *mut c_void, i_col: c_int) -> f64 {
        wasm::sqlite3_column_double(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_text(stmt: *mut c_void, i_col: c_int) -> *const c_char {
        wasm::sqlite3_column_text(stmt.cast(), i_col).cast()
    }

    pub unsafe fn sqlite3_column_blob(stmt: *mut c_void, i_col: c_int) -> *const c_void {
        wasm::sqlite3_column_blob(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_bytes(stmt: *mut c_void, i_col: c_int) -> c_int {
        wasm::sqlite3_column_bytes(stmt.cast(), i_col)
    }

    pub unsafe fn sqlite3_column_name(stmt: *mut c_void, i_col: c_int) -> *const c_char {
        wasm::sqlite3_column_name(stmt.cast(), i_col).cast()
    }

    // ── Custom functions and aggregates ─────────────────────────────────

    pub unsafe fn sqlite3_create_function(
        db: *mut c_void,
        function_name: *const c_char,
        n_arg: c_int,
        e_text_rep: c_int,
        p_app: *mut c_void,
        x_func: Option<RawFunction>,
        x_step: Option<RawFunction>,
        x_final: Option<RawFinal>,
    ) -> c_int {
        // sqlite-wasm-rs expects its own opaque callback types; cast through.
        wasm::sqlite3_create_function(
            db.cast(),
            function_name.cast(),
            n_arg,
            e_text_rep,
            p_app,
            std::mem::transmute(x_func),
            std::mem::transmute(x_step),
            std::mem::transmute(x_final),
        )
    }

    pub unsafe fn sqlite3_user_data(context: *mut c_void) -> *mut c_void {
        wasm::sqlite3_user_data(context.cast())
    }

    pub unsafe fn sqlite3_aggregate_context(context: *mut c_void, n_bytes: c_int) -> *mut c_void {
        wasm::sqlite3_aggregate_context(context.cast(), n_bytes)
    }

    pub unsafe fn sqlite3_value_type(value: *mut c_void) -> c_int {
        wasm::sqlite3_value_type(value.cast())
    }

    pub unsafe fn sqlite3_value_int64(value: *mut c_void) -> i64 {
        wasm::sqlite3_value_int64(value.cast())
    }

    pub unsafe fn sqlite3_value_double(value: *mut c_void) -> f64 {
        wasm::sqlite3_value_double(value.cast())
    }

    pub unsafe fn sqlite3_value_text(value: *mut c_void) -> *const c_char {
        wasm::sqlite3_value_text(value.cast()).cast()
    }

    pub unsafe fn sqlite3_value_blob(value: *mut c_void) -> *const c_void {
        wasm::sqlite3_value_blob(value.cast())
    }

    pub unsafe fn sqlite3_value_bytes(value: *mut c_void) -> c_int {
        wasm::sqlite3_value_bytes(value.cast())
    }

    pub unsafe fn sqlite3_result_int(context: *mut c_void, value: c_int) {
        wasm::sqlite3_result_int(context.cast(), value);
    }

    pub unsafe fn sqlite3_result_int64(context: *mut c_void, value: i64) {
        wasm::sqlite3_result_int64(context.cast(), value);
    }

    pub unsafe fn sqlite3_result_double(context: *mut c_void, value: f64) {
        wasm::sqlite3_result_double(context.cast(), value);
    }

    pub unsafe fn sqlite3_result_text(
        context: *mut c_void,
        value: *const c_char,
        n: c_int,
        destructor: isize,
    ) {
        wasm::sqlite3_result_text(context.cast(), value.cast(), n, destructor);
    }

    pub unsafe fn sqlite3_result_blob(
        context: *mut c_void,
        value: *const c_void,
        n: c_int,
        destructor: isize,
    ) {
        wasm::sqlite3_result_blob(context.cast(), value, n, destructor);
    }

    pub unsafe fn sqlite3_result_null(context: *mut c_void) {
        wasm::sqlite3_result_null(context.cast());
    }

    pub unsafe fn sqlite3_result_error(context: *mut c_void, message: *const c_char, n: c_int) {
        wasm::sqlite3_result_error(context.cast(), message.cast(), n);
    }

    // ── Error reporting ─────────────────────────────────────────────────

    pub unsafe fn sqlite3_errmsg(db: *mut c_void) -> *const c_char {
        wasm::sqlite3_errmsg(db.cast()).cast()
    }
}

// ── Public re-exports ───────────────────────────────────────────────────

pub(crate) use imp::*;
