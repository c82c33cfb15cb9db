//! A prepared statement.

use std::os::raw::c_int;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::ffi;
use crate::marshal::{self, Utf8CString};
use crate::provider::{Provider, StmtHandle};
use crate::value::{ColumnValue, Value};

/// Result of a single [`Statement::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

/// A prepared statement owning one native statement handle.
///
/// Created only via [`Connection::prepare`]; the borrow of its connection
/// keeps the open ordering honest (the engine fails when a connection is
/// closed under a live statement). Released by [`finalize`](Self::finalize)
/// or, as a safety net, on drop; after release every native call on the
/// statement fails fast instead of touching freed memory.
pub struct Statement<'conn> {
    stmt: StmtHandle,
    conn: &'conn Connection,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(conn: &'conn Connection, stmt: StmtHandle) -> Self {
        debug_assert!(!stmt.is_null());
        Self { stmt, conn }
    }

    /// The connection this statement was prepared on.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        self.conn
    }

    // ── Stepping ────────────────────────────────────────────────────────

    /// Advances execution one step. Callers drain a result set with
    /// `while stmt.step()? == StepResult::Row { .. }`.
    ///
    /// # Errors
    ///
    /// Any native status other than row/done converts to [`Error::Sqlite`]
    /// carrying that status and the connection's message.
    pub fn step(&mut self) -> Result<StepResult> {
        let stmt = self.handle()?;
        match self.provider().step(stmt) {
            ffi::SQLITE_ROW => Ok(StepResult::Row),
            ffi::SQLITE_DONE => Ok(StepResult::Done),
            rc => Err(self.conn.error_for(rc)),
        }
    }

    /// Resets the statement so it can be stepped again. Bindings survive a
    /// reset; see [`clear_bindings`](Self::clear_bindings).
    ///
    /// # Errors
    ///
    /// [`Error::Sqlite`] with the connection's message.
    pub fn reset(&mut self) -> Result<()> {
        let stmt = self.handle()?;
        self.check(self.provider().reset(stmt))
    }

    /// Removes every parameter binding (they become NULL).
    ///
    /// # Errors
    ///
    /// [`Error::Sqlite`] with the connection's message.
    pub fn clear_bindings(&mut self) -> Result<()> {
        let stmt = self.handle()?;
        self.check(self.provider().clear_bindings(stmt))
    }

    // ── Binding ─────────────────────────────────────────────────────────

    /// Binds `value` to the 1-based parameter `index`, dispatching on the
    /// runtime kind of the value.
    ///
    /// # Errors
    ///
    /// [`Error::Sqlite`] with the connection's message.
    pub fn bind(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let index = param_index(index)?;
        self.bind_ref(index, &value.into())
    }

    /// Binds `value` to the named parameter `name` (including its `:`/`@`/`?`
    /// prefix), resolving the 1-based index through the engine.
    ///
    /// # Errors
    ///
    /// [`Error::Sqlite`] when the statement has no such parameter, or as
    /// for [`bind`](Self::bind).
    pub fn bind_name(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let stmt = self.handle()?;
        let c_name = Utf8CString::new(name)?;
        let index = self.provider().bind_parameter_index(stmt, c_name.as_cstr());
        if index <= 0 {
            return Err(Error::sqlite(
                ffi::SQLITE_RANGE,
                format!("statement has no parameter named {name:?}"),
            ));
        }
        self.bind_ref(index, &value.into())
    }

    /// Binds a slice of values to parameters `1..=values.len()`.
    ///
    /// # Errors
    ///
    /// As for [`bind`](Self::bind).
    pub fn bind_all(&mut self, values: &[Value]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            self.bind_ref(param_index(i + 1)?, value)?;
        }
        Ok(())
    }

    fn bind_ref(&mut self, index: c_int, value: &Value) -> Result<()> {
        let stmt = self.handle()?;
        let provider = self.provider();
        let rc = match value {
            Value::Null => provider.bind_null(stmt, index),
            Value::Int(v) => provider.bind_int(stmt, index, *v),
            Value::Int64(v) => provider.bind_int64(stmt, index, *v),
            Value::Double(v) => provider.bind_double(stmt, index, *v),
            Value::Text(v) => {
                let text = Utf8CString::new(v)?;
                // The reported length drops the terminator; the buffer is
                // released as soon as the engine has copied it.
                provider.bind_text(stmt, index, text.as_cstr(), text.len_with_nul() - 1)
            }
            Value::Blob(v) => provider.bind_blob(stmt, index, v),
        };
        self.check(rc)
    }

    /// Number of parameters in this statement.
    ///
    /// # Errors
    ///
    /// Fails fast once the statement is finalized.
    pub fn parameter_count(&self) -> Result<usize> {
        let stmt = self.handle()?;
        Ok(usize::try_from(self.provider().bind_parameter_count(stmt)).unwrap_or(0))
    }

    /// Name of the 1-based parameter `index`, or `None` for positional
    /// parameters.
    ///
    /// # Errors
    ///
    /// Fails fast once the statement is finalized.
    pub fn parameter_name(&self, index: usize) -> Result<Option<String>> {
        let stmt = self.handle()?;
        let ptr = self.provider().bind_parameter_name(stmt, param_index(index)?);
        // SAFETY: the engine's name buffer is NUL-terminated and outlives
        // this call.
        Ok(unsafe { marshal::decode_utf8(ptr) })
    }

    // ── Column reading ──────────────────────────────────────────────────

    /// Number of columns this statement produces (stable across steps).
    ///
    /// # Errors
    ///
    /// Fails fast once the statement is finalized.
    pub fn column_count(&self) -> Result<usize> {
        let stmt = self.handle()?;
        Ok(usize::try_from(self.provider().column_count(stmt)).unwrap_or(0))
    }

    /// Number of columns with data in the current row: 0 before the first
    /// row, equal to [`column_count`](Self::column_count) while a row is
    /// current, and 0 again once stepping returns [`StepResult::Done`].
    ///
    /// # Errors
    ///
    /// Fails fast once the statement is finalized.
    pub fn data_count(&self) -> Result<usize> {
        let stmt = self.handle()?;
        Ok(usize::try_from(self.provider().data_count(stmt)).unwrap_or(0))
    }

    /// Reads column `index` (0-based) of the current row, classified by the
    /// engine's type tag at this moment (affinity is late-bound, so the
    /// same column may decode differently on another row).
    ///
    /// # Errors
    ///
    /// Fails fast once the statement is finalized or when `index` is out of
    /// range.
    pub fn column_value(&self, index: usize) -> Result<ColumnValue> {
        let (stmt, idx) = self.column(index)?;
        let provider = self.provider();
        Ok(match provider.column_type(stmt, idx) {
            ffi::SQLITE_INTEGER => ColumnValue::Integer(provider.column_int64(stmt, idx)),
            ffi::SQLITE_FLOAT => ColumnValue::Float(provider.column_double(stmt, idx)),
            ffi::SQLITE_TEXT => {
                // SAFETY: the engine's text pointer stays valid until the
                // next call on this statement.
                let text = unsafe { marshal::decode_utf8(provider.column_text(stmt, idx)) };
                ColumnValue::Text(text.unwrap_or_default())
            }
            ffi::SQLITE_BLOB => {
                let ptr = provider.column_blob(stmt, idx);
                let len = usize::try_from(provider.column_bytes(stmt, idx)).unwrap_or(0);
                // SAFETY: the engine reports the byte length of its own
                // buffer.
                ColumnValue::Blob(unsafe { marshal::copy_bytes(ptr, len) })
            }
            _ => ColumnValue::Null,
        })
    }

    /// Reads a column as `i64`, applying the engine's coercion rules.
    ///
    /// # Errors
    ///
    /// As for [`column_value`](Self::column_value).
    pub fn column_i64(&self, index: usize) -> Result<i64> {
        let (stmt, idx) = self.column(index)?;
        Ok(self.provider().column_int64(stmt, idx))
    }

    /// Reads a column as `f64`, applying the engine's coercion rules.
    ///
    /// # Errors
    ///
    /// As for [`column_value`](Self::column_value).
    pub fn column_f64(&self, index: usize) -> Result<f64> {
        let (stmt, idx) = self.column(index)?;
        Ok(self.provider().column_double(stmt, idx))
    }

    /// Reads a column as text. NULL reads as an empty string; use
    /// [`column_value`](Self::column_value) to distinguish.
    ///
    /// # Errors
    ///
    /// As for [`column_value`](Self::column_value).
    pub fn column_text(&self, index: usize) -> Result<String> {
        let (stmt, idx) = self.column(index)?;
        // SAFETY: as in `column_value`.
        Ok(unsafe { marshal::decode_utf8(self.provider().column_text(stmt, idx)) }
            .unwrap_or_default())
    }

    /// Reads a column as a byte sequence. NULL reads as empty; a stored
    /// zero-length blob also reads as empty (and non-null).
    ///
    /// # Errors
    ///
    /// As for [`column_value`](Self::column_value).
    pub fn column_blob(&self, index: usize) -> Result<Vec<u8>> {
        let (stmt, idx) = self.column(index)?;
        let provider = self.provider();
        let ptr = provider.column_blob(stmt, idx);
        let len = usize::try_from(provider.column_bytes(stmt, idx)).unwrap_or(0);
        // SAFETY: as in `column_value`.
        Ok(unsafe { marshal::copy_bytes(ptr, len) })
    }

    /// Whether column `index` of the current row is SQL NULL.
    ///
    /// # Errors
    ///
    /// As for [`column_value`](Self::column_value).
    pub fn is_column_null(&self, index: usize) -> Result<bool> {
        let (stmt, idx) = self.column(index)?;
        Ok(self.provider().column_type(stmt, idx) == ffi::SQLITE_NULL)
    }

    /// Name of column `index`, as assigned by the SQL text.
    ///
    /// # Errors
    ///
    /// As for [`column_value`](Self::column_value).
    pub fn column_name(&self, index: usize) -> Result<Option<String>> {
        let (stmt, idx) = self.column(index)?;
        // SAFETY: the engine's name buffer is NUL-terminated and outlives
        // this call.
        Ok(unsafe { marshal::decode_utf8(self.provider().column_name(stmt, idx)) })
    }

    /// Finds the 0-based index of the column named `name` (ASCII
    /// case-insensitive, matching the engine's own name rules).
    ///
    /// # Errors
    ///
    /// Fails fast once the statement is finalized.
    pub fn column_index(&self, name: &str) -> Result<Option<usize>> {
        for index in 0..self.column_count()? {
            if let Some(candidate) = self.column_name(index)? {
                if candidate.eq_ignore_ascii_case(name) {
                    return Ok(Some(index));
                }
            }
        }
        Ok(None)
    }

    // ── Release ─────────────────────────────────────────────────────────

    /// Releases the native statement handle. Idempotent and best-effort;
    /// afterwards every other method fails fast.
    pub fn finalize(&mut self) {
        if self.stmt.is_null() {
            return;
        }
        let _ = self.provider().finalize(self.stmt);
        self.stmt = StmtHandle::null();
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn provider(&self) -> &'static dyn Provider {
        self.conn.platform().provider()
    }

    fn handle(&self) -> Result<StmtHandle> {
        if self.stmt.is_null() {
            return Err(Error::sqlite(
                ffi::SQLITE_MISUSE,
                "statement is already finalized",
            ));
        }
        Ok(self.stmt)
    }

    /// Validates a 0-based column index against the compiled column count.
    fn column(&self, index: usize) -> Result<(StmtHandle, c_int)> {
        let stmt = self.handle()?;
        let count = self.provider().column_count(stmt);
        let idx = c_int::try_from(index).unwrap_or(c_int::MAX);
        if idx >= count {
            return Err(Error::sqlite(
                ffi::SQLITE_RANGE,
                format!("column index {index} out of range (statement has {count} columns)"),
            ));
        }
        Ok((stmt, idx))
    }

    fn check(&self, rc: c_int) -> Result<()> {
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.conn.error_for(rc))
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("live", &!self.stmt.is_null())
            .finish_non_exhaustive()
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        self.finalize();
    }
}

fn param_index(index: usize) -> Result<c_int> {
    c_int::try_from(index).map_err(|_| {
        Error::sqlite(
            ffi::SQLITE_RANGE,
            format!("parameter index {index} out of range"),
        )
    })
}
