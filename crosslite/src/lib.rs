//! One safe connection/statement API over the native `SQLite` C library.
//!
//! Each deployment target supplies a *platform shim*: the actual native
//! entry points plus the OS file-path rules. This crate presents the
//! same [`Connection`]/[`Statement`] surface on top of whichever shim the
//! build carries. The raw symbols are resolved at compile time:
//!
//! * **Native** (`not(wasm32)`): linked against the `sqlite3` library the
//!   target ships, wired up by `build.rs`.
//! * **WASM** (`wasm32`): delegated to `sqlite-wasm-rs`, which ships its own
//!   WASM-compiled engine.
//!
//! Consumer code uses only the safe types defined here. `unsafe` is
//! confined to the interop seam: the `ffi` declarations, the built-in
//! [`Provider`] implementation, the `marshal` buffer helpers, and the
//! `extern "C"` adapters that route custom SQL functions back into Rust
//! closures.
//!
//! ```no_run
//! use crosslite::{params, Connection, StepResult};
//!
//! # fn main() -> crosslite::Result<()> {
//! let conn = Connection::open_in_memory()?;
//! conn.prepare("CREATE TABLE t (x INTEGER, y TEXT)")?.step()?;
//!
//! let mut insert = conn.prepare("INSERT INTO t (x, y) VALUES (?1, ?2)")?;
//! insert.bind_all(params![7_i64, "seven"])?;
//! insert.step()?;
//!
//! let mut select = conn.prepare("SELECT y FROM t ORDER BY x")?;
//! while select.step()? == StepResult::Row {
//!     println!("{}", select.column_text(0)?);
//! }
//! # Ok(())
//! # }
//! ```

mod ffi;

mod connection;
mod error;
mod functions;
mod marshal;
pub mod platform;
pub mod provider;
mod statement;
mod value;

pub use connection::{Connection, MEMORY_DB, TEMPORARY_DB};
pub use error::{Error, FunctionError, Result};
pub use functions::{AggregateState, FunctionResult};
pub use statement::{Statement, StepResult};
pub use value::{ColumnValue, Value};

#[cfg(test)]
mod tests;
