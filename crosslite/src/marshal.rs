//! UTF-8 marshaling across the native boundary.
//!
//! Every string that crosses into the engine goes out as a NUL-terminated
//! UTF-8 buffer and every string that crosses back is scanned to its
//! terminating NUL (the native layer supplies no explicit length for text).
//! Encoded buffers are owned values, so release happens on every exit path,
//! including `?` unwinding.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};

use crate::error::{Error, Result};
use crate::ffi;

/// An owned, NUL-terminated UTF-8 buffer handed to native calls.
///
/// Dropping the value releases the buffer; callers that need the encoded
/// data to survive a native call keep the `Utf8CString` alive across it and
/// let the engine copy (`SQLITE_TRANSIENT`).
pub(crate) struct Utf8CString {
    inner: CString,
}

impl Utf8CString {
    /// Encodes `text`, appending the terminator.
    ///
    /// An interior NUL byte cannot be represented in the native format and
    /// is rejected up front.
    pub(crate) fn new(text: &str) -> Result<Self> {
        let inner = CString::new(text).map_err(|_| {
            Error::sqlite(
                ffi::SQLITE_MISUSE,
                format!("string {text:?} contains an interior nul byte"),
            )
        })?;
        Ok(Self { inner })
    }

    /// The encoded buffer.
    pub(crate) fn as_cstr(&self) -> &CStr {
        &self.inner
    }

    /// Byte count of the encoded buffer, terminator included.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(crate) fn len_with_nul(&self) -> c_int {
        self.inner.as_bytes_with_nul().len() as c_int
    }
}

/// Decodes a native NUL-terminated UTF-8 buffer. Null decodes to `None`.
///
/// Malformed UTF-8 has no native recovery path and is replaced lossily.
///
/// # Safety
///
/// `ptr`, when non-null, must point to a NUL-terminated buffer that stays
/// valid for the duration of the call.
pub(crate) unsafe fn decode_utf8(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Copies `len` bytes out of native memory into a fresh managed buffer.
///
/// A null or empty range yields an empty (non-null) `Vec`, never a failure.
///
/// # Safety
///
/// `ptr`, when non-null, must point to at least `len` readable bytes.
pub(crate) unsafe fn copy_bytes(ptr: *const c_void, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr.cast::<u8>(), len).to_vec()
}
