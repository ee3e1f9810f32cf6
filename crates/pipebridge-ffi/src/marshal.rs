//! String marshalling across the C boundary.
//!
//! Commands are borrowed for the duration of a call only. Every read hands the
//! caller one freshly allocated NUL-terminated string, even when empty; the
//! caller returns it through `pipebridge_string_free`.

use std::ffi::{CStr, CString, c_char};

use pipebridge::ReadOutcome;

/// Borrow the bytes of a caller-owned C string, `None` for null.
///
/// # Safety
///
/// `ptr` is null or points to a NUL-terminated string that stays valid and
/// unmodified for `'a`.
pub unsafe fn command_bytes<'a>(ptr: *const c_char) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return None;
    }
    // Safety: non-null and NUL-terminated per the contract above.
    Some(unsafe { CStr::from_ptr(ptr) }.to_bytes())
}

/// Allocate the caller's copy of a read result.
///
/// A line containing NUL is cut at the first NUL, which is where a C reader
/// would stop anyway.
pub fn outcome_to_c(outcome: ReadOutcome) -> *mut c_char {
    let mut bytes = match outcome {
        ReadOutcome::Line(bytes) => bytes,
        ReadOutcome::NotStarted | ReadOutcome::Closed => Vec::new(),
    };
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        tracing::debug!(line_len = bytes.len(), nul, "Truncating engine line at NUL");
        bytes.truncate(nul);
    }
    CString::new(bytes).unwrap_or_default().into_raw()
}

/// Release a string produced by [`outcome_to_c`].
///
/// # Safety
///
/// `ptr` is null or came from [`outcome_to_c`] and has not been freed.
pub unsafe fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // Safety: allocated by CString::into_raw in outcome_to_c.
        drop(unsafe { CString::from_raw(ptr) });
    }
}
