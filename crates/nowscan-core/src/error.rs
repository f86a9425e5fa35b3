//! Shared helpers for error reporting

use core::fmt::{Debug, Write};

/// Capacity of the free-form detail text carried by driver errors
pub const DETAILS_LEN: usize = 64;

/// Human readable description of a lower level error
pub type ErrorDetails = heapless::String<DETAILS_LEN>;

/// Render a driver error's `Debug` output, truncated to [`DETAILS_LEN`].
pub fn details<E: Debug>(error: &E) -> ErrorDetails {
    let mut text = ErrorDetails::new();
    // Truncated once the buffer is full
    let _ = write!(text, "{error:?}");
    text
}
