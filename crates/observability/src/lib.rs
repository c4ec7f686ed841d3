//! Tracing and logging setup shared by the binaries and black-box tests.

pub use crate::tracing::LogFormat;

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_with(format: LogFormat) {
    crate::tracing::init(format);
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
