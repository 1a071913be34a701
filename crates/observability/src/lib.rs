//! Process-wide logging setup for rolegate binaries.

/// Initialize process-wide tracing with the format chosen by `ROLEGATE_LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;
