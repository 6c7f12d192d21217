//! Buffer size constants for streaming operations.

/// Default output buffer size (256 KB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 256 * 1024;

/// Default input buffer size (256 KB).
/// Good balance for reading large alignment tables.
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;
