/*!
 * System Limits and Constants
 *
 * Centralized location for the wait limits, result codes and error codes
 * exposed by the compatibility layer.
 *
 * ## Design Philosophy
 * - Values that callers compare against numerically are marked [WIN32-COMPAT]
 * - Performance-critical constants are marked with [PERF]
 */

use std::time::Duration;

// =============================================================================
// WAIT LIMITS
// =============================================================================

/// Maximum number of handles a single wait may name
/// [WIN32-COMPAT] MAXIMUM_WAIT_OBJECTS
pub const MAXIMUM_WAIT_OBJECTS: usize = 64;

/// Wait sets up to this size keep their working arrays inline
/// [PERF] Avoids a heap allocation for the common single/few-object case
pub const MAXIMUM_STACK_WAITOBJ_ARRAY_SIZE: usize = MAXIMUM_WAIT_OBJECTS / 4;

/// "No timeout" sentinel in milliseconds
/// [WIN32-COMPAT]
pub const INFINITE: u32 = 0xFFFF_FFFF;

// =============================================================================
// WAIT RESULT CODES
// =============================================================================

/// Base of the "object i satisfied the wait" range
/// [WIN32-COMPAT]
pub const WAIT_OBJECT_0: u32 = 0;

/// Base of the "object i satisfied the wait but was abandoned" range
/// [WIN32-COMPAT]
pub const WAIT_ABANDONED_0: u32 = 0x0000_0080;

/// The timeout elapsed before the wait was satisfied
/// [WIN32-COMPAT]
pub const WAIT_TIMEOUT: u32 = 258;

/// The wait failed; the calling thread's last error says why
/// [WIN32-COMPAT]
pub const WAIT_FAILED: u32 = 0xFFFF_FFFF;

// =============================================================================
// ERROR CODES
// =============================================================================

/// [WIN32-COMPAT]
pub const NO_ERROR: u32 = 0;

/// [WIN32-COMPAT]
pub const ERROR_INVALID_HANDLE: u32 = 6;

/// [WIN32-COMPAT]
pub const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;

/// [WIN32-COMPAT]
pub const ERROR_NOT_SUPPORTED: u32 = 50;

/// [WIN32-COMPAT]
pub const ERROR_INVALID_PARAMETER: u32 = 87;

/// [WIN32-COMPAT]
pub const ERROR_NOT_OWNER: u32 = 288;

/// [WIN32-COMPAT]
pub const ERROR_INTERNAL_ERROR: u32 = 1359;

/// Exit code reported for a thread or process that has not finished
/// [WIN32-COMPAT] STILL_ACTIVE
pub const STILL_ACTIVE: u32 = 259;

/// Exit code recorded when a thread body unwinds instead of returning
pub const ABNORMAL_THREAD_EXIT_CODE: u32 = 0xFFFF_FFFF;

// =============================================================================
// HANDLE TABLE
// =============================================================================

/// First handle value handed out by a fresh handle table
/// Zero is reserved for the null handle
pub const FIRST_HANDLE_VALUE: u32 = 4;

/// Distance between consecutive handle values
pub const HANDLE_VALUE_STEP: u32 = 4;

// =============================================================================
// BLOCKING
// =============================================================================

/// Default time a waiter spins before parking
/// [PERF] Long enough to catch a signal raised right after registration
pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_micros(10);

/// Default spin iterations before parking
pub const DEFAULT_MAX_SPINS: u32 = 100;

/// Tight-spin phase length of the adaptive backoff
pub const SPIN_TIGHT_ITERATIONS: u32 = 10;

/// Yield phase length of the adaptive backoff
pub const SPIN_YIELD_ITERATIONS: u32 = 50;

/// Cap on a single backoff sleep
pub const SPIN_MAX_BACKOFF: Duration = Duration::from_millis(1);
