/*!
 * PAL Synchronization Library
 *
 * Win32-style thread synchronization on top of native threads: a
 * multi-object wait multiplexer, the synchronization manager behind it,
 * waitable objects and a handle table.
 */

pub mod api;
pub mod core;
pub mod monitoring;
pub mod objects;
pub mod synch;

// Re-exports
pub use api::{Pal, PalConfig};
pub use crate::core::errors::{PalError, PalResult};
pub use crate::core::limits::{
    INFINITE, MAXIMUM_WAIT_OBJECTS, WAIT_ABANDONED_0, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
pub use crate::core::sync::SyncConfig;
pub use crate::core::types::{Handle, ThreadId, Timeout};
pub use monitoring::init_tracing;
pub use objects::{HandleTable, ObjectRegistry, ObjectType, PalObject, PalThread};
pub use synch::{
    SynchManager, SynchronizationManager, WaitController, WaitMultiplexer, WaitOutcome,
    WaitPolicy, WaitRequest,
};
