/*!
 * Synchronization
 *
 * The wait multiplexer and the manager it drives.
 *
 * # Architecture
 *
 * `WaitMultiplexer` is generic over an `ObjectRegistry` and a `SynchManager`,
 * so the algorithm can run against the real handle table and manager or
 * against test doubles. The real manager hands out `SynchWaitController`s that
 * each hold its reentrant synchronization lock.
 */

mod controller;
mod manager;
mod multiplexer;
mod policy;
mod traits;

pub use controller::SynchWaitController;
pub use manager::SynchronizationManager;
pub use multiplexer::{WaitMultiplexer, WaitOutcome, WaitRequest};
pub use policy::WaitPolicy;
pub use traits::{ControllerStatus, SynchManager, WaitController, WaitType, WakeupReason};
