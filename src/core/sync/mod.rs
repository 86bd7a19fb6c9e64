/*!
 * Synchronization Primitives
 *
 * Low-level blocking building blocks used by the synchronization manager:
 * - Adaptive spinwait for waits that end within microseconds
 * - Condvar-backed one-shot parker for one blocked thread
 *
 * # Architecture
 *
 * Each compatibility-layer thread owns one `ThreadParker`. The manager arms
 * it while the thread's wait is registered with objects; whichever signaler
 * wins delivers the wakeup reason and object index through it.
 */

mod config;
mod parker;
mod spinwait;

pub use config::SyncConfig;
pub use parker::ThreadParker;
pub use spinwait::spin_until;
