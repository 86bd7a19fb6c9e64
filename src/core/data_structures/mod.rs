/*!
 * Data Structures
 * Allocation-aware containers used on the wait hot path
 */

pub mod wait_array;

pub use wait_array::{FixedBuffer, WaitArray};
