/*!
 * Objects Module
 * Synchronizable objects, compatibility-layer threads, and the handle table
 */

pub mod object;
pub mod registry;
pub mod thread;

pub use object::{
    Acquired, AllowedObjectTypes, ObjectType, PalObject, SynchState, WAIT_OBJECT_TYPES,
};
pub use registry::{HandleTable, ObjectRegistry};
pub use thread::PalThread;
