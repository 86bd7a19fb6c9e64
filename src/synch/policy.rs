/*!
 * Wait Policy
 * Which object kinds a wait may name, and whether multi-object waits run
 */

use crate::objects::{AllowedObjectTypes, WAIT_OBJECT_TYPES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub allowed: AllowedObjectTypes,
    /// When false, any request naming more than one handle is NotSupported
    pub multi_object: bool,
}

impl WaitPolicy {
    /// Process and thread handles only, one at a time
    pub const fn restricted() -> Self {
        Self {
            allowed: WAIT_OBJECT_TYPES,
            multi_object: false,
        }
    }

    /// Every object kind, wait-any and wait-all enabled
    pub const fn full() -> Self {
        Self {
            allowed: AllowedObjectTypes::all(),
            multi_object: true,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::restricted()
    }
}
