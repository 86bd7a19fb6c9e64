/*!
 * API Module
 * Win32-style compatibility surface over the wait multiplexer
 */

pub mod config;
pub mod pal;

pub use config::PalConfig;
pub use pal::Pal;
