//! Anchor storage.
//!
//! The engine never touches storage directly; the session loads a copy of
//! the anchor, restores against it, and leaves persistence to an
//! `AnchorStore`. Expiry is a read-time check owned by the store.

pub mod json_file;
pub mod memory;
pub mod traits;

pub use json_file::JsonFileAnchorStore;
pub use memory::MemoryAnchorStore;
pub use traits::AnchorStore;
