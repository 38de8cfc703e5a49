//! Configuration management for dumon
//!
//! - **profile**: the persisted document (`Configuration`) and its named
//!   layout profiles
//! - **store**: `ProfileStore`, which reads and atomically writes the document

pub mod profile;
pub mod store;

pub use profile::{Configuration, Profile, SCHEMA_VERSION};
pub use store::ProfileStore;
