//! Process-wide monitor registry: the single in-memory map from
//! monitor id to its loaded module, with ready/pending load signaling
//! between the loader and its readers.

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::Registry;
