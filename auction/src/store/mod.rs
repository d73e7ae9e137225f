//! Store implementations that do not need a running Veilid node.

pub mod memory;

pub use memory::MemoryStore;
