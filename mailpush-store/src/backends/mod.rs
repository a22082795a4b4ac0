//! Backing store implementations for forwarding rules
//!
//! - `memory`: rules held in process, lost on restart
//! - `file`: rules persisted to a RON file

pub mod file;
pub mod memory;

pub use file::FileMappingStore;
pub use memory::MemoryMappingStore;
