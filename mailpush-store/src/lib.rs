pub mod backends;
pub mod error;
pub mod field;
pub mod rules;
pub mod r#trait;

pub use backends::{FileMappingStore, MemoryMappingStore};
pub use error::{Result, StoreError};
pub use field::RuleField;
pub use rules::RuleSet;
pub use r#trait::MappingStore;
