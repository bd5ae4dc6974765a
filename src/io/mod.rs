//! IO modules - external system interfaces
//!
//! This module contains the boundaries to external collaborators:
//! - `store` - Record store interface consumed by the engines
//! - `memory_store` - In-process store with JSON snapshot persistence
//! - `artifact` - Batch notification artifact output (HTML/JSON)

pub mod artifact;
pub mod memory_store;
pub mod store;

// Re-export commonly used types
pub use artifact::ArtifactWriter;
pub use memory_store::MemoryStore;
pub use store::RecordStore;
