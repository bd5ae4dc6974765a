//! Domain models - core business types and the custody state machine
//!
//! This module contains the canonical data types used throughout the system:
//! - `Parcel` - the primary business entity, an item in custody
//! - `ClassificationRule` - tracking-code prefix to object type mapping
//! - `CustodyEvent` / `ParcelView` - state machine events and derived views
//! - `Error` - typed failures surfaced to callers

pub mod error;
pub mod parcel;
pub mod types;

// Re-export commonly used types at module level
pub use error::{Error, Result, RowParseError, StoreError};
pub use parcel::{CustodyEvent, ParcelView, Transition};
