//! Error types for classification, custody, and notification operations.

use crate::domain::parcel::CustodyEvent;
use crate::domain::types::{ControlNumber, CustomerId, ParcelStatus, RuleId};
use thiserror::Error;

/// Failures reported by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced parcel does not exist.
    #[error("parcel {0} not found")]
    NotFound(ControlNumber),
    /// Referenced rule does not exist.
    #[error("rule {0} not found")]
    RuleNotFound(RuleId),
    /// The store refused the write.
    #[error("store rejected write: {0}")]
    Rejected(String),
    /// A custody guard failed against the stored state.
    #[error("cannot {event} parcel {control_number} (status={status}, archived={archived})")]
    InvalidTransition {
        control_number: ControlNumber,
        event: CustodyEvent,
        status: ParcelStatus,
        archived: bool,
    },
    /// Snapshot file could not be read or written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot file is not valid JSON for the store schema.
    #[error("snapshot error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Why a pasted row was dropped. Recovered locally by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowParseError {
    #[error("expected at least {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("recipient name is empty")]
    EmptyRecipient,
    #[error("order number {0:?} is not an integer")]
    BadOrderNumber(String),
}

/// Error type for all core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Pasted text was empty or whitespace only.
    #[error("input is empty")]
    EmptyInput,
    /// No pasted line survived row parsing.
    #[error("no valid rows in input")]
    NoValidRows,
    /// Rows still need a manually chosen type before parcels can be created.
    #[error("{count} rows awaiting manual classification")]
    UnclassifiedItemsPending { count: usize },
    /// Transition violates a custody guard.
    #[error("cannot {event} parcel {control_number} (status={status}, archived={archived})")]
    InvalidTransition {
        control_number: ControlNumber,
        event: CustodyEvent,
        status: ParcelStatus,
        archived: bool,
    },
    /// None of the parcels in a notification request has a usable phone.
    #[error("no reachable recipients")]
    NoReachableRecipients,
    /// Parcel is already linked to a customer.
    #[error("parcel {control_number} already linked to customer {customer_id}")]
    AlreadyLinked { control_number: ControlNumber, customer_id: CustomerId },
    /// Index passed to a session or fragment operation is out of range.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    /// Requested message template does not exist.
    #[error("unknown message template {0:?}")]
    UnknownTemplate(String),
    /// Configured link base could not form a valid URL.
    #[error("invalid outbound link: {0}")]
    InvalidLink(String),
    /// Underlying record store failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    /// Store-side guard failures surface as the same typed transition error
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidTransition { control_number, event, status, archived } => {
                Error::InvalidTransition { control_number, event, status, archived }
            }
            other => Error::Store(other),
        }
    }
}

impl From<Error> for StoreError {
    /// Guard failures keep their fields; anything else is a plain rejection
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidTransition { control_number, event, status, archived } => {
                StoreError::InvalidTransition { control_number, event, status, archived }
            }
            Error::Store(inner) => inner,
            other => StoreError::Rejected(other.to_string()),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
