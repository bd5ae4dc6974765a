//! Services - business logic
//!
//! This module contains the core engines:
//! - `classifier` - Tracking-code classification and manual reconciliation
//! - `custody` - Status transitions, bulk operations, derived views
//! - `contact` - Recipient phone resolution
//! - `composer` - Template composition, substitution, and deep links
//! - `notifier` - Store-backed single and batch notifications

pub mod classifier;
pub mod composer;
pub mod contact;
pub mod custody;
pub mod notifier;

// Re-export commonly used types
pub use classifier::{ClassificationSession, ClassificationSettings, Classifier, ImportOutcome};
pub use composer::{Artifact, CompositionContext, OutboundMessage};
pub use custody::CustodyService;
pub use notifier::Notifier;
