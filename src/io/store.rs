//! Record store interface consumed by the core engines
//!
//! Persistence, querying, and transport belong to the store. The core only
//! sees these operations and treats every failure as a `StoreError`; it
//! never retries.

use crate::domain::parcel::CustodyEvent;
use crate::domain::types::{
    ClassificationRule, ClassifiedRow, ControlNumber, Customer, CustomerId, MessageTemplate, Parcel,
    RuleId,
};
use crate::domain::StoreError;
use async_trait::async_trait;
use chrono::NaiveDate;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All classification rules, in store order
    async fn lookup_rules_by_prefix(&self) -> StoreResult<Vec<ClassificationRule>>;

    /// Upsert a rule keyed by prefix (last write wins)
    async fn persist_rule(&self, rule: &ClassificationRule) -> StoreResult<RuleId>;

    /// Remove a rule; used to compensate a failed confirmation
    async fn delete_rule(&self, id: &RuleId) -> StoreResult<()>;

    /// Create a parcel; the store assigns the control number and deadline
    async fn create_parcel(&self, row: &ClassifiedRow, arrival_date: NaiveDate) -> StoreResult<Parcel>;

    async fn fetch_parcels(&self, ids: &[ControlNumber]) -> StoreResult<Vec<Parcel>>;

    async fn list_parcels(&self) -> StoreResult<Vec<Parcel>>;

    async fn transition_parcel(&self, id: ControlNumber, event: CustodyEvent) -> StoreResult<Parcel>;

    /// Apply one event to many parcels, all or nothing
    async fn bulk_transition(&self, ids: &[ControlNumber], event: CustodyEvent) -> StoreResult<()>;

    /// Archive every unarchived Delivered/Returned parcel; returns how many changed
    async fn archive_completed_parcels(&self) -> StoreResult<usize>;

    async fn unarchive_parcel(&self, id: ControlNumber) -> StoreResult<Parcel>;

    async fn link_parcel_to_customer(&self, id: ControlNumber, customer_id: CustomerId) -> StoreResult<Parcel>;

    /// Customer records (and their responsible contacts) needed to resolve phones
    async fn fetch_reachability_data(&self, ids: &[CustomerId]) -> StoreResult<Vec<Customer>>;

    async fn list_message_templates(&self) -> StoreResult<Vec<MessageTemplate>>;
}
