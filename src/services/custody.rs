//! Custody service: store-backed status transitions, bulk operations, views
//!
//! Guards are checked against freshly fetched parcels before anything is
//! sent to the store. Events that are already satisfied are dropped from
//! the write, so repeating an operation is a no-op.

use crate::domain::error::{Error, Result};
use crate::domain::parcel::{CustodyEvent, ParcelView, Transition};
use crate::domain::types::{ControlNumber, CustomerId, Parcel};
use crate::domain::StoreError;
use crate::infra::metrics::Metrics;
use crate::io::store::RecordStore;
use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct CustodyService {
    store: Arc<dyn RecordStore>,
    metrics: Arc<Metrics>,
}

impl CustodyService {
    pub fn new(store: Arc<dyn RecordStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    async fn fetch_one(&self, id: ControlNumber) -> Result<Parcel> {
        let mut parcels = self.store.fetch_parcels(&[id]).await?;
        parcels.pop().ok_or(Error::Store(StoreError::NotFound(id)))
    }

    /// Apply a single event to one parcel
    pub async fn transition(&self, id: ControlNumber, event: CustodyEvent) -> Result<Parcel> {
        let parcel = self.fetch_one(id).await?;
        if parcel.check(event)? == Transition::Unchanged {
            debug!(control_number = %id, event = %event, "transition_already_applied");
            return Ok(parcel);
        }

        let updated = self.store.transition_parcel(id, event).await?;
        self.metrics.record_transitions(1);
        info!(
            control_number = %id,
            event = %event,
            status = %updated.status,
            archived = %updated.archived,
            "parcel_transitioned"
        );
        Ok(updated)
    }

    pub async fn deliver(&self, id: ControlNumber) -> Result<Parcel> {
        self.transition(id, CustodyEvent::Deliver).await
    }

    pub async fn return_to_sender(&self, id: ControlNumber) -> Result<Parcel> {
        self.transition(id, CustodyEvent::Return).await
    }

    pub async fn revert(&self, id: ControlNumber) -> Result<Parcel> {
        self.transition(id, CustodyEvent::Revert).await
    }

    pub async fn archive(&self, id: ControlNumber) -> Result<Parcel> {
        self.transition(id, CustodyEvent::Archive).await
    }

    pub async fn unarchive(&self, id: ControlNumber) -> Result<Parcel> {
        let parcel = self.fetch_one(id).await?;
        parcel.check(CustodyEvent::Unarchive)?;
        let updated = self.store.unarchive_parcel(id).await?;
        self.metrics.record_transitions(1);
        info!(control_number = %id, status = %updated.status, "parcel_unarchived");
        Ok(updated)
    }

    /// Apply one event to a set of parcels, all or nothing.
    ///
    /// Returns how many parcels actually changed. Any guard violation
    /// aborts before the store is touched.
    pub async fn bulk_transition(&self, ids: &[ControlNumber], event: CustodyEvent) -> Result<usize> {
        let mut seen = FxHashSet::default();
        let unique: Vec<ControlNumber> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() {
            return Ok(0);
        }

        let parcels = self.store.fetch_parcels(&unique).await?;
        let mut changing = Vec::with_capacity(parcels.len());
        for parcel in &parcels {
            if parcel.check(event)? == Transition::Changed {
                changing.push(parcel.control_number);
            }
        }

        if !changing.is_empty() {
            self.store.bulk_transition(&changing, event).await?;
        }
        self.metrics.record_transitions(changing.len());
        info!(
            event = %event,
            requested = %unique.len(),
            changed = %changing.len(),
            "bulk_transition_applied"
        );
        Ok(changing.len())
    }

    pub async fn bulk_deliver(&self, ids: &[ControlNumber]) -> Result<usize> {
        self.bulk_transition(ids, CustodyEvent::Deliver).await
    }

    pub async fn bulk_return(&self, ids: &[ControlNumber]) -> Result<usize> {
        self.bulk_transition(ids, CustodyEvent::Return).await
    }

    /// Archive every completed, unarchived parcel. Awaiting parcels are never touched.
    pub async fn archive_completed(&self) -> Result<usize> {
        let archived = self.store.archive_completed_parcels().await?;
        self.metrics.record_transitions(archived);
        info!(archived = %archived, "completed_parcels_archived");
        Ok(archived)
    }

    /// Link an unlinked parcel to a recipient record
    pub async fn link_to_customer(&self, id: ControlNumber, customer_id: CustomerId) -> Result<Parcel> {
        let parcel = self.fetch_one(id).await?;
        if let Some(existing) = parcel.customer_id {
            return Err(Error::AlreadyLinked { control_number: id, customer_id: existing });
        }
        let linked = self.store.link_parcel_to_customer(id, customer_id).await?;
        info!(control_number = %id, customer_id = %customer_id, "parcel_linked");
        Ok(linked)
    }

    /// Parcels in a derived view, or all parcels when `view` is `None`
    pub async fn list(&self, view: Option<ParcelView>, today: NaiveDate) -> Result<Vec<Parcel>> {
        let parcels = self.store.list_parcels().await?;
        Ok(match view {
            Some(view) => parcels.into_iter().filter(|p| p.view(today) == view).collect(),
            None => parcels,
        })
    }

    /// Awaiting parcels past their deadline, oldest deadline first
    pub async fn expired(&self, today: NaiveDate) -> Result<Vec<Parcel>> {
        let mut parcels = self.list(Some(ParcelView::Expired), today).await?;
        parcels.sort_by_key(|p| (p.storage_deadline, p.control_number));
        Ok(parcels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ClassifiedRow, Customer, ParcelStatus};
    use crate::io::memory_store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(name: &str, days: u32) -> ClassifiedRow {
        ClassifiedRow {
            tracking_code: Some("AC1BR".to_string()),
            recipient_name: name.to_string(),
            object_type: "Encomenda PAC".to_string(),
            address: Default::default(),
            storage_days: Some(days),
        }
    }

    async fn setup(count: usize) -> (Arc<MemoryStore>, CustodyService, Vec<ControlNumber>) {
        let store = Arc::new(MemoryStore::new(vec![], 7).with_customers([Customer::new(1, "Ana")]));
        let mut ids = Vec::new();
        for i in 0..count {
            let p = store.create_parcel(&row(&format!("P{i}"), 7), date(2024, 5, 1)).await.unwrap();
            ids.push(p.control_number);
        }
        let service = CustodyService::new(store.clone(), Arc::new(Metrics::new()));
        (store, service, ids)
    }

    #[tokio::test]
    async fn test_deliver_twice_is_noop() {
        let (_store, service, ids) = setup(1).await;
        let first = service.deliver(ids[0]).await.unwrap();
        let second = service.deliver(ids[0]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.status, ParcelStatus::Delivered);
    }

    #[tokio::test]
    async fn test_revert_archived_rejected() {
        let (_store, service, ids) = setup(1).await;
        service.return_to_sender(ids[0]).await.unwrap();
        service.archive(ids[0]).await.unwrap();
        let err = service.revert(ids[0]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { event: CustodyEvent::Revert, .. }));
    }

    #[tokio::test]
    async fn test_bulk_deliver_idempotent() {
        let (store, service, ids) = setup(3).await;
        service.deliver(ids[0]).await.unwrap();

        assert_eq!(service.bulk_deliver(&ids).await.unwrap(), 2);
        assert_eq!(service.bulk_deliver(&ids).await.unwrap(), 0);
        let parcels = store.list_parcels().await.unwrap();
        assert!(parcels.iter().all(|p| p.status == ParcelStatus::Delivered));
    }

    #[tokio::test]
    async fn test_bulk_return_all_or_nothing() {
        let (store, service, ids) = setup(3).await;
        service.deliver(ids[1]).await.unwrap();

        let err = service.bulk_return(&ids).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        let parcels = store.fetch_parcels(&[ids[0], ids[2]]).await.unwrap();
        assert!(parcels.iter().all(|p| p.status == ParcelStatus::Awaiting));
    }

    #[tokio::test]
    async fn test_store_side_guard_stays_typed() {
        let (store, service, ids) = setup(2).await;
        service.deliver(ids[0]).await.unwrap();

        // Written behind the service's back, as a concurrent caller would
        let err: Error = store.transition_parcel(ids[0], CustodyEvent::Return).await.unwrap_err().into();
        assert!(matches!(
            err,
            Error::InvalidTransition { event: CustodyEvent::Return, status: ParcelStatus::Delivered, .. }
        ));

        let err: Error = store.bulk_transition(&ids, CustodyEvent::Return).await.unwrap_err().into();
        assert!(matches!(err, Error::InvalidTransition { archived: false, .. }));
    }

    #[tokio::test]
    async fn test_bulk_unknown_id_fails_cleanly() {
        let (store, service, ids) = setup(1).await;
        let err = service.bulk_deliver(&[ids[0], ControlNumber(99)]).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(store.fetch_parcels(&ids).await.unwrap()[0].status, ParcelStatus::Awaiting);
    }

    #[tokio::test]
    async fn test_archive_completed_sweep() {
        let (store, service, ids) = setup(3).await;
        service.deliver(ids[0]).await.unwrap();
        service.return_to_sender(ids[1]).await.unwrap();

        assert_eq!(service.archive_completed().await.unwrap(), 2);
        assert_eq!(service.archive_completed().await.unwrap(), 0);

        let parcels = store.list_parcels().await.unwrap();
        assert!(parcels[0].archived && parcels[1].archived);
        assert!(!parcels[2].archived);
        assert!(parcels.iter().all(|p| !p.archived || p.status.is_completed()));
    }

    #[tokio::test]
    async fn test_unarchive_keeps_status() {
        let (_store, service, ids) = setup(1).await;
        service.deliver(ids[0]).await.unwrap();
        service.archive_completed().await.unwrap();
        let parcel = service.unarchive(ids[0]).await.unwrap();
        assert!(!parcel.archived);
        assert_eq!(parcel.status, ParcelStatus::Delivered);
        assert!(service.unarchive(ids[0]).await.is_err());
    }

    #[tokio::test]
    async fn test_link_only_while_unlinked() {
        let (_store, service, ids) = setup(1).await;
        let linked = service.link_to_customer(ids[0], CustomerId(1)).await.unwrap();
        assert_eq!(linked.customer_id, Some(CustomerId(1)));
        let err = service.link_to_customer(ids[0], CustomerId(1)).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyLinked { .. }));
    }

    #[tokio::test]
    async fn test_views_and_expired() {
        let (_store, service, ids) = setup(3).await;
        service.deliver(ids[2]).await.unwrap();
        let today = date(2024, 5, 20);

        assert_eq!(service.list(Some(ParcelView::Expired), today).await.unwrap().len(), 2);
        assert_eq!(service.list(Some(ParcelView::Awaiting), today).await.unwrap().len(), 0);
        assert_eq!(service.list(Some(ParcelView::Delivered), today).await.unwrap().len(), 1);
        assert_eq!(service.list(None, today).await.unwrap().len(), 3);

        let expired = service.expired(today).await.unwrap();
        assert_eq!(expired.iter().map(|p| p.control_number).collect::<Vec<_>>(), vec![ids[0], ids[1]]);
        assert!(service.expired(date(2024, 5, 2)).await.unwrap().is_empty());
    }
}
