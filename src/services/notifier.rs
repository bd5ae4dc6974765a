//! Store-backed notification workflow: resolve contacts, then compose

use crate::domain::error::{Error, Result};
use crate::domain::types::{ControlNumber, CustomerId, MessageTemplate, Parcel};
use crate::infra::metrics::Metrics;
use crate::io::store::RecordStore;
use crate::services::composer::{self, Artifact, CompositionContext, OutboundMessage};
use crate::services::contact::ContactBook;
use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::info;

pub struct Notifier {
    store: Arc<dyn RecordStore>,
    ctx: CompositionContext,
    metrics: Arc<Metrics>,
}

impl Notifier {
    pub fn new(store: Arc<dyn RecordStore>, ctx: CompositionContext, metrics: Arc<Metrics>) -> Self {
        Self { store, ctx, metrics }
    }

    pub async fn templates(&self) -> Result<Vec<MessageTemplate>> {
        Ok(self.store.list_message_templates().await?)
    }

    /// Compose the named fragments, in the order given
    pub async fn compose_named(&self, names: &[String]) -> Result<String> {
        let available = self.templates().await?;
        let fragments = composer::select_fragments(&available, names)?;
        Ok(composer::compose(&fragments))
    }

    /// Normalized phone per reachable parcel
    pub async fn reachability(&self, parcels: &[Parcel]) -> Result<FxHashMap<ControlNumber, String>> {
        let mut customer_ids: Vec<CustomerId> = parcels.iter().filter_map(|p| p.customer_id).collect();
        customer_ids.sort_unstable();
        customer_ids.dedup();
        if customer_ids.is_empty() {
            return Ok(FxHashMap::default());
        }
        let book = ContactBook::new(self.store.fetch_reachability_data(&customer_ids).await?);
        Ok(book.reachable(parcels, &self.ctx.country_code))
    }

    /// Message and link for one parcel, for an immediate send
    pub async fn compose_for(
        &self,
        id: ControlNumber,
        composed_template: &str,
        today: NaiveDate,
    ) -> Result<OutboundMessage> {
        let parcels = self.store.fetch_parcels(&[id]).await?;
        let phones = self.reachability(&parcels).await?;
        let (Some(parcel), Some(phone)) = (parcels.first(), phones.get(&id)) else {
            self.metrics.record_messages(0, 1);
            return Err(Error::NoReachableRecipients);
        };
        let message = composer::compose_for(parcel, phone, composed_template, &self.ctx, today)?;
        self.metrics.record_messages(1, 0);
        info!(control_number = %id, "notification_composed");
        Ok(message)
    }

    /// Batch artifact for many parcels; unreachable ones are skipped
    pub async fn generate_batch(
        &self,
        ids: &[ControlNumber],
        composed_template: &str,
        today: NaiveDate,
    ) -> Result<Artifact> {
        let parcels = self.store.fetch_parcels(ids).await?;
        let phones = self.reachability(&parcels).await?;
        let result = composer::generate_batch(&parcels, &phones, composed_template, &self.ctx, today);

        match &result {
            Ok(artifact) => {
                self.metrics.record_messages(artifact.entries.len(), artifact.skipped.len());
                info!(
                    requested = %parcels.len(),
                    entries = %artifact.entries.len(),
                    skipped = %artifact.skipped.len(),
                    "notification_batch_generated"
                );
            }
            Err(_) => self.metrics.record_messages(0, parcels.len()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ClassifiedRow, Customer};
    use crate::infra::config::Config;
    use crate::io::memory_store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (Notifier, Vec<ControlNumber>) {
        let store = Arc::new(
            MemoryStore::new(vec![], 7)
                .with_customers([
                    Customer::new(1, "Ana").with_phone("(11) 99999-0000"),
                    Customer::new(2, "Bia").with_responsible(3),
                    Customer::new(3, "Caio").with_phone("11 98888-0000"),
                    Customer::new(4, "Duda").with_phone("11 97777-0000").inactive(),
                ])
                .with_templates([
                    MessageTemplate::new("greeting", "Olá {{NOME_CLIENTE}},"),
                    MessageTemplate::new("deadline", "retire até {{DATA_PRAZO}}."),
                ]),
        );

        let mut ids = Vec::new();
        for (name, customer) in [("Ana", Some(1)), ("Bia", Some(2)), ("Duda", Some(4)), ("Eva", None)] {
            let row = ClassifiedRow {
                tracking_code: None,
                recipient_name: name.to_string(),
                object_type: "Encomenda PAC".to_string(),
                address: Default::default(),
                storage_days: Some(7),
            };
            let parcel = store.create_parcel(&row, date(2024, 5, 3)).await.unwrap();
            if let Some(c) = customer {
                store.link_parcel_to_customer(parcel.control_number, CustomerId(c)).await.unwrap();
            }
            ids.push(parcel.control_number);
        }

        let notifier =
            Notifier::new(store, CompositionContext::from_config(&Config::default()), Arc::new(Metrics::new()));
        (notifier, ids)
    }

    #[tokio::test]
    async fn test_compose_named_in_order() {
        let (notifier, _) = setup().await;
        let text = notifier.compose_named(&["deadline".to_string(), "greeting".to_string()]).await.unwrap();
        assert_eq!(text, "retire até {{DATA_PRAZO}}.\n\nOlá {{NOME_CLIENTE}},");
    }

    #[tokio::test]
    async fn test_batch_skips_unreachable() {
        let (notifier, ids) = setup().await;
        let artifact = notifier.generate_batch(&ids, "Olá {{NOME_CLIENTE}}", date(2024, 5, 4)).await.unwrap();

        assert_eq!(artifact.entries.len(), 2);
        assert_eq!(artifact.entries[0].phone, "5511999990000");
        assert_eq!(artifact.entries[1].phone, "5511988880000");
        assert_eq!(artifact.skipped, vec![ids[2], ids[3]]);
    }

    #[tokio::test]
    async fn test_compose_for_single() {
        let (notifier, ids) = setup().await;
        let message = notifier.compose_for(ids[0], "{{NOME_CLIENTE}} até {{DATA_PRAZO}}", date(2024, 5, 4)).await.unwrap();
        assert_eq!(message.message, "Ana até 11/05/2024");
        assert!(message.link.starts_with("https://wa.me/5511999990000?text="));

        let err = notifier.compose_for(ids[3], "x", date(2024, 5, 4)).await.unwrap_err();
        assert!(matches!(err, Error::NoReachableRecipients));
    }

    #[tokio::test]
    async fn test_batch_none_reachable() {
        let (notifier, ids) = setup().await;
        let err = notifier.generate_batch(&ids[2..], "x", date(2024, 5, 4)).await.unwrap_err();
        assert!(matches!(err, Error::NoReachableRecipients));
    }
}
