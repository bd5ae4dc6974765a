//! In-process record store with JSON snapshot persistence
//!
//! All state sits behind a single `parking_lot::Mutex`, so every operation
//! (including bulk ones) is atomic with respect to other callers. The
//! snapshot file is written pretty-printed so operators can inspect it.

use crate::domain::parcel::{deadline_for, CustodyEvent};
use crate::domain::types::{
    normalize_prefix, ClassificationRule, ClassifiedRow, ControlNumber, Customer, CustomerId,
    MessageTemplate, ObjectType, Parcel, RuleId,
};
use crate::domain::StoreError;
use crate::infra::config::Config;
use crate::io::store::{RecordStore, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// A rule together with its store-assigned id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRule {
    pub id: RuleId,
    #[serde(flatten)]
    pub rule: ClassificationRule,
}

/// On-disk layout of the store
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub next_control_number: i64,
    #[serde(default)]
    pub rules: Vec<StoredRule>,
    #[serde(default)]
    pub parcels: Vec<Parcel>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub templates: Vec<MessageTemplate>,
}

#[derive(Default)]
struct State {
    next_control_number: i64,
    rules: Vec<StoredRule>,
    parcels: BTreeMap<ControlNumber, Parcel>,
    customers: FxHashMap<CustomerId, Customer>,
    templates: Vec<MessageTemplate>,
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let parcels: BTreeMap<ControlNumber, Parcel> =
            snapshot.parcels.into_iter().map(|p| (p.control_number, p)).collect();
        let max_existing = parcels.keys().next_back().map(|c| c.0).unwrap_or(0);
        let mut state = Self {
            next_control_number: snapshot.next_control_number.max(max_existing),
            rules: Vec::with_capacity(snapshot.rules.len()),
            parcels,
            customers: snapshot.customers.into_iter().map(|c| (c.id, c)).collect(),
            templates: snapshot.templates,
        };
        for stored in snapshot.rules {
            state.put_rule(stored.id, stored.rule);
        }
        state
    }

    /// Store a rule under `id`, replacing every rule with the same prefix.
    /// At most one rule per normalized prefix is ever held.
    fn put_rule(&mut self, id: RuleId, rule: ClassificationRule) {
        let rule = rule.normalized();
        self.rules.retain(|r| normalize_prefix(&r.rule.prefix) != rule.prefix);
        self.rules.push(StoredRule { id, rule });
    }

    /// Insert or replace by prefix, keeping the id of a replaced rule
    fn upsert_rule(&mut self, rule: ClassificationRule) -> RuleId {
        let prefix = normalize_prefix(&rule.prefix);
        let id = self
            .rules
            .iter()
            .find(|r| normalize_prefix(&r.rule.prefix) == prefix)
            .map(|r| r.id.clone())
            .unwrap_or_default();
        self.put_rule(id.clone(), rule);
        id
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut customers: Vec<Customer> = self.customers.values().cloned().collect();
        customers.sort_by_key(|c| c.id);
        Snapshot {
            next_control_number: self.next_control_number,
            rules: self.rules.clone(),
            parcels: self.parcels.values().cloned().collect(),
            customers,
            templates: self.templates.clone(),
        }
    }

    fn parcel_mut(&mut self, id: ControlNumber) -> StoreResult<&mut Parcel> {
        self.parcels.get_mut(&id).ok_or(StoreError::NotFound(id))
    }
}

/// In-memory `RecordStore`
pub struct MemoryStore {
    state: Mutex<State>,
    object_types: Vec<ObjectType>,
    fallback_storage_days: u32,
    /// Prefixes the store refuses rule writes for
    reserved_prefixes: FxHashSet<String>,
}

impl MemoryStore {
    pub fn new(object_types: Vec<ObjectType>, fallback_storage_days: u32) -> Self {
        Self {
            state: Mutex::new(State { next_control_number: 0, ..Default::default() }),
            object_types,
            fallback_storage_days,
            reserved_prefixes: FxHashSet::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.object_types().to_vec(), config.fallback_storage_days())
    }

    /// Load a snapshot file; a missing file yields an empty store
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> StoreResult<Self> {
        let path = path.as_ref();
        let store = Self::from_config(config);
        if !path.exists() {
            info!(file = %path.display(), "store_snapshot_missing_starting_empty");
            return Ok(store);
        }
        let content = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        info!(
            file = %path.display(),
            parcels = %snapshot.parcels.len(),
            rules = %snapshot.rules.len(),
            customers = %snapshot.customers.len(),
            "store_snapshot_loaded"
        );
        *store.state.lock() = State::from_snapshot(snapshot);
        Ok(store)
    }

    /// Write the current state to a snapshot file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.state.lock().to_snapshot())?;
        fs::write(path, json)?;
        debug!(file = %path.display(), "store_snapshot_saved");
        Ok(())
    }

    pub fn with_reserved_prefix(mut self, prefix: &str) -> Self {
        self.reserved_prefixes.insert(prefix.trim().to_uppercase());
        self
    }

    pub fn with_rules(self, rules: impl IntoIterator<Item = ClassificationRule>) -> Self {
        {
            let mut state = self.state.lock();
            for rule in rules {
                state.upsert_rule(rule);
            }
        }
        self
    }

    pub fn with_customers(self, customers: impl IntoIterator<Item = Customer>) -> Self {
        {
            let mut state = self.state.lock();
            for customer in customers {
                state.customers.insert(customer.id, customer);
            }
        }
        self
    }

    pub fn with_templates(self, templates: impl IntoIterator<Item = MessageTemplate>) -> Self {
        self.state.lock().templates.extend(templates);
        self
    }

    /// Insert or replace a parcel as-is (imports and fixtures)
    pub fn insert_parcel(&self, parcel: Parcel) {
        let mut state = self.state.lock();
        state.next_control_number = state.next_control_number.max(parcel.control_number.0);
        state.parcels.insert(parcel.control_number, parcel);
    }

    pub fn rule_count(&self) -> usize {
        self.state.lock().rules.len()
    }

    /// Storage days for a created row: row value, else type default, else fallback
    fn storage_days_for(&self, row: &ClassifiedRow) -> u32 {
        row.storage_days
            .or_else(|| {
                self.object_types
                    .iter()
                    .find(|t| t.name == row.object_type)
                    .and_then(|t| t.storage_days)
            })
            .unwrap_or(self.fallback_storage_days)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn lookup_rules_by_prefix(&self) -> StoreResult<Vec<ClassificationRule>> {
        Ok(self.state.lock().rules.iter().map(|r| r.rule.clone()).collect())
    }

    async fn persist_rule(&self, rule: &ClassificationRule) -> StoreResult<RuleId> {
        let prefix = normalize_prefix(&rule.prefix);
        if self.reserved_prefixes.contains(&prefix) {
            warn!(prefix = %prefix, "rule_write_rejected_reserved_prefix");
            return Err(StoreError::Rejected(format!("prefix {prefix} is reserved")));
        }
        Ok(self.state.lock().upsert_rule(rule.clone()))
    }

    async fn delete_rule(&self, id: &RuleId) -> StoreResult<()> {
        let mut state = self.state.lock();
        let before = state.rules.len();
        state.rules.retain(|r| &r.id != id);
        if state.rules.len() == before {
            return Err(StoreError::RuleNotFound(id.clone()));
        }
        Ok(())
    }

    async fn create_parcel(&self, row: &ClassifiedRow, arrival_date: NaiveDate) -> StoreResult<Parcel> {
        let storage_days = self.storage_days_for(row);
        let mut state = self.state.lock();
        state.next_control_number += 1;
        let control_number = ControlNumber(state.next_control_number);
        let parcel = Parcel::from_row(control_number, row, arrival_date, storage_days);
        state.parcels.insert(control_number, parcel.clone());
        debug_assert_eq!(parcel.storage_deadline, deadline_for(arrival_date, storage_days));
        Ok(parcel)
    }

    async fn fetch_parcels(&self, ids: &[ControlNumber]) -> StoreResult<Vec<Parcel>> {
        let state = self.state.lock();
        ids.iter()
            .map(|id| state.parcels.get(id).cloned().ok_or(StoreError::NotFound(*id)))
            .collect()
    }

    async fn list_parcels(&self) -> StoreResult<Vec<Parcel>> {
        Ok(self.state.lock().parcels.values().cloned().collect())
    }

    async fn transition_parcel(&self, id: ControlNumber, event: CustodyEvent) -> StoreResult<Parcel> {
        let mut state = self.state.lock();
        let parcel = state.parcel_mut(id)?;
        parcel.apply(event)?;
        Ok(parcel.clone())
    }

    async fn bulk_transition(&self, ids: &[ControlNumber], event: CustodyEvent) -> StoreResult<()> {
        let mut state = self.state.lock();

        // Stage every change before committing any
        let mut staged = Vec::with_capacity(ids.len());
        for id in ids {
            let mut parcel = state.parcels.get(id).cloned().ok_or(StoreError::NotFound(*id))?;
            parcel.apply(event)?;
            staged.push(parcel);
        }
        for parcel in staged {
            state.parcels.insert(parcel.control_number, parcel);
        }
        Ok(())
    }

    async fn archive_completed_parcels(&self) -> StoreResult<usize> {
        let mut state = self.state.lock();
        let mut archived = 0;
        for parcel in state.parcels.values_mut() {
            if parcel.status.is_completed() && !parcel.archived {
                parcel.archived = true;
                archived += 1;
            }
        }
        Ok(archived)
    }

    async fn unarchive_parcel(&self, id: ControlNumber) -> StoreResult<Parcel> {
        self.transition_parcel(id, CustodyEvent::Unarchive).await
    }

    async fn link_parcel_to_customer(&self, id: ControlNumber, customer_id: CustomerId) -> StoreResult<Parcel> {
        let mut state = self.state.lock();
        if !state.customers.contains_key(&customer_id) {
            return Err(StoreError::Rejected(format!("customer {customer_id} does not exist")));
        }
        let parcel = state.parcel_mut(id)?;
        if let Some(existing) = parcel.customer_id {
            return Err(StoreError::Rejected(format!("parcel {id} already linked to {existing}")));
        }
        parcel.customer_id = Some(customer_id);
        Ok(parcel.clone())
    }

    async fn fetch_reachability_data(&self, ids: &[CustomerId]) -> StoreResult<Vec<Customer>> {
        let state = self.state.lock();
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for id in ids {
            let Some(customer) = state.customers.get(id) else { continue };
            if seen.insert(customer.id) {
                out.push(customer.clone());
            }
            if let Some(responsible) = customer.responsible_id.and_then(|r| state.customers.get(&r)) {
                if seen.insert(responsible.id) {
                    out.push(responsible.clone());
                }
            }
        }
        Ok(out)
    }

    async fn list_message_templates(&self) -> StoreResult<Vec<MessageTemplate>> {
        Ok(self.state.lock().templates.clone())
    }
}
