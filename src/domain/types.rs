//! Shared types for parcel custody

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Newtype wrapper for control numbers assigned by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ControlNumber(pub i64);

impl std::fmt::Display for ControlNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for recipient (customer) record IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CustomerId(pub i64);

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted classification rule (UUIDv7, time-sortable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Custody status of a parcel. `archived` is tracked separately on the parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParcelStatus {
    #[default]
    Awaiting,
    Delivered,
    Returned,
}

impl ParcelStatus {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Awaiting => "awaiting",
            ParcelStatus::Delivered => "delivered",
            ParcelStatus::Returned => "returned",
        }
    }

    /// Delivered and Returned are the only statuses that may be archived
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, ParcelStatus::Delivered | ParcelStatus::Returned)
    }
}

impl std::fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured object type (e.g. "Encomenda PAC", "Carta Registrada")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectType {
    pub name: String,
    /// Default storage days for this type, when configured
    #[serde(default)]
    pub storage_days: Option<u32>,
}

impl ObjectType {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), storage_days: None }
    }

    pub fn with_storage_days(mut self, days: u32) -> Self {
        self.storage_days = Some(days);
        self
    }
}

/// Canonical prefix form: trimmed, uppercase
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().to_uppercase()
}

/// Maps a tracking-code prefix to an object type and storage period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub prefix: String,
    pub object_type: String,
    pub storage_days: u32,
}

impl ClassificationRule {
    /// Create a rule; the prefix is normalized to trimmed uppercase
    pub fn new(prefix: &str, object_type: &str, storage_days: u32) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            object_type: object_type.to_string(),
            storage_days,
        }
    }

    /// Same rule with its prefix in canonical form
    pub fn normalized(mut self) -> Self {
        self.prefix = normalize_prefix(&self.prefix);
        self
    }

    /// Case-insensitive prefix test; holds for rules that skipped `new`
    pub fn matches(&self, tracking_code: &str) -> bool {
        let prefix = normalize_prefix(&self.prefix);
        !prefix.is_empty() && tracking_code.trim().to_uppercase().starts_with(&prefix)
    }
}

/// Recipient street address as captured from the pasted row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: String,
}

/// A fully classified row, ready for parcel creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub tracking_code: Option<String>,
    pub recipient_name: String,
    pub object_type: String,
    #[serde(default)]
    pub address: Address,
    /// Storage days from the matched or derived rule; `None` defers to the type default
    #[serde(default)]
    pub storage_days: Option<u32>,
}

/// A physical item in custody
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub control_number: ControlNumber,
    pub recipient_name: String,
    pub object_type: String,
    #[serde(default)]
    pub tracking_code: Option<String>,
    pub arrival_date: NaiveDate,
    pub storage_deadline: NaiveDate,
    #[serde(default)]
    pub status: ParcelStatus,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
}

/// Recipient record; `responsible_id` links a responsible contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub responsible_id: Option<CustomerId>,
}

fn default_active() -> bool {
    true
}

impl Customer {
    pub fn new(id: i64, name: &str) -> Self {
        Self { id: CustomerId(id), name: name.to_string(), phone: None, active: true, responsible_id: None }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    pub fn with_responsible(mut self, id: i64) -> Self {
        self.responsible_id = Some(CustomerId(id));
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Named, reusable notification fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub name: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn new(name: &str, body: &str) -> Self {
        Self { name: name.to_string(), body: body.to_string() }
    }
}
