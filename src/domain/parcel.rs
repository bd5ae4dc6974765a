//! Parcel custody state machine and storage-deadline math

use crate::domain::error::{Error, Result};
use crate::domain::types::{ClassifiedRow, ControlNumber, Parcel, ParcelStatus};
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Today's date in the facility's local timezone
#[inline]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Storage deadline for a parcel arriving on `arrival` with `storage_days` of custody
#[inline]
pub fn deadline_for(arrival: NaiveDate, storage_days: u32) -> NaiveDate {
    arrival.checked_add_days(Days::new(u64::from(storage_days))).unwrap_or(NaiveDate::MAX)
}

/// Events accepted by the custody state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustodyEvent {
    Deliver,
    Return,
    Revert,
    Archive,
    Unarchive,
}

impl CustodyEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustodyEvent::Deliver => "deliver",
            CustodyEvent::Return => "return",
            CustodyEvent::Revert => "revert",
            CustodyEvent::Archive => "archive",
            CustodyEvent::Unarchive => "unarchive",
        }
    }
}

impl std::fmt::Display for CustodyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of applying an event to a parcel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed,
    /// Event was already satisfied (e.g. deliver on a delivered parcel)
    Unchanged,
}

/// Read-time classification used for filtering and reports. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParcelView {
    Awaiting,
    Expired,
    Delivered,
    Returned,
    Archived,
}

impl ParcelView {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelView::Awaiting => "awaiting",
            ParcelView::Expired => "expired",
            ParcelView::Delivered => "delivered",
            ParcelView::Returned => "returned",
            ParcelView::Archived => "archived",
        }
    }
}

impl std::str::FromStr for ParcelView {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "awaiting" => Ok(ParcelView::Awaiting),
            "expired" => Ok(ParcelView::Expired),
            "delivered" => Ok(ParcelView::Delivered),
            "returned" => Ok(ParcelView::Returned),
            "archived" => Ok(ParcelView::Archived),
            other => Err(format!("unknown view {other:?}")),
        }
    }
}

impl Parcel {
    /// Build a new parcel from a classified row.
    ///
    /// Status starts as `Awaiting`, unarchived and unlinked. The deadline is
    /// fixed here and never recomputed, even if rules change later.
    ///
    /// # Example
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use parcel_custody::domain::types::{ClassifiedRow, ControlNumber, Parcel, ParcelStatus};
    ///
    /// let row = ClassifiedRow {
    ///     tracking_code: Some("AC1234567BR".to_string()),
    ///     recipient_name: "Maria".to_string(),
    ///     object_type: "Encomenda PAC".to_string(),
    ///     address: Default::default(),
    ///     storage_days: Some(7),
    /// };
    /// let arrival = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
    /// let parcel = Parcel::from_row(ControlNumber(1), &row, arrival, 7);
    /// assert_eq!(parcel.storage_deadline, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    /// assert_eq!(parcel.status, ParcelStatus::Awaiting);
    /// ```
    pub fn from_row(
        control_number: ControlNumber,
        row: &ClassifiedRow,
        arrival_date: NaiveDate,
        storage_days: u32,
    ) -> Self {
        Self {
            control_number,
            recipient_name: row.recipient_name.clone(),
            object_type: row.object_type.clone(),
            tracking_code: row.tracking_code.clone(),
            arrival_date,
            storage_deadline: deadline_for(arrival_date, storage_days),
            status: ParcelStatus::Awaiting,
            archived: false,
            customer_id: None,
        }
    }

    fn invalid(&self, event: CustodyEvent) -> Error {
        Error::InvalidTransition {
            control_number: self.control_number,
            event,
            status: self.status,
            archived: self.archived,
        }
    }

    /// Check an event against the transition table without mutating
    pub fn check(&self, event: CustodyEvent) -> Result<Transition> {
        use CustodyEvent::*;
        use ParcelStatus::*;

        match (event, self.status) {
            (Deliver, Awaiting) | (Return, Awaiting) => Ok(Transition::Changed),
            (Deliver, Delivered) | (Return, Returned) => Ok(Transition::Unchanged),
            (Deliver, Returned) | (Return, Delivered) => Err(self.invalid(event)),
            (Revert, Awaiting) => Ok(Transition::Unchanged),
            (Revert, _) if self.archived => Err(self.invalid(event)),
            (Revert, _) => Ok(Transition::Changed),
            (Archive, status) if status.is_completed() && !self.archived => {
                Ok(Transition::Changed)
            }
            (Archive, _) => Err(self.invalid(event)),
            (Unarchive, _) if self.archived => Ok(Transition::Changed),
            (Unarchive, _) => Err(self.invalid(event)),
        }
    }

    /// Apply an event, enforcing guards
    pub fn apply(&mut self, event: CustodyEvent) -> Result<Transition> {
        let transition = self.check(event)?;
        if transition == Transition::Unchanged {
            return Ok(transition);
        }
        match event {
            CustodyEvent::Deliver => self.status = ParcelStatus::Delivered,
            CustodyEvent::Return => self.status = ParcelStatus::Returned,
            CustodyEvent::Revert => self.status = ParcelStatus::Awaiting,
            CustodyEvent::Archive => self.archived = true,
            CustodyEvent::Unarchive => self.archived = false,
        }
        debug_assert!(!self.archived || self.status.is_completed());
        Ok(transition)
    }

    /// Elapsed share of the storage period, clamped to [0, 1]
    ///
    /// Only meaningful while `Awaiting`; a zero-length period counts as fully elapsed.
    pub fn progress(&self, today: NaiveDate) -> f64 {
        let total = (self.storage_deadline - self.arrival_date).num_days();
        if total <= 0 {
            return 1.0;
        }
        let elapsed = (today - self.arrival_date).num_days();
        (elapsed as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Whole days left until the deadline, never negative
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.storage_deadline - today).num_days().max(0)
    }

    /// Still awaiting pickup past the deadline
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.status == ParcelStatus::Awaiting && today > self.storage_deadline
    }

    /// Derived view used for listing
    pub fn view(&self, today: NaiveDate) -> ParcelView {
        if self.archived {
            return ParcelView::Archived;
        }
        match self.status {
            ParcelStatus::Awaiting if self.is_expired(today) => ParcelView::Expired,
            ParcelStatus::Awaiting => ParcelView::Awaiting,
            ParcelStatus::Delivered => ParcelView::Delivered,
            ParcelStatus::Returned => ParcelView::Returned,
        }
    }
}
