//! Contact resolution: which phone, if any, reaches a parcel's recipient

use crate::domain::types::{ControlNumber, Customer, CustomerId, Parcel};
use rustc_hash::FxHashMap;

/// Resolve the phone for a parcel.
///
/// Strict priority chain, first satisfied branch wins:
/// 1. parcel not linked to a recipient -> none
/// 2. recipient inactive -> none
/// 3. recipient's own phone
/// 4. active responsible contact's phone
/// 5. none
pub fn resolve_contact_phone(
    parcel: &Parcel,
    recipient: Option<&Customer>,
    responsible: Option<&Customer>,
) -> Option<String> {
    parcel.customer_id?;
    let recipient = recipient?;
    if !recipient.active {
        return None;
    }
    if let Some(phone) = non_blank(recipient.phone.as_deref()) {
        return Some(phone.to_string());
    }
    // Only the recipient's own responsible link counts
    let responsible = responsible.filter(|r| Some(r.id) == recipient.responsible_id)?;
    if !responsible.active {
        return None;
    }
    non_blank(responsible.phone.as_deref()).map(str::to_string)
}

fn non_blank(phone: Option<&str>) -> Option<&str> {
    phone.map(str::trim).filter(|p| !p.is_empty())
}

/// Digits-only phone with the country code prefixed.
///
/// Leading trunk zeros are dropped. Numbers already carrying the country
/// code (longer than a national number) are left as-is.
pub fn normalize_phone(phone: &str, country_code: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }
    let cc: String = country_code.chars().filter(|c| c.is_ascii_digit()).collect();
    // National numbers here are 10-11 digits (area code + subscriber)
    if cc.is_empty() || (digits.starts_with(&cc) && digits.len() > 11) {
        return Some(digits.to_string());
    }
    Some(format!("{cc}{digits}"))
}

/// Customer records indexed for resolution
pub struct ContactBook {
    customers: FxHashMap<CustomerId, Customer>,
}

impl ContactBook {
    pub fn new(customers: impl IntoIterator<Item = Customer>) -> Self {
        Self { customers: customers.into_iter().map(|c| (c.id, c)).collect() }
    }

    pub fn get(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    /// Resolve one parcel against the book
    pub fn resolve(&self, parcel: &Parcel) -> Option<String> {
        let recipient = parcel.customer_id.and_then(|id| self.get(id));
        let responsible = recipient.and_then(|r| r.responsible_id).and_then(|id| self.get(id));
        resolve_contact_phone(parcel, recipient, responsible)
    }

    /// Normalized phones for every reachable parcel
    pub fn reachable(&self, parcels: &[Parcel], country_code: &str) -> FxHashMap<ControlNumber, String> {
        parcels
            .iter()
            .filter_map(|p| {
                let phone = self.resolve(p)?;
                normalize_phone(&phone, country_code).map(|n| (p.control_number, n))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ParcelStatus;
    use chrono::NaiveDate;

    fn parcel(customer: Option<i64>) -> Parcel {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        Parcel {
            control_number: ControlNumber(1),
            recipient_name: "Maria".to_string(),
            object_type: "Encomenda PAC".to_string(),
            tracking_code: None,
            arrival_date: day,
            storage_deadline: day,
            status: ParcelStatus::Awaiting,
            archived: false,
            customer_id: customer.map(CustomerId),
        }
    }

    #[test]
    fn test_unlinked_parcel_unreachable() {
        let recipient = Customer::new(1, "Maria").with_phone("11999990000");
        assert_eq!(resolve_contact_phone(&parcel(None), Some(&recipient), None), None);
    }

    #[test]
    fn test_inactive_recipient_unreachable() {
        let recipient = Customer::new(1, "Maria").with_phone("11999990000").inactive();
        assert_eq!(resolve_contact_phone(&parcel(Some(1)), Some(&recipient), None), None);
    }

    #[test]
    fn test_own_phone_wins_over_responsible() {
        let recipient = Customer::new(1, "Maria").with_phone("11999990000").with_responsible(2);
        let responsible = Customer::new(2, "Jose").with_phone("11888880000");
        assert_eq!(
            resolve_contact_phone(&parcel(Some(1)), Some(&recipient), Some(&responsible)),
            Some("11999990000".to_string())
        );
    }

    #[test]
    fn test_falls_back_to_active_responsible() {
        let recipient = Customer::new(1, "Maria").with_responsible(2);
        let responsible = Customer::new(2, "Jose").with_phone("11888880000");
        assert_eq!(
            resolve_contact_phone(&parcel(Some(1)), Some(&recipient), Some(&responsible)),
            Some("11888880000".to_string())
        );

        let inactive = responsible.clone().inactive();
        assert_eq!(resolve_contact_phone(&parcel(Some(1)), Some(&recipient), Some(&inactive)), None);
    }

    #[test]
    fn test_blank_phone_treated_as_missing() {
        let recipient = Customer::new(1, "Maria").with_phone("   ").with_responsible(2);
        let responsible = Customer::new(2, "Jose").with_phone("11888880000");
        assert_eq!(
            resolve_contact_phone(&parcel(Some(1)), Some(&recipient), Some(&responsible)),
            Some("11888880000".to_string())
        );
    }

    #[test]
    fn test_unrelated_responsible_ignored() {
        let recipient = Customer::new(1, "Maria");
        let stranger = Customer::new(3, "Ana").with_phone("11777770000");
        assert_eq!(resolve_contact_phone(&parcel(Some(1)), Some(&recipient), Some(&stranger)), None);
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(11) 99999-0000", "55"), Some("5511999990000".to_string()));
        assert_eq!(normalize_phone("+55 11 99999-0000", "55"), Some("5511999990000".to_string()));
        assert_eq!(normalize_phone("011 3333-4444", "55"), Some("551133334444".to_string()));
        assert_eq!(normalize_phone("55 3333-4444", "55"), Some("555533334444".to_string()));
        assert_eq!(normalize_phone("--", "55"), None);
    }

    #[test]
    fn test_contact_book_reachable() {
        let book = ContactBook::new([
            Customer::new(1, "Maria").with_phone("11999990000"),
            Customer::new(2, "Jose").with_responsible(3),
            Customer::new(3, "Ana").with_phone("11888880000"),
        ]);
        let mut a = parcel(Some(1));
        a.control_number = ControlNumber(10);
        let mut b = parcel(Some(2));
        b.control_number = ControlNumber(11);
        let c = parcel(None);

        let reachable = book.reachable(&[a, b, c], "55");
        assert_eq!(reachable.len(), 2);
        assert_eq!(reachable[&ControlNumber(10)], "5511999990000");
        assert_eq!(reachable[&ControlNumber(11)], "5511888880000");
    }
}
