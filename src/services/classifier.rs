//! Classification engine: pasted tabular text to classified parcel rows
//!
//! Classification runs in two phases. `classify` parses the pasted text and
//! matches every tracking code against the prefix rules, producing a
//! `ClassificationSession`. If any row went unmatched, the session pauses
//! for the operator to pick types; `Classifier::confirm` then derives and
//! persists one rule per new two-character prefix and releases the final
//! row set, ordered by the original order-number column.
//!
//! Nothing is written to the store before confirmation, so a session can be
//! dropped at any point without side effects.

use crate::domain::error::{Error, Result, RowParseError};
use crate::domain::types::{Address, ClassificationRule, ClassifiedRow, ObjectType, Parcel, RuleId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::store::RecordStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Label used when no object types are configured at all
pub const FALLBACK_OBJECT_TYPE: &str = "Encomenda PAC";

/// Length of the prefix derived from a manually classified tracking code
pub const DERIVED_PREFIX_LEN: usize = 2;

const MIN_COLUMNS: usize = 10;
const COL_TRACKING_CODE: usize = 1;
const COL_ORDER_NUMBER: usize = 3;
const COL_STREET: usize = 6;
const COL_NUMBER: usize = 7;
const COL_COMPLEMENT: usize = 8;
const COL_RECIPIENT: usize = 9;

/// Classification inputs that come from configuration
#[derive(Debug, Clone)]
pub struct ClassificationSettings {
    pub object_types: Vec<ObjectType>,
    pub default_object_type: String,
    pub fallback_storage_days: u32,
    pub letter_storage_days: u32,
}

impl ClassificationSettings {
    pub fn new(object_types: Vec<ObjectType>) -> Self {
        Self {
            object_types,
            default_object_type: FALLBACK_OBJECT_TYPE.to_string(),
            fallback_storage_days: 7,
            letter_storage_days: 20,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            object_types: config.object_types().to_vec(),
            default_object_type: config.default_object_type().to_string(),
            fallback_storage_days: config.fallback_storage_days(),
            letter_storage_days: config.letter_storage_days(),
        }
    }

    /// Type pre-selected for unmatched rows: the preferred default if configured,
    /// else the first configured type, else the hard-coded label
    pub fn default_type(&self) -> String {
        if self.object_types.iter().any(|t| t.name == self.default_object_type) {
            return self.default_object_type.clone();
        }
        self.object_types
            .first()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| FALLBACK_OBJECT_TYPE.to_string())
    }

    /// Storage days for a derived rule of the given type.
    ///
    /// A configured value on the object type wins. Otherwise letter-like
    /// names ("Carta", "Cartão") get the letter period and everything else
    /// the fallback period.
    pub fn storage_days_for(&self, object_type: &str) -> u32 {
        if let Some(days) =
            self.object_types.iter().find(|t| t.name == object_type).and_then(|t| t.storage_days)
        {
            return days;
        }
        if object_type.contains("Carta") || object_type.contains("Cartão") {
            self.letter_storage_days
        } else {
            self.fallback_storage_days
        }
    }
}

/// A parsed row still carrying its order number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    pub order_number: i64,
    pub row: ClassifiedRow,
}

/// Parse one tab-separated line
pub fn parse_row(line: &str) -> std::result::Result<SessionRow, RowParseError> {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < MIN_COLUMNS {
        return Err(RowParseError::TooFewColumns { expected: MIN_COLUMNS, found: cols.len() });
    }

    let recipient_name = cols[COL_RECIPIENT].trim();
    if recipient_name.is_empty() {
        return Err(RowParseError::EmptyRecipient);
    }

    let order_raw = cols[COL_ORDER_NUMBER].trim();
    let order_number = order_raw
        .parse::<i64>()
        .map_err(|_| RowParseError::BadOrderNumber(order_raw.to_string()))?;

    let tracking_code = cols[COL_TRACKING_CODE].trim().to_uppercase();

    Ok(SessionRow {
        order_number,
        row: ClassifiedRow {
            tracking_code: (!tracking_code.is_empty()).then_some(tracking_code),
            recipient_name: recipient_name.to_string(),
            object_type: String::new(),
            address: Address {
                street: cols[COL_STREET].trim().to_string(),
                number: cols[COL_NUMBER].trim().to_string(),
                complement: cols[COL_COMPLEMENT].trim().to_string(),
            },
            storage_days: None,
        },
    })
}

/// Longest matching prefix wins; on equal length the later rule supersedes
pub fn find_rule<'a>(rules: &'a [ClassificationRule], tracking_code: &str) -> Option<&'a ClassificationRule> {
    let mut best: Option<&ClassificationRule> = None;
    for rule in rules.iter().filter(|r| r.matches(tracking_code)) {
        if best.map_or(true, |b| rule.prefix.len() >= b.prefix.len()) {
            best = Some(rule);
        }
    }
    best
}

/// Classify pasted text against the given rules
pub fn classify(
    raw_text: &str,
    rules: &[ClassificationRule],
    settings: &ClassificationSettings,
) -> Result<ClassificationSession> {
    if raw_text.trim().is_empty() {
        return Err(Error::EmptyInput);
    }

    let default_type = settings.default_type();
    let mut session = ClassificationSession::default();

    for (line_no, line) in raw_text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut parsed = match parse_row(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(line = %(line_no + 1), reason = %e, "row_dropped");
                session.dropped += 1;
                continue;
            }
        };

        let matched = parsed.row.tracking_code.as_deref().and_then(|code| find_rule(rules, code));
        match matched {
            Some(rule) => {
                parsed.row.object_type = rule.object_type.clone();
                parsed.row.storage_days = Some(rule.storage_days);
                session.classified.push(parsed);
            }
            None => {
                parsed.row.object_type = default_type.clone();
                session.unclassified.push(parsed);
            }
        }
    }

    if session.classified.is_empty() && session.unclassified.is_empty() {
        return Err(Error::NoValidRows);
    }
    Ok(session)
}

/// Transient state between classification and confirmation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationSession {
    classified: Vec<SessionRow>,
    unclassified: Vec<SessionRow>,
    dropped: usize,
}

impl ClassificationSession {
    pub fn classified(&self) -> &[SessionRow] {
        &self.classified
    }

    pub fn unclassified(&self) -> &[SessionRow] {
        &self.unclassified
    }

    /// Lines discarded by the row parser
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_pending(&self) -> bool {
        !self.unclassified.is_empty()
    }

    /// Choose the type of one pending row
    pub fn assign(&mut self, index: usize, object_type: &str) -> Result<()> {
        let len = self.unclassified.len();
        let row = self.unclassified.get_mut(index).ok_or(Error::IndexOutOfRange { index, len })?;
        row.row.object_type = object_type.to_string();
        Ok(())
    }

    /// Choose the type for every pending row whose code starts with `prefix`
    pub fn assign_prefix(&mut self, prefix: &str, object_type: &str) -> usize {
        let prefix = prefix.trim().to_uppercase();
        if prefix.is_empty() {
            return 0;
        }
        let mut count = 0;
        for pending in &mut self.unclassified {
            if pending.row.tracking_code.as_deref().is_some_and(|c| c.starts_with(&prefix)) {
                pending.row.object_type = object_type.to_string();
                count += 1;
            }
        }
        count
    }

    /// Final rows when nothing needs review
    pub fn ready_rows(&self) -> Result<Vec<ClassifiedRow>> {
        if self.is_pending() {
            return Err(Error::UnclassifiedItemsPending { count: self.unclassified.len() });
        }
        Ok(ordered_rows(self.classified.clone()))
    }
}

fn ordered_rows(mut rows: Vec<SessionRow>) -> Vec<ClassifiedRow> {
    rows.sort_by_key(|r| r.order_number);
    rows.into_iter().map(|r| r.row).collect()
}

/// A derived rule that replaced an existing prefix with different values
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleConflict {
    pub prefix: String,
    pub previous: ClassificationRule,
    pub incoming: ClassificationRule,
}

/// Rules to write and rows to release for a confirmed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPlan {
    pub new_rules: Vec<ClassificationRule>,
    pub final_rows: Vec<ClassifiedRow>,
    pub conflicts: Vec<RuleConflict>,
}

/// Derive rules for the manually classified rows. Pure; no store access.
pub fn plan_confirmation(
    session: ClassificationSession,
    settings: &ClassificationSettings,
    existing: &[ClassificationRule],
) -> ConfirmationPlan {
    let mut new_rules: Vec<ClassificationRule> = Vec::new();
    let mut rows = session.classified;

    for mut pending in session.unclassified {
        let storage_days = settings.storage_days_for(&pending.row.object_type);
        pending.row.storage_days = Some(storage_days);

        let prefix: Option<String> = pending
            .row
            .tracking_code
            .as_deref()
            .filter(|c| c.chars().count() >= DERIVED_PREFIX_LEN)
            .map(|c| c.chars().take(DERIVED_PREFIX_LEN).collect());

        if let Some(prefix) = prefix {
            let rule = ClassificationRule::new(&prefix, &pending.row.object_type, storage_days);
            match new_rules.iter_mut().find(|r| r.prefix == rule.prefix) {
                Some(slot) => *slot = rule,
                None => new_rules.push(rule),
            }
        }
        rows.push(pending);
    }

    let conflicts = new_rules
        .iter()
        .filter_map(|incoming| {
            existing
                .iter()
                .rev()
                .find(|r| r.prefix == incoming.prefix)
                .filter(|previous| *previous != incoming)
                .map(|previous| RuleConflict {
                    prefix: incoming.prefix.clone(),
                    previous: previous.clone(),
                    incoming: incoming.clone(),
                })
        })
        .collect();

    ConfirmationPlan { new_rules, final_rows: ordered_rows(rows), conflicts }
}

/// Outcome of a successful confirmation
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub new_rules: Vec<ClassificationRule>,
    pub final_rows: Vec<ClassifiedRow>,
    pub conflicts: Vec<RuleConflict>,
}

/// Result of a one-shot import
#[derive(Debug)]
pub enum ImportOutcome {
    Created(Vec<Parcel>),
    /// Operator must review the session and confirm
    Pending(ClassificationSession),
}

/// Store-backed classification workflow
pub struct Classifier {
    store: Arc<dyn RecordStore>,
    settings: ClassificationSettings,
    metrics: Arc<Metrics>,
}

impl Classifier {
    pub fn new(store: Arc<dyn RecordStore>, settings: ClassificationSettings, metrics: Arc<Metrics>) -> Self {
        Self { store, settings, metrics }
    }

    /// Fetch current rules and classify pasted text
    pub async fn begin(&self, raw_text: &str) -> Result<ClassificationSession> {
        let rules = self.store.lookup_rules_by_prefix().await?;
        let session = classify(raw_text, &rules, &self.settings)?;

        info!(
            classified = %session.classified.len(),
            unclassified = %session.unclassified.len(),
            dropped = %session.dropped,
            rules = %rules.len(),
            "classification_completed"
        );
        self.metrics.record_classification(
            session.classified.len(),
            session.unclassified.len(),
            session.dropped,
        );
        Ok(session)
    }

    /// Persist derived rules and release the final rows.
    ///
    /// A failed rule write undoes the rules already written by this call
    /// and returns the store error; no rows are released.
    pub async fn confirm(&self, session: ClassificationSession) -> Result<Confirmation> {
        let existing = self.store.lookup_rules_by_prefix().await?;
        let plan = plan_confirmation(session, &self.settings, &existing);

        for conflict in &plan.conflicts {
            warn!(
                prefix = %conflict.prefix,
                previous_type = %conflict.previous.object_type,
                previous_days = %conflict.previous.storage_days,
                incoming_type = %conflict.incoming.object_type,
                incoming_days = %conflict.incoming.storage_days,
                "rule_conflict_overwritten"
            );
        }

        let mut written: Vec<(RuleId, Option<ClassificationRule>)> = Vec::with_capacity(plan.new_rules.len());
        for rule in &plan.new_rules {
            match self.store.persist_rule(rule).await {
                Ok(id) => {
                    let previous = existing.iter().rev().find(|r| r.prefix == rule.prefix).cloned();
                    debug!(prefix = %rule.prefix, rule_id = %id, "rule_persisted");
                    written.push((id, previous));
                }
                Err(e) => {
                    error!(prefix = %rule.prefix, error = %e, written = %written.len(), "rule_persist_failed");
                    self.rollback(written).await;
                    self.metrics.record_rollback();
                    return Err(e.into());
                }
            }
        }

        self.metrics.record_rules_persisted(plan.new_rules.len());
        info!(
            new_rules = %plan.new_rules.len(),
            conflicts = %plan.conflicts.len(),
            rows = %plan.final_rows.len(),
            "classification_confirmed"
        );

        Ok(Confirmation { new_rules: plan.new_rules, final_rows: plan.final_rows, conflicts: plan.conflicts })
    }

    async fn rollback(&self, written: Vec<(RuleId, Option<ClassificationRule>)>) {
        for (id, previous) in written.into_iter().rev() {
            let result = match previous {
                Some(rule) => self.store.persist_rule(&rule).await.map(|_| ()),
                None => self.store.delete_rule(&id).await,
            };
            if let Err(e) = result {
                error!(rule_id = %id, error = %e, "rule_rollback_failed");
            }
        }
    }

    /// Create one parcel per row, in row order
    pub async fn create_parcels(&self, rows: &[ClassifiedRow], arrival_date: NaiveDate) -> Result<Vec<Parcel>> {
        let mut parcels = Vec::with_capacity(rows.len());
        for row in rows {
            let parcel = self.store.create_parcel(row, arrival_date).await?;
            debug!(
                control_number = %parcel.control_number,
                object_type = %parcel.object_type,
                deadline = %parcel.storage_deadline,
                "parcel_created"
            );
            parcels.push(parcel);
        }
        self.metrics.record_parcels_created(parcels.len());
        Ok(parcels)
    }

    /// Classify and, when nothing needs review, create parcels immediately
    pub async fn import(&self, raw_text: &str, arrival_date: NaiveDate) -> Result<ImportOutcome> {
        let session = self.begin(raw_text).await?;
        match session.ready_rows() {
            Ok(rows) => Ok(ImportOutcome::Created(self.create_parcels(&rows, arrival_date).await?)),
            Err(Error::UnclassifiedItemsPending { count }) => {
                info!(pending = %count, "classification_awaiting_review");
                Ok(ImportOutcome::Pending(session))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory_store::MemoryStore;

    fn line(code: &str, order: &str, name: &str) -> String {
        format!("1\t{code}\tx\t{order}\tx\tx\tRua das Flores\t10\tApto 2\t{name}")
    }

    fn settings() -> ClassificationSettings {
        ClassificationSettings::new(vec![
            ObjectType::new("Carta Registrada"),
            ObjectType::new("Encomenda PAC"),
            ObjectType::new("Cartão Postal"),
            ObjectType::new("Encomenda SEDEX").with_storage_days(10),
        ])
    }

    fn pac_rule() -> ClassificationRule {
        ClassificationRule::new("AC", "Encomenda PAC", 7)
    }

    #[test]
    fn test_parse_row_columns() {
        let row = parse_row(&line(" ac1234567br ", "42", " Maria ")).unwrap();
        assert_eq!(row.order_number, 42);
        assert_eq!(row.row.tracking_code.as_deref(), Some("AC1234567BR"));
        assert_eq!(row.row.recipient_name, "Maria");
        assert_eq!(row.row.address.street, "Rua das Flores");
        assert_eq!(row.row.address.number, "10");
        assert_eq!(row.row.address.complement, "Apto 2");
    }

    #[test]
    fn test_parse_row_rejections() {
        assert!(matches!(parse_row("a\tb\tc"), Err(RowParseError::TooFewColumns { found: 3, .. })));
        assert_eq!(parse_row(&line("AC1", "1", "  ")), Err(RowParseError::EmptyRecipient));
        assert!(matches!(parse_row(&line("AC1", "n/a", "Maria")), Err(RowParseError::BadOrderNumber(_))));
    }

    #[test]
    fn test_known_prefix_is_classified() {
        let text = line("AC1234567BR", "1", "Maria");
        let session = classify(&text, &[pac_rule()], &settings()).unwrap();
        assert_eq!(session.classified().len(), 1);
        assert!(session.unclassified().is_empty());
        assert_eq!(session.classified()[0].row.object_type, "Encomenda PAC");
        assert_eq!(session.classified()[0].row.storage_days, Some(7));
    }

    #[test]
    fn test_lowercase_code_still_matches() {
        let text = line("ac1234567br", "1", "Maria");
        let session = classify(&text, &[pac_rule()], &settings()).unwrap();
        assert_eq!(session.classified().len(), 1);
    }

    #[test]
    fn test_unknown_prefix_gets_default_type() {
        let text = line("ZZ0000000BR", "1", "Joao");
        let session = classify(&text, &[pac_rule()], &settings()).unwrap();
        assert!(session.is_pending());
        assert_eq!(session.unclassified()[0].row.object_type, "Encomenda PAC");
        assert!(matches!(session.ready_rows(), Err(Error::UnclassifiedItemsPending { count: 1 })));
    }

    #[test]
    fn test_default_type_selection() {
        assert_eq!(settings().default_type(), "Encomenda PAC");
        let first_only = ClassificationSettings::new(vec![ObjectType::new("Carta Registrada")]);
        assert_eq!(first_only.default_type(), "Carta Registrada");
        assert_eq!(ClassificationSettings::new(vec![]).default_type(), FALLBACK_OBJECT_TYPE);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let rules = vec![
            ClassificationRule::new("A", "Carta Registrada", 20),
            ClassificationRule::new("AC", "Encomenda PAC", 7),
            ClassificationRule::new("ACX", "Encomenda SEDEX", 10),
        ];
        assert_eq!(find_rule(&rules, "AC123").unwrap().object_type, "Encomenda PAC");
        assert_eq!(find_rule(&rules, "ACX123").unwrap().object_type, "Encomenda SEDEX");
        assert_eq!(find_rule(&rules, "AB123").unwrap().object_type, "Carta Registrada");
        assert!(find_rule(&rules, "ZZ123").is_none());
    }

    #[test]
    fn test_later_rule_supersedes_same_prefix() {
        let rules = vec![
            ClassificationRule::new("AC", "Carta Registrada", 20),
            ClassificationRule::new("AC", "Encomenda PAC", 7),
        ];
        assert_eq!(find_rule(&rules, "AC123").unwrap().object_type, "Encomenda PAC");
    }

    #[test]
    fn test_matching_code_never_unclassified() {
        let rules = vec![
            ClassificationRule::new("AC", "Encomenda PAC", 7),
            ClassificationRule::new("JT", "Carta Registrada", 20),
        ];
        let codes = ["AC1BR", "ac2br", "JT3BR", "jtX", "AC"];
        let text: Vec<String> =
            codes.iter().enumerate().map(|(i, c)| line(c, &i.to_string(), "Ana")).collect();
        let session = classify(&text.join("\n"), &rules, &settings()).unwrap();
        assert_eq!(session.classified().len(), codes.len());
        assert!(session.unclassified().is_empty());
    }

    #[test]
    fn test_bad_lines_dropped() {
        let text = [
            line("AC1BR", "2", "Maria"),
            "garbage line".to_string(),
            line("AC2BR", "x", "Joao"),
            line("AC3BR", "1", ""),
            String::new(),
        ]
        .join("\n");
        let session = classify(&text, &[pac_rule()], &settings()).unwrap();
        assert_eq!(session.classified().len(), 1);
        assert_eq!(session.dropped(), 3);
    }

    #[test]
    fn test_empty_and_invalid_input() {
        assert!(matches!(classify("   \n\t ", &[pac_rule()], &settings()), Err(Error::EmptyInput)));
        assert!(matches!(classify("a\tb\nc", &[pac_rule()], &settings()), Err(Error::NoValidRows)));
    }

    #[test]
    fn test_assign_and_assign_prefix() {
        let text = [line("ZZ1BR", "1", "Ana"), line("ZZ2BR", "2", "Bia"), line("QQ3BR", "3", "Caio")]
            .join("\n");
        let mut session = classify(&text, &[], &settings()).unwrap();
        assert_eq!(session.assign_prefix("zz", "Cartão Postal"), 2);
        session.assign(2, "Encomenda SEDEX").unwrap();
        assert!(matches!(session.assign(9, "x"), Err(Error::IndexOutOfRange { index: 9, len: 3 })));

        let types: Vec<&str> = session.unclassified().iter().map(|r| r.row.object_type.as_str()).collect();
        assert_eq!(types, vec!["Cartão Postal", "Cartão Postal", "Encomenda SEDEX"]);
    }

    #[test]
    fn test_storage_days_heuristic() {
        let s = settings();
        assert_eq!(s.storage_days_for("Cartão Postal"), 20);
        assert_eq!(s.storage_days_for("Carta Registrada"), 20);
        assert_eq!(s.storage_days_for("Encomenda PAC"), 7);
        assert_eq!(s.storage_days_for("Encomenda SEDEX"), 10);
    }

    #[test]
    fn test_plan_derives_two_char_prefix_rule() {
        let text = line("ZZ0000000BR", "1", "Joao");
        let mut session = classify(&text, &[], &settings()).unwrap();
        session.assign(0, "Cartão Postal").unwrap();

        let plan = plan_confirmation(session, &settings(), &[]);
        assert_eq!(plan.new_rules, vec![ClassificationRule::new("ZZ", "Cartão Postal", 20)]);
        assert_eq!(plan.final_rows.len(), 1);
        assert_eq!(plan.final_rows[0].storage_days, Some(20));
        assert!(plan.conflicts.is_empty());
    }

    #[test]
    fn test_plan_orders_by_order_number_and_dedupes() {
        let text = [
            line("AC1BR", "3", "Caio"),
            line("ZZ1BR", "1", "Ana"),
            line("ZZ2BR", "2", "Bia"),
            line("X", "0", "Duda"),
        ]
        .join("\n");
        let mut session = classify(&text, &[pac_rule()], &settings()).unwrap();
        session.assign(0, "Carta Registrada").unwrap();
        session.assign(1, "Encomenda SEDEX").unwrap();

        let plan = plan_confirmation(session, &settings(), &[]);
        assert_eq!(plan.new_rules, vec![ClassificationRule::new("ZZ", "Encomenda SEDEX", 10)]);
        let names: Vec<&str> = plan.final_rows.iter().map(|r| r.recipient_name.as_str()).collect();
        assert_eq!(names, vec!["Duda", "Ana", "Bia", "Caio"]);
        assert_eq!(plan.final_rows[1].object_type, "Carta Registrada");
    }

    #[test]
    fn test_plan_reports_conflicts() {
        let text = line("ZZ1BR", "1", "Ana");
        let mut session = classify(&text, &[], &settings()).unwrap();
        session.assign(0, "Encomenda PAC").unwrap();
        let existing = vec![ClassificationRule::new("ZZ", "Carta Registrada", 20)];

        let plan = plan_confirmation(session, &settings(), &existing);
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].previous.object_type, "Carta Registrada");
        assert_eq!(plan.conflicts[0].incoming.object_type, "Encomenda PAC");
    }

    fn classifier(store: Arc<MemoryStore>) -> Classifier {
        Classifier::new(store, settings(), Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn test_confirm_persists_rules() {
        let store = Arc::new(MemoryStore::new(vec![], 7).with_rules([pac_rule()]));
        let classifier = classifier(store.clone());

        let text = [line("AC1BR", "1", "Ana"), line("ZZ0000000BR", "2", "Joao")].join("\n");
        let mut session = classifier.begin(&text).await.unwrap();
        session.assign(0, "Cartão Postal").unwrap();

        let confirmation = classifier.confirm(session).await.unwrap();
        assert_eq!(confirmation.final_rows.len(), 2);
        assert_eq!(store.rule_count(), 2);

        let rules = store.lookup_rules_by_prefix().await.unwrap();
        assert!(rules.contains(&ClassificationRule::new("ZZ", "Cartão Postal", 20)));
    }

    #[tokio::test]
    async fn test_confirm_rolls_back_on_failure() {
        let store = Arc::new(
            MemoryStore::new(vec![], 7)
                .with_rules([ClassificationRule::new("AA", "Carta Registrada", 20)])
                .with_reserved_prefix("QQ"),
        );
        let classifier = classifier(store.clone());

        let text =
            [line("AA1BR", "1", "Ana"), line("BB1BR", "2", "Bia"), line("QQ1BR", "3", "Caio")].join("\n");
        let mut session = classify(&text, &[], &settings()).unwrap();
        session.assign(0, "Encomenda PAC").unwrap();

        let err = classifier.confirm(session).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        let rules = store.lookup_rules_by_prefix().await.unwrap();
        assert_eq!(rules, vec![ClassificationRule::new("AA", "Carta Registrada", 20)]);
    }

    #[tokio::test]
    async fn test_confirm_twice_does_not_duplicate() {
        let store = Arc::new(MemoryStore::new(vec![], 7));
        let classifier = classifier(store.clone());
        let text = line("ZZ1BR", "1", "Ana");

        for _ in 0..2 {
            let session = classify(&text, &[], &settings()).unwrap();
            classifier.confirm(session).await.unwrap();
        }
        assert_eq!(store.rule_count(), 1);
    }

    #[tokio::test]
    async fn test_import_creates_when_fully_classified() {
        let store = Arc::new(MemoryStore::new(vec![], 7).with_rules([pac_rule()]));
        let classifier = classifier(store.clone());
        let arrival = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();

        let outcome = classifier.import(&line("AC1BR", "1", "Ana"), arrival).await.unwrap();
        let ImportOutcome::Created(parcels) = outcome else { panic!("expected parcels") };
        assert_eq!(parcels.len(), 1);
        assert_eq!(parcels[0].storage_deadline, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());
    }

    #[tokio::test]
    async fn test_import_pauses_without_writes() {
        let store = Arc::new(MemoryStore::new(vec![], 7).with_rules([pac_rule()]));
        let classifier = classifier(store.clone());
        let arrival = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();

        let outcome = classifier.import(&line("ZZ1BR", "1", "Ana"), arrival).await.unwrap();
        assert!(matches!(outcome, ImportOutcome::Pending(_)));
        assert!(store.list_parcels().await.unwrap().is_empty());
        assert_eq!(store.rule_count(), 1);
    }
}
