//! Notification composition: fragments, per-parcel substitution, deep links
//!
//! Placeholders have the form `{{NAME}}`. Substitution is a replace-all of
//! each known token; unknown tokens pass through verbatim.

use crate::domain::error::{Error, Result};
use crate::domain::types::{ControlNumber, MessageTemplate, Parcel};
use crate::infra::config::Config;
use chrono::{Days, NaiveDate};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;
use url::Url;

pub const TOKEN_RECIPIENT: &str = "{{NOME_CLIENTE}}";
pub const TOKEN_OBJECT_TYPE: &str = "{{TIPO_OBJETO}}";
pub const TOKEN_TRACKING_CODE: &str = "{{CODIGO_RASTREIO}}";
pub const TOKEN_CONTROL_NUMBER: &str = "{{NUMERO_CONTROLE}}";
pub const TOKEN_DAYS_REMAINING: &str = "{{DIAS_RESTANTES}}";
pub const TOKEN_DEADLINE: &str = "{{DATA_PRAZO}}";
pub const TOKEN_FACILITY_NAME: &str = "{{NOME_DA_AGENCIA}}";
pub const TOKEN_FACILITY_ADDRESS: &str = "{{ENDERECO_AGENCIA}}";

const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Facility-wide values injected into every message
#[derive(Debug, Clone)]
pub struct CompositionContext {
    pub facility_name: String,
    pub facility_address: String,
    pub country_code: String,
    pub date_format: String,
    pub not_available: String,
    pub link_base: String,
}

impl Default for CompositionContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CompositionContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            facility_name: config.facility_name().unwrap_or("nossa agência").to_string(),
            facility_address: config.facility_address().unwrap_or("nosso endereço").to_string(),
            country_code: config.country_code().to_string(),
            date_format: config.date_format().to_string(),
            not_available: config.not_available().to_string(),
            link_base: config.link_base().to_string(),
        }
    }
}

/// Concatenate fragment bodies in order, separated by a blank line
pub fn compose(fragments: &[MessageTemplate]) -> String {
    fragments.iter().map(|f| f.body.as_str()).collect::<Vec<_>>().join(FRAGMENT_SEPARATOR)
}

/// Move the fragment at `from` to `to`, preserving everyone else's order
pub fn move_fragment<T>(fragments: &mut Vec<T>, from: usize, to: usize) -> Result<()> {
    let len = fragments.len();
    if from >= len {
        return Err(Error::IndexOutOfRange { index: from, len });
    }
    if to >= len {
        return Err(Error::IndexOutOfRange { index: to, len });
    }
    let fragment = fragments.remove(from);
    fragments.insert(to, fragment);
    Ok(())
}

/// Pick templates by name, in the order given
pub fn select_fragments(available: &[MessageTemplate], names: &[String]) -> Result<Vec<MessageTemplate>> {
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|t| &t.name == name)
                .cloned()
                .ok_or_else(|| Error::UnknownTemplate(name.clone()))
        })
        .collect()
}

/// Deadline as shown to recipients: the stored date is the last full day, so show the next one
pub fn display_deadline(parcel: &Parcel, date_format: &str) -> String {
    parcel
        .storage_deadline
        .checked_add_days(Days::new(1))
        .unwrap_or(parcel.storage_deadline)
        .format(date_format)
        .to_string()
}

/// Fill every known placeholder for one parcel.
///
/// The template is scanned once; inserted values are never rescanned, so a
/// value that itself looks like a placeholder is emitted verbatim.
pub fn substitute(template: &str, parcel: &Parcel, ctx: &CompositionContext, today: NaiveDate) -> String {
    let tracking = parcel.tracking_code.as_deref().filter(|c| !c.is_empty()).unwrap_or(&ctx.not_available);
    let value_for = |token: &str| -> Option<String> {
        Some(match token {
            TOKEN_RECIPIENT => parcel.recipient_name.clone(),
            TOKEN_OBJECT_TYPE => parcel.object_type.clone(),
            TOKEN_TRACKING_CODE => tracking.to_string(),
            TOKEN_CONTROL_NUMBER => parcel.control_number.to_string(),
            TOKEN_DAYS_REMAINING => parcel.days_remaining(today).to_string(),
            TOKEN_DEADLINE => display_deadline(parcel, &ctx.date_format),
            TOKEN_FACILITY_NAME => ctx.facility_name.clone(),
            TOKEN_FACILITY_ADDRESS => ctx.facility_address.clone(),
            _ => return None,
        })
    };

    let mut message = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        message.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let Some(end) = candidate.find("}}") else {
            rest = candidate;
            break;
        };
        let token = &candidate[..end + 2];
        match value_for(token) {
            Some(value) => {
                message.push_str(&value);
                rest = &candidate[end + 2..];
            }
            None => {
                // Unknown token: keep the braces and resume right after them
                message.push_str("{{");
                rest = &candidate[2..];
            }
        }
    }
    message.push_str(rest);
    message
}

/// Outbound deep link for a normalized phone and message text
pub fn build_link(link_base: &str, phone: &str, message: &str) -> Result<String> {
    let base = format!("{}/{}", link_base.trim_end_matches('/'), phone);
    let mut url = Url::parse(&base).map_err(|e| Error::InvalidLink(e.to_string()))?;
    url.query_pairs_mut().append_pair("text", message);
    Ok(url.into())
}

/// One addressed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub control_number: ControlNumber,
    pub recipient_name: String,
    pub phone: String,
    pub message: String,
    pub link: String,
}

/// Substitute and address a message for a single parcel
pub fn compose_for(
    parcel: &Parcel,
    phone: &str,
    composed_template: &str,
    ctx: &CompositionContext,
    today: NaiveDate,
) -> Result<OutboundMessage> {
    let message = substitute(composed_template, parcel, ctx, today);
    let link = build_link(&ctx.link_base, phone, &message)?;
    Ok(OutboundMessage {
        control_number: parcel.control_number,
        recipient_name: parcel.recipient_name.clone(),
        phone: phone.to_string(),
        message,
        link,
    })
}

/// Batch of outbound messages for many parcels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub generated_on: NaiveDate,
    pub entries: Vec<OutboundMessage>,
    /// Parcels left out for lack of a resolved phone
    pub skipped: Vec<ControlNumber>,
}

/// Build one entry per reachable parcel; parcels without a phone are skipped
///
/// `phones` maps control numbers to normalized phones. Fails only when no
/// parcel is reachable.
pub fn generate_batch(
    parcels: &[Parcel],
    phones: &FxHashMap<ControlNumber, String>,
    composed_template: &str,
    ctx: &CompositionContext,
    today: NaiveDate,
) -> Result<Artifact> {
    let mut entries = Vec::with_capacity(parcels.len());
    let mut skipped = Vec::new();

    for parcel in parcels {
        match phones.get(&parcel.control_number) {
            Some(phone) => entries.push(compose_for(parcel, phone, composed_template, ctx, today)?),
            None => {
                debug!(control_number = %parcel.control_number, "notification_skipped_no_phone");
                skipped.push(parcel.control_number);
            }
        }
    }

    if entries.is_empty() {
        return Err(Error::NoReachableRecipients);
    }
    Ok(Artifact { generated_on: today, entries, skipped })
}
