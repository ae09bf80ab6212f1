//! Pretix JSON payloads and their conversion to the core external model.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use ticket_sync_core::{ExternalEvent, ExternalItem, ExternalOrder, ExternalPosition};

/// Locale preferred when resolving multilingual strings.
pub const PREFERRED_LOCALE: &str = "en";

/// A string that is either plain or keyed by locale.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LocalizedString {
    /// Non-localized value
    Plain(String),
    /// Locale → value
    Localized(BTreeMap<String, String>),
}

impl LocalizedString {
    /// Resolve to a single value: [`PREFERRED_LOCALE`] if present, else the
    /// alphabetically first locale, else the empty string.
    #[must_use]
    pub fn resolve(&self) -> String {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Localized(values) => values
                .get(PREFERRED_LOCALE)
                .or_else(|| values.values().next())
                .cloned()
                .unwrap_or_default(),
        }
    }
}

impl Default for LocalizedString {
    fn default() -> Self {
        Self::Localized(BTreeMap::new())
    }
}

/// Numeric or string identifier. Pretix uses integers; ids are strings locally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    /// Integer id
    Number(u64),
    /// String id
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One page of a paginated list endpoint.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    /// Entries on this page
    pub results: Vec<T>,
    /// Absolute URL of the next page
    #[serde(default)]
    pub next: Option<String>,
}

/// `GET /events/{slug}/`
#[derive(Debug, Deserialize)]
pub struct EventPayload {
    /// Display name
    #[serde(default)]
    pub name: LocalizedString,
}

impl From<EventPayload> for ExternalEvent {
    fn from(payload: EventPayload) -> Self {
        Self {
            name: payload.name.resolve(),
        }
    }
}

/// Entry of `GET /events/{slug}/items/`
#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    /// Item id
    pub id: WireId,
    /// Display name
    #[serde(default)]
    pub name: LocalizedString,
}

impl From<ItemPayload> for ExternalItem {
    fn from(payload: ItemPayload) -> Self {
        Self {
            id: payload.id.to_string(),
            name: payload.name.resolve(),
        }
    }
}

/// Invoice address of an order; only the name is used.
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceAddressPayload {
    /// Purchaser name
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `GET /events/{slug}/orders/`
#[derive(Debug, Deserialize)]
pub struct OrderPayload {
    /// Order code
    pub code: String,
    /// Status code (`n`, `p`, `e`, `c`)
    pub status: String,
    /// Purchaser email
    #[serde(default)]
    pub email: Option<String>,
    /// Purchaser address
    #[serde(default)]
    pub invoice_address: Option<InvoiceAddressPayload>,
    /// Order positions
    #[serde(default)]
    pub positions: Vec<PositionPayload>,
}

impl From<OrderPayload> for ExternalOrder {
    fn from(payload: OrderPayload) -> Self {
        Self {
            code: payload.code,
            status: payload.status,
            email: payload.email.unwrap_or_default(),
            purchaser_name: payload.invoice_address.and_then(|address| address.name),
            positions: payload.positions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Position inside an order.
#[derive(Debug, Deserialize)]
pub struct PositionPayload {
    /// Position id
    pub id: WireId,
    /// Item id
    pub item: WireId,
    /// Attendee name
    #[serde(default)]
    pub attendee_name: Option<String>,
    /// Attendee email
    #[serde(default)]
    pub attendee_email: Option<String>,
}

impl From<PositionPayload> for ExternalPosition {
    fn from(payload: PositionPayload) -> Self {
        Self {
            id: payload.id.to_string(),
            item_id: payload.item.to_string(),
            attendee_name: payload.attendee_name,
            attendee_email: payload.attendee_email,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_localized_string_prefers_english() {
        let name: LocalizedString = serde_json::from_value(json!({"de": "Konferenz", "en": "Conference"})).unwrap();
        assert_eq!(name.resolve(), "Conference");
    }

    #[test]
    fn test_localized_string_falls_back_to_first_locale() {
        let name: LocalizedString = serde_json::from_value(json!({"fr": "Conférence", "de": "Konferenz"})).unwrap();
        assert_eq!(name.resolve(), "Konferenz");

        let empty: LocalizedString = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.resolve(), "");

        let plain: LocalizedString = serde_json::from_value(json!("Plain")).unwrap();
        assert_eq!(plain.resolve(), "Plain");
    }

    #[test]
    fn test_order_conversion() {
        let payload: OrderPayload = serde_json::from_value(json!({
            "code": "ABC12",
            "status": "p",
            "email": "buyer@example.com",
            "invoice_address": {"name": "Bea Buyer", "city": "Berlin"},
            "positions": [
                {"id": 17, "item": 3, "attendee_name": null, "attendee_email": "guest@example.com", "price": "10.00"}
            ],
            "total": "10.00"
        }))
        .unwrap();

        let order = ExternalOrder::from(payload);

        assert!(order.is_paid());
        assert_eq!(order.purchaser_name.as_deref(), Some("Bea Buyer"));
        assert_eq!(
            order.positions,
            vec![ExternalPosition {
                id: "17".to_string(),
                item_id: "3".to_string(),
                attendee_name: None,
                attendee_email: Some("guest@example.com".to_string()),
            }]
        );
    }

    #[test]
    fn test_order_without_email_or_address() {
        let payload: OrderPayload =
            serde_json::from_value(json!({"code": "X", "status": "n", "email": null, "positions": []})).unwrap();
        let order = ExternalOrder::from(payload);
        assert_eq!(order.email, "");
        assert_eq!(order.purchaser_name, None);
    }
}
