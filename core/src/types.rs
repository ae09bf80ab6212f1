//! Configuration, local row and external wire types.
//!
//! Three groups of types live here:
//!
//! - **Configuration**: [`OrganizerConfig`] and [`EventConfig`], loaded once at startup
//! - **Local rows**: [`EventInfo`], [`ItemInfo`] and [`TicketRecord`], owned by the reconciler
//! - **External model**: [`ExternalEvent`], [`ExternalItem`], [`ExternalOrder`] and
//!   [`ExternalPosition`], as returned by a [`SourceClient`](crate::SourceClient)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Local identifier of a configured event (stable across restarts).
    EventConfigId
);

uuid_id!(
    /// Local identifier of a stored item row.
    ItemInfoId
);

uuid_id!(
    /// Local identifier of a stored ticket row.
    TicketId
);

// ============================================================================
// Configuration
// ============================================================================

/// One organizer account on the external system and the events tracked under it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerConfig {
    /// Base URL of the organizer on the external system
    /// (e.g. `https://pretix.example/api/v1/organizers/acme`)
    pub org_url: String,
    /// API token for the organizer
    pub token: String,
    /// Events tracked for this organizer, in configuration order
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

impl OrganizerConfig {
    /// Create an organizer configuration with no events.
    #[must_use]
    pub fn new(org_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            org_url: org_url.into(),
            token: token.into(),
            events: Vec::new(),
        }
    }

    /// Add a tracked event.
    #[must_use]
    pub fn with_event(mut self, event: EventConfig) -> Self {
        self.events.push(event);
        self
    }
}

// Tokens must never end up in logs.
impl fmt::Debug for OrganizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrganizerConfig")
            .field("org_url", &self.org_url)
            .field("token", &"<redacted>")
            .field("events", &self.events)
            .finish()
    }
}

/// One tracked event on the external system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Local configuration id
    pub id: EventConfigId,
    /// Event identifier on the external system
    pub event_id: String,
    /// External item ids that are tracked for ticket issuance
    pub active_item_ids: BTreeSet<String>,
}

impl EventConfig {
    /// Create an event configuration.
    #[must_use]
    pub fn new<I, S>(id: EventConfigId, event_id: impl Into<String>, active_item_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            event_id: event_id.into(),
            active_item_ids: active_item_ids.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Local rows
// ============================================================================

/// Stored display metadata of a tracked event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Owning event configuration (primary key)
    pub event_config_id: EventConfigId,
    /// Display name as reported by the external system
    pub name: String,
}

/// Stored metadata of an active item.
///
/// Unique on `(event_config_id, external_item_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    /// Local id
    pub id: ItemInfoId,
    /// Owning event configuration
    pub event_config_id: EventConfigId,
    /// Item identifier on the external system
    pub external_item_id: String,
    /// Display name
    pub name: String,
}

/// Stored ticket.
///
/// Identity is `(email, item_info_id)`; there is no external identifier.
/// Rows are soft-deleted and never removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Local id
    pub id: TicketId,
    /// Owning event configuration
    pub event_config_id: EventConfigId,
    /// Owning item
    pub item_info_id: ItemInfoId,
    /// Lower-cased email address
    pub email: String,
    /// Attendee (or purchaser) name
    pub full_name: String,
    /// Soft-delete flag
    pub is_deleted: bool,
}

/// Identity of a ticket within one event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketKey {
    /// Lower-cased email address
    pub email: String,
    /// Owning item
    pub item_info_id: ItemInfoId,
}

impl TicketRecord {
    /// Identity key of this ticket.
    #[must_use]
    pub fn key(&self) -> TicketKey {
        TicketKey {
            email: self.email.clone(),
            item_info_id: self.item_info_id,
        }
    }
}

// ============================================================================
// External model
// ============================================================================

/// Order status literal denoting a paid order.
pub const PAID_STATUS: &str = "p";

/// Display metadata of an external event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// Display name
    pub name: String,
}

/// One entry of an external item catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalItem {
    /// External item id
    pub id: String,
    /// Display name
    pub name: String,
}

/// An external order with its line items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalOrder {
    /// Order code
    pub code: String,
    /// Status code (see [`PAID_STATUS`])
    pub status: String,
    /// Purchaser email address
    pub email: String,
    /// Purchaser name, if the order carries one
    pub purchaser_name: Option<String>,
    /// Line items
    pub positions: Vec<ExternalPosition>,
}

impl ExternalOrder {
    /// Whether the order has been paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == PAID_STATUS
    }
}

/// One line item of an external order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPosition {
    /// Position id (unique within the order)
    pub id: String,
    /// External item id this position was sold as
    pub item_id: String,
    /// Attendee name, if collected
    pub attendee_name: Option<String>,
    /// Attendee email, if collected
    pub attendee_email: Option<String>,
}
