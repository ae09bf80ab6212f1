//! Local persistence trait.
//!
//! The gateway exposes per-row operations over three tables: event info, item
//! info and tickets. Each call is assumed to be atomic on its own; nothing in
//! the reconciler relies on a transaction spanning several calls.
//!
//! # Implementations
//!
//! - `PostgresGateway` (in `ticket-sync-postgres` crate): Production implementation
//! - `InMemoryGateway` (in `ticket-sync-testing` crate): Fast, deterministic testing

use crate::types::{EventConfigId, EventInfo, ItemInfo, ItemInfoId, TicketId, TicketRecord};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors returned by a [`PersistenceGateway`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Database connection or query failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// An update or delete targeted a row that does not exist
    #[error("Row not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Type alias for the boxed futures returned by [`PersistenceGateway`].
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// CRUD access to the local ticketing tables.
///
/// Only the reconciler writes through this trait.
pub trait PersistenceGateway: Send + Sync {
    /// Load the stored metadata of an event, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the query fails.
    fn fetch_event_info(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Option<EventInfo>>;

    /// Insert event metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the row cannot be written.
    fn insert_event_info<'a>(&'a self, info: &'a EventInfo) -> GatewayFuture<'a, ()>;

    /// Update the display name of stored event metadata.
    ///
    /// # Errors
    ///
    /// - `NotFound`: No row for `info.event_config_id`
    /// - `Storage`: The query failed
    fn update_event_info<'a>(&'a self, info: &'a EventInfo) -> GatewayFuture<'a, ()>;

    /// Remove stored event metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the query fails. Deleting a
    /// missing row is not an error.
    fn delete_event_info(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, ()>;

    /// Load every stored item of an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the query fails.
    fn fetch_items(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Vec<ItemInfo>>;

    /// Insert an item row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the row cannot be written (including a
    /// uniqueness violation on `(event_config_id, external_item_id)`).
    fn insert_item<'a>(&'a self, item: &'a ItemInfo) -> GatewayFuture<'a, ()>;

    /// Update the display name of an item row, matched by `item.id`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: No row with `item.id`
    /// - `Storage`: The query failed
    fn update_item<'a>(&'a self, item: &'a ItemInfo) -> GatewayFuture<'a, ()>;

    /// Hard-delete an item row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the query fails.
    fn delete_item(&self, id: ItemInfoId) -> GatewayFuture<'_, ()>;

    /// Load the non-deleted tickets of an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the query fails.
    fn fetch_live_tickets(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Vec<TicketRecord>>;

    /// Insert a ticket row.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the row cannot be written.
    fn insert_ticket<'a>(&'a self, ticket: &'a TicketRecord) -> GatewayFuture<'a, ()>;

    /// Update the name and owning item of a ticket row, matched by `ticket.id`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: No row with `ticket.id`
    /// - `Storage`: The query failed
    fn update_ticket<'a>(&'a self, ticket: &'a TicketRecord) -> GatewayFuture<'a, ()>;

    /// Set the soft-delete flag of a ticket row. The row is retained.
    ///
    /// # Errors
    ///
    /// - `NotFound`: No row with `id`
    /// - `Storage`: The query failed
    fn soft_delete_ticket(&self, id: TicketId) -> GatewayFuture<'_, ()>;
}
