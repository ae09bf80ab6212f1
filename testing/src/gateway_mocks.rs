//! In-memory local storage.
//!
//! [`InMemoryGateway`] implements [`PersistenceGateway`] over plain
//! collections. Besides storing rows it keeps a log of every mutating call,
//! which lets tests assert on write order and on idempotence ("the second run
//! wrote nothing").

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use ticket_sync_core::gateway::{GatewayError, GatewayFuture, PersistenceGateway};
use ticket_sync_core::{EventConfigId, EventInfo, ItemInfo, ItemInfoId, TicketId, TicketRecord};

/// Gateway operations, as recorded in the operation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    /// `fetch_event_info`
    FetchEventInfo,
    /// `insert_event_info`
    InsertEventInfo,
    /// `update_event_info`
    UpdateEventInfo,
    /// `delete_event_info`
    DeleteEventInfo,
    /// `fetch_items`
    FetchItems,
    /// `insert_item`
    InsertItem,
    /// `update_item`
    UpdateItem,
    /// `delete_item`
    DeleteItem,
    /// `fetch_live_tickets`
    FetchLiveTickets,
    /// `insert_ticket`
    InsertTicket,
    /// `update_ticket`
    UpdateTicket,
    /// `soft_delete_ticket`
    SoftDeleteTicket,
}

impl GatewayOp {
    /// Whether this operation writes.
    #[must_use]
    pub const fn is_write(self) -> bool {
        !matches!(self, Self::FetchEventInfo | Self::FetchItems | Self::FetchLiveTickets)
    }
}

#[derive(Debug, Default)]
struct GatewayData {
    event_infos: HashMap<EventConfigId, EventInfo>,
    items: Vec<ItemInfo>,
    tickets: Vec<TicketRecord>,
    log: Vec<GatewayOp>,
    failures: HashMap<GatewayOp, GatewayError>,
}

/// In-memory local storage for fast, deterministic testing.
///
/// Enforces the same constraints as the production schema: item rows are
/// unique on `(event_config_id, external_item_id)` and updates of missing rows
/// fail with [`GatewayError::NotFound`]. Clones share state.
///
/// # Example
///
/// ```
/// use ticket_sync_testing::{GatewayOp, InMemoryGateway};
/// use ticket_sync_core::{EventConfigId, EventInfo, PersistenceGateway};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = InMemoryGateway::new();
/// let info = EventInfo { event_config_id: EventConfigId::new(), name: "Conf".into() };
///
/// gateway.insert_event_info(&info).await?;
///
/// assert_eq!(gateway.event_info(info.event_config_id), Some(info));
/// assert_eq!(gateway.writes(), vec![GatewayOp::InsertEventInfo]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    data: Arc<RwLock<GatewayData>>,
}

impl InMemoryGateway {
    /// Create empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored event metadata.
    #[must_use]
    pub fn event_info(&self, event_config_id: EventConfigId) -> Option<EventInfo> {
        self.data.read().unwrap().event_infos.get(&event_config_id).cloned()
    }

    /// Stored items of an event, in insertion order.
    #[must_use]
    pub fn items(&self, event_config_id: EventConfigId) -> Vec<ItemInfo> {
        self.data
            .read()
            .unwrap()
            .items
            .iter()
            .filter(|i| i.event_config_id == event_config_id)
            .cloned()
            .collect()
    }

    /// All stored tickets of an event, soft-deleted ones included.
    #[must_use]
    pub fn tickets(&self, event_config_id: EventConfigId) -> Vec<TicketRecord> {
        self.data
            .read()
            .unwrap()
            .tickets
            .iter()
            .filter(|t| t.event_config_id == event_config_id)
            .cloned()
            .collect()
    }

    /// Non-deleted tickets of an event.
    #[must_use]
    pub fn live_tickets(&self, event_config_id: EventConfigId) -> Vec<TicketRecord> {
        self.tickets(event_config_id)
            .into_iter()
            .filter(|t| !t.is_deleted)
            .collect()
    }

    /// Every operation issued so far, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<GatewayOp> {
        self.data.read().unwrap().log.clone()
    }

    /// Mutating operations issued so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<GatewayOp> {
        self.operations().into_iter().filter(|op| op.is_write()).collect()
    }

    /// Number of times `op` was issued.
    #[must_use]
    pub fn count(&self, op: GatewayOp) -> usize {
        self.data.read().unwrap().log.iter().filter(|o| **o == op).count()
    }

    /// Forget the operation log (stored rows are kept).
    pub fn clear_log(&self) {
        self.data.write().unwrap().log.clear();
    }

    /// Make every subsequent `op` fail with `error`.
    pub fn fail_on(&self, op: GatewayOp, error: GatewayError) {
        self.data.write().unwrap().failures.insert(op, error);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.data.write().unwrap().failures.clear();
    }

    /// Store an item directly, bypassing the log.
    pub fn seed_item(&self, item: ItemInfo) {
        self.data.write().unwrap().items.push(item);
    }

    /// Store a ticket directly, bypassing the log.
    pub fn seed_ticket(&self, ticket: TicketRecord) {
        self.data.write().unwrap().tickets.push(ticket);
    }

    /// Record `op` and run `f` against the data, unless a failure was injected.
    fn with<T>(
        &self,
        op: GatewayOp,
        f: impl FnOnce(&mut GatewayData) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let mut data = self.data.write().unwrap();
        data.log.push(op);
        if let Some(error) = data.failures.get(&op) {
            return Err(error.clone());
        }
        f(&mut data)
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn fetch_event_info(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Option<EventInfo>> {
        let result = self.with(GatewayOp::FetchEventInfo, |data| {
            Ok(data.event_infos.get(&event_config_id).cloned())
        });
        Box::pin(async move { result })
    }

    fn insert_event_info<'a>(&'a self, info: &'a EventInfo) -> GatewayFuture<'a, ()> {
        let result = self.with(GatewayOp::InsertEventInfo, |data| {
            if data.event_infos.contains_key(&info.event_config_id) {
                return Err(GatewayError::Storage(format!(
                    "duplicate event info {}",
                    info.event_config_id
                )));
            }
            data.event_infos.insert(info.event_config_id, info.clone());
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn update_event_info<'a>(&'a self, info: &'a EventInfo) -> GatewayFuture<'a, ()> {
        let result = self.with(GatewayOp::UpdateEventInfo, |data| {
            let stored = data
                .event_infos
                .get_mut(&info.event_config_id)
                .ok_or_else(|| GatewayError::NotFound(format!("event info {}", info.event_config_id)))?;
            stored.name.clone_from(&info.name);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn delete_event_info(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, ()> {
        let result = self.with(GatewayOp::DeleteEventInfo, |data| {
            data.event_infos.remove(&event_config_id);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn fetch_items(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Vec<ItemInfo>> {
        let result = self.with(GatewayOp::FetchItems, |data| {
            Ok(data
                .items
                .iter()
                .filter(|i| i.event_config_id == event_config_id)
                .cloned()
                .collect())
        });
        Box::pin(async move { result })
    }

    fn insert_item<'a>(&'a self, item: &'a ItemInfo) -> GatewayFuture<'a, ()> {
        let result = self.with(GatewayOp::InsertItem, |data| {
            let duplicate = data.items.iter().any(|i| {
                i.event_config_id == item.event_config_id && i.external_item_id == item.external_item_id
            });
            if duplicate {
                return Err(GatewayError::Storage(format!(
                    "duplicate item {} for event {}",
                    item.external_item_id, item.event_config_id
                )));
            }
            data.items.push(item.clone());
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn update_item<'a>(&'a self, item: &'a ItemInfo) -> GatewayFuture<'a, ()> {
        let result = self.with(GatewayOp::UpdateItem, |data| {
            let stored = data
                .items
                .iter_mut()
                .find(|i| i.id == item.id)
                .ok_or_else(|| GatewayError::NotFound(format!("item {}", item.id)))?;
            stored.name.clone_from(&item.name);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn delete_item(&self, id: ItemInfoId) -> GatewayFuture<'_, ()> {
        let result = self.with(GatewayOp::DeleteItem, |data| {
            data.items.retain(|i| i.id != id);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn fetch_live_tickets(&self, event_config_id: EventConfigId) -> GatewayFuture<'_, Vec<TicketRecord>> {
        let result = self.with(GatewayOp::FetchLiveTickets, |data| {
            Ok(data
                .tickets
                .iter()
                .filter(|t| t.event_config_id == event_config_id && !t.is_deleted)
                .cloned()
                .collect())
        });
        Box::pin(async move { result })
    }

    fn insert_ticket<'a>(&'a self, ticket: &'a TicketRecord) -> GatewayFuture<'a, ()> {
        let result = self.with(GatewayOp::InsertTicket, |data| {
            data.tickets.push(ticket.clone());
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn update_ticket<'a>(&'a self, ticket: &'a TicketRecord) -> GatewayFuture<'a, ()> {
        let result = self.with(GatewayOp::UpdateTicket, |data| {
            let stored = data
                .tickets
                .iter_mut()
                .find(|t| t.id == ticket.id)
                .ok_or_else(|| GatewayError::NotFound(format!("ticket {}", ticket.id)))?;
            stored.full_name.clone_from(&ticket.full_name);
            stored.item_info_id = ticket.item_info_id;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn soft_delete_ticket(&self, id: TicketId) -> GatewayFuture<'_, ()> {
        let result = self.with(GatewayOp::SoftDeleteTicket, |data| {
            let stored = data
                .tickets
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| GatewayError::NotFound(format!("ticket {id}")))?;
            stored.is_deleted = true;
            Ok(())
        });
        Box::pin(async move { result })
    }
}
