//! Three-phase reconciliation of one organizer/event pair.
//!
//! Phases run strictly in order and the first failure aborts the rest:
//!
//! 1. **Event info**: insert or rename the stored event metadata
//! 2. **Items**: converge stored items with the active subset of the catalog
//! 3. **Tickets**: converge live tickets with the paid orders
//!
//! Writes of a completed phase are never rolled back. A later failure leaves a
//! consistent intermediate state that the next cycle finishes.

use std::sync::Arc;
use ticket_sync_core::change_set::compute_change_set;
use ticket_sync_core::projection::{project_orders, ActiveItems};
use ticket_sync_core::{
    ErrorReporter, EventConfig, EventInfo, ItemInfo, ItemInfoId, OrganizerConfig, PersistenceGateway,
    SourceClient, SyncError, SyncPhase, TicketId, TicketRecord,
};

/// Rows written by one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    /// Rows inserted
    pub inserted: usize,
    /// Rows updated
    pub updated: usize,
    /// Rows deleted (hard for items, soft for tickets)
    pub deleted: usize,
}

impl ChangeCounts {
    /// Total number of writes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    /// Returns `true` if the phase wrote nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Outcome of a successful pair sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Event metadata was inserted or renamed
    pub event_name_changed: bool,
    /// Item phase writes
    pub items: ChangeCounts,
    /// Ticket phase writes
    pub tickets: ChangeCounts,
}

/// Applies external state to local storage for one pair at a time.
///
/// Cheap to clone; the scheduler hands one clone to every pair task.
#[derive(Clone)]
pub struct Reconciler {
    gateway: Arc<dyn PersistenceGateway>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Reconciler {
    /// Create a reconciler over a gateway and an error reporter.
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { gateway, reporter }
    }

    /// Run all three phases for one pair.
    ///
    /// A failing phase is logged and reported here, and the remaining phases
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns the error of the phase that aborted the pair.
    #[tracing::instrument(
        name = "sync_event",
        skip_all,
        fields(
            organizer = %organizer.org_url,
            event_id = %event.event_id,
            event_config_id = %event.id,
        )
    )]
    pub async fn sync_event(
        &self,
        source: &dyn SourceClient,
        organizer: &OrganizerConfig,
        event: &EventConfig,
    ) -> Result<SyncReport, SyncError> {
        match self.run_phases(source, organizer, event).await {
            Ok(report) => {
                tracing::info!(
                    event_name_changed = report.event_name_changed,
                    items_inserted = report.items.inserted,
                    items_updated = report.items.updated,
                    items_deleted = report.items.deleted,
                    tickets_inserted = report.tickets.inserted,
                    tickets_updated = report.tickets.updated,
                    tickets_soft_deleted = report.tickets.deleted,
                    "Event synced"
                );
                Ok(report)
            }
            Err(error) => {
                tracing::error!(phase = %error.phase(), error = %error, "Event sync aborted");
                self.reporter.report(&error);
                Err(error)
            }
        }
    }

    async fn run_phases(
        &self,
        source: &dyn SourceClient,
        organizer: &OrganizerConfig,
        event: &EventConfig,
    ) -> Result<SyncReport, SyncError> {
        let event_name_changed = self.sync_event_info(source, organizer, event).await?;
        let (items, stored_items) = self.sync_items(source, organizer, event).await?;
        let tickets = self.sync_tickets(source, organizer, event, &stored_items).await?;

        Ok(SyncReport {
            event_name_changed,
            items,
            tickets,
        })
    }

    /// Event info phase: insert the metadata if absent, rename it if changed.
    ///
    /// Returns `true` if a row was written.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncPhase::EventInfo`] error if the fetch or the write fails.
    pub async fn sync_event_info(
        &self,
        source: &dyn SourceClient,
        organizer: &OrganizerConfig,
        event: &EventConfig,
    ) -> Result<bool, SyncError> {
        let phase = SyncPhase::EventInfo;
        let external = source
            .fetch_event(&organizer.org_url, &organizer.token, &event.event_id)
            .await
            .map_err(|e| SyncError::from_source(phase, &event.event_id, e))?;

        let stored = self
            .gateway
            .fetch_event_info(event.id)
            .await
            .map_err(|e| SyncError::from_gateway(phase, &event.event_id, e))?;

        let desired = EventInfo {
            event_config_id: event.id,
            name: external.name,
        };

        let write = match stored {
            None => {
                tracing::debug!(name = %desired.name, "Inserting event info");
                self.gateway.insert_event_info(&desired).await
            }
            Some(current) if current.name != desired.name => {
                tracing::debug!(from = %current.name, to = %desired.name, "Renaming event");
                self.gateway.update_event_info(&desired).await
            }
            Some(_) => return Ok(false),
        };

        write.map_err(|e| SyncError::from_gateway(phase, &event.event_id, e))?;
        Ok(true)
    }

    /// Item phase: converge stored items with the active subset of the catalog.
    ///
    /// Returns the writes and the stored items after they were applied.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingActiveItems`] if an active id is not in the
    ///   catalog; stored items are left untouched
    /// - A [`SyncPhase::Items`] error if a fetch or a write fails
    pub async fn sync_items(
        &self,
        source: &dyn SourceClient,
        organizer: &OrganizerConfig,
        event: &EventConfig,
    ) -> Result<(ChangeCounts, Vec<ItemInfo>), SyncError> {
        let phase = SyncPhase::Items;
        let catalog = source
            .fetch_items(&organizer.org_url, &organizer.token, &event.event_id)
            .await
            .map_err(|e| SyncError::from_source(phase, &event.event_id, e))?;

        let missing: Vec<String> = event
            .active_item_ids
            .iter()
            .filter(|id| !catalog.iter().any(|item| &item.id == *id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SyncError::MissingActiveItems {
                event_id: event.event_id.clone(),
                missing,
            });
        }

        let stored = self
            .gateway
            .fetch_items(event.id)
            .await
            .map_err(|e| SyncError::from_gateway(phase, &event.event_id, e))?;

        let desired = catalog
            .into_iter()
            .filter(|item| event.active_item_ids.contains(&item.id));

        let changes = compute_change_set(
            stored,
            desired,
            |stored: &ItemInfo| stored.external_item_id.clone(),
            |wanted| wanted.id.clone(),
            |stored, wanted| stored.name == wanted.name,
        );

        let mut counts = ChangeCounts::default();
        let storage = |e| SyncError::from_gateway(phase, &event.event_id, e);

        for wanted in changes.to_insert {
            let item = ItemInfo {
                id: ItemInfoId::new(),
                event_config_id: event.id,
                external_item_id: wanted.id,
                name: wanted.name,
            };
            tracing::debug!(external_item_id = %item.external_item_id, name = %item.name, "Inserting item");
            self.gateway.insert_item(&item).await.map_err(storage)?;
            counts.inserted += 1;
        }

        for (current, wanted) in changes.to_update {
            let item = ItemInfo {
                name: wanted.name,
                ..current
            };
            tracing::debug!(external_item_id = %item.external_item_id, name = %item.name, "Renaming item");
            self.gateway.update_item(&item).await.map_err(storage)?;
            counts.updated += 1;
        }

        for stale in changes.to_delete {
            tracing::debug!(external_item_id = %stale.external_item_id, "Deleting item");
            self.gateway.delete_item(stale.id).await.map_err(storage)?;
            counts.deleted += 1;
        }

        let refreshed = self.gateway.fetch_items(event.id).await.map_err(storage)?;
        Ok((counts, refreshed))
    }

    /// Ticket phase: converge live tickets with the paid orders.
    ///
    /// `items` are the stored items of the event, as returned by
    /// [`sync_items`](Self::sync_items).
    ///
    /// # Errors
    ///
    /// Returns a [`SyncPhase::Tickets`] error if a fetch or a write fails.
    pub async fn sync_tickets(
        &self,
        source: &dyn SourceClient,
        organizer: &OrganizerConfig,
        event: &EventConfig,
        items: &[ItemInfo],
    ) -> Result<ChangeCounts, SyncError> {
        let phase = SyncPhase::Tickets;
        let orders = source
            .fetch_orders(&organizer.org_url, &organizer.token, &event.event_id)
            .await
            .map_err(|e| SyncError::from_source(phase, &event.event_id, e))?;

        let active = ActiveItems::from_items(items);
        let projected = project_orders(&orders, &active);

        for ticket in projected.fallbacks() {
            tracing::warn!(
                order = %ticket.source.order_code,
                position = %ticket.source.position_id,
                "Position has no attendee email, using purchaser email"
            );
        }
        for position in &projected.unaddressable {
            tracing::warn!(
                order = %position.order_code,
                position = %position.position_id,
                "Position has no attendee or purchaser email, skipping"
            );
        }

        let storage = |e| SyncError::from_gateway(phase, &event.event_id, e);
        let existing = self.gateway.fetch_live_tickets(event.id).await.map_err(storage)?;

        let changes = compute_change_set(
            existing,
            projected.tickets,
            TicketRecord::key,
            |candidate| candidate.key(),
            |stored, candidate| {
                stored.full_name == candidate.full_name && stored.item_info_id == candidate.item_info_id
            },
        );

        let mut counts = ChangeCounts::default();

        for candidate in changes.to_insert {
            let ticket = TicketRecord {
                id: TicketId::new(),
                event_config_id: event.id,
                item_info_id: candidate.item_info_id,
                email: candidate.email,
                full_name: candidate.full_name,
                is_deleted: false,
            };
            self.gateway.insert_ticket(&ticket).await.map_err(storage)?;
            counts.inserted += 1;
        }

        for (current, candidate) in changes.to_update {
            let ticket = TicketRecord {
                full_name: candidate.full_name,
                item_info_id: candidate.item_info_id,
                ..current
            };
            self.gateway.update_ticket(&ticket).await.map_err(storage)?;
            counts.updated += 1;
        }

        for stale in changes.to_delete {
            self.gateway.soft_delete_ticket(stale.id).await.map_err(storage)?;
            counts.deleted += 1;
        }

        tracing::debug!(
            orders = orders.len(),
            inserted = counts.inserted,
            updated = counts.updated,
            soft_deleted = counts.deleted,
            "Tickets reconciled"
        );
        Ok(counts)
    }
}
