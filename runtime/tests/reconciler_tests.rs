//! Integration tests for the three-phase reconciler
//!
//! Each test drives `Reconciler::sync_event` against the in-memory source and
//! gateway and checks the rows left behind.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use ticket_sync_core::{
    EventConfig, GatewayError, ItemInfo, ItemInfoId, OrganizerConfig, SourceError, SyncError, SyncPhase,
    TicketId, TicketRecord,
};
use ticket_sync_runtime::{ChangeCounts, Reconciler, SyncReport};
use ticket_sync_testing::helpers::{
    event_config, init_test_tracing, item, order, organizer, paid_order, position, ORG_URL,
};
use ticket_sync_testing::{GatewayOp, InMemoryGateway, InMemorySourceClient, RecordingErrorReporter, SourceCall};

// ============================================================================
// Test Fixtures
// ============================================================================

struct Harness {
    source: InMemorySourceClient,
    gateway: InMemoryGateway,
    reporter: RecordingErrorReporter,
    reconciler: Reconciler,
    organizer: OrganizerConfig,
}

impl Harness {
    fn new(event: EventConfig) -> Self {
        init_test_tracing();
        let gateway = InMemoryGateway::new();
        let reporter = RecordingErrorReporter::new();
        let reconciler = Reconciler::new(Arc::new(gateway.clone()), Arc::new(reporter.clone()));

        Self {
            source: InMemorySourceClient::new(),
            gateway,
            reporter,
            reconciler,
            organizer: organizer(vec![event]),
        }
    }

    fn event(&self) -> &EventConfig {
        &self.organizer.events[0]
    }

    async fn sync(&self) -> Result<SyncReport, SyncError> {
        self.reconciler.sync_event(&self.source, &self.organizer, self.event()).await
    }
}

/// Active item "1" named "GA", one paid order for X@Y.com.
fn ga_scenario() -> Harness {
    let harness = Harness::new(event_config("conf", &["1"]));
    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness.source.set_items(ORG_URL, "conf", vec![item("1", "GA")]);
    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![paid_order(
            "ORD1",
            "buyer@example.com",
            vec![position("p1", "1", Some("Ada Lovelace"), Some("X@Y.com"))],
        )],
    );
    harness
}

// ============================================================================
// Full-pair scenarios
// ============================================================================

#[tokio::test]
async fn test_first_sync_creates_event_item_and_ticket() {
    let harness = ga_scenario();

    let report = harness.sync().await.unwrap();

    assert_eq!(
        report,
        SyncReport {
            event_name_changed: true,
            items: ChangeCounts { inserted: 1, updated: 0, deleted: 0 },
            tickets: ChangeCounts { inserted: 1, updated: 0, deleted: 0 },
        }
    );

    let event_id = harness.event().id;
    assert_eq!(harness.gateway.event_info(event_id).unwrap().name, "Conference");

    let items = harness.gateway.items(event_id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].external_item_id, "1");
    assert_eq!(items[0].name, "GA");

    let tickets = harness.gateway.live_tickets(event_id);
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].email, "x@y.com");
    assert_eq!(tickets[0].full_name, "Ada Lovelace");
    assert_eq!(tickets[0].item_info_id, items[0].id);
    assert!(!tickets[0].is_deleted);
    assert!(harness.reporter.is_empty());
}

#[tokio::test]
async fn test_second_sync_with_unchanged_data_writes_nothing() {
    let harness = ga_scenario();
    harness.sync().await.unwrap();
    harness.gateway.clear_log();

    let report = harness.sync().await.unwrap();

    assert_eq!(report, SyncReport::default());
    assert!(harness.gateway.writes().is_empty());
}

#[tokio::test]
async fn test_removed_position_soft_deletes_ticket() {
    let harness = ga_scenario();
    harness.sync().await.unwrap();

    harness.source.set_orders(ORG_URL, "conf", vec![]);
    let report = harness.sync().await.unwrap();

    assert_eq!(report.tickets, ChangeCounts { inserted: 0, updated: 0, deleted: 1 });

    let event_id = harness.event().id;
    assert!(harness.gateway.live_tickets(event_id).is_empty());

    let all = harness.gateway.tickets(event_id);
    assert_eq!(all.len(), 1, "soft-deleted row is retained");
    assert!(all[0].is_deleted);
    assert_eq!(all[0].email, "x@y.com");
}

#[tokio::test]
async fn test_ticket_reappearing_after_soft_delete_is_inserted_again() {
    let harness = ga_scenario();
    harness.sync().await.unwrap();

    let orders = vec![paid_order(
        "ORD1",
        "buyer@example.com",
        vec![position("p1", "1", Some("Ada Lovelace"), Some("X@Y.com"))],
    )];
    harness.source.set_orders(ORG_URL, "conf", vec![]);
    harness.sync().await.unwrap();
    harness.source.set_orders(ORG_URL, "conf", orders);
    let report = harness.sync().await.unwrap();

    assert_eq!(report.tickets.inserted, 1);
    let event_id = harness.event().id;
    assert_eq!(harness.gateway.tickets(event_id).len(), 2);
    assert_eq!(harness.gateway.live_tickets(event_id).len(), 1);
}

// ============================================================================
// Event info phase
// ============================================================================

#[tokio::test]
async fn test_event_rename_updates_event_info() {
    let harness = ga_scenario();
    harness.sync().await.unwrap();

    harness.source.set_event(ORG_URL, "conf", "Conference 2026");
    harness.gateway.clear_log();
    let report = harness.sync().await.unwrap();

    assert!(report.event_name_changed);
    assert_eq!(harness.gateway.writes(), vec![GatewayOp::UpdateEventInfo]);
    assert_eq!(
        harness.gateway.event_info(harness.event().id).unwrap().name,
        "Conference 2026"
    );
}

#[tokio::test]
async fn test_unknown_event_aborts_before_items() {
    let harness = ga_scenario();
    harness.source.remove_event(ORG_URL, "conf");

    let error = harness.sync().await.unwrap_err();

    assert_eq!(error.phase(), SyncPhase::EventInfo);
    assert!(matches!(
        error,
        SyncError::Source { source: SourceError::NotFound(_), .. }
    ));
    assert_eq!(harness.source.call_count(SourceCall::Items), 0);
    assert_eq!(harness.source.call_count(SourceCall::Orders), 0);
    assert!(harness.gateway.writes().is_empty());
    assert_eq!(harness.reporter.errors(), vec![error]);
}

// ============================================================================
// Item phase
// ============================================================================

#[tokio::test]
async fn test_missing_active_item_leaves_items_untouched_and_skips_tickets() {
    let harness = Harness::new(event_config("conf", &["1", "2", "3"]));
    let event_id = harness.event().id;
    let stored = ItemInfo {
        id: ItemInfoId::new(),
        event_config_id: event_id,
        external_item_id: "1".to_string(),
        name: "Old name".to_string(),
    };
    harness.gateway.seed_item(stored.clone());

    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness.source.set_items(ORG_URL, "conf", vec![item("1", "GA"), item("9", "Other")]);
    harness.source.set_orders(ORG_URL, "conf", vec![]);

    let error = harness.sync().await.unwrap_err();

    assert_eq!(
        error,
        SyncError::MissingActiveItems {
            event_id: "conf".to_string(),
            missing: vec!["2".to_string(), "3".to_string()],
        }
    );
    assert_eq!(harness.gateway.items(event_id), vec![stored]);
    assert_eq!(harness.gateway.count(GatewayOp::FetchLiveTickets), 0);
    assert_eq!(harness.source.call_count(SourceCall::Orders), 0);
    assert_eq!(harness.reporter.len(), 1);
}

#[tokio::test]
async fn test_inactive_catalog_items_are_not_stored() {
    let harness = Harness::new(event_config("conf", &["1"]));
    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness
        .source
        .set_items(ORG_URL, "conf", vec![item("1", "GA"), item("2", "VIP")]);
    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![paid_order(
            "ORD1",
            "buyer@example.com",
            vec![position("p1", "2", None, Some("vip@example.com"))],
        )],
    );

    let report = harness.sync().await.unwrap();

    assert_eq!(report.items.inserted, 1);
    assert_eq!(report.tickets, ChangeCounts::default());
    assert!(harness.gateway.live_tickets(harness.event().id).is_empty());
}

#[tokio::test]
async fn test_item_rename_and_deactivation() {
    let mut harness = ga_scenario();
    let event_id = harness.event().id;
    harness.organizer.events[0] = EventConfig::new(event_id, "conf", ["1", "2"]);
    harness
        .source
        .set_items(ORG_URL, "conf", vec![item("1", "GA"), item("2", "VIP")]);
    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![paid_order(
            "ORD1",
            "buyer@example.com",
            vec![
                position("p1", "1", Some("Ada"), Some("ada@example.com")),
                position("p2", "2", Some("Grace"), Some("grace@example.com")),
            ],
        )],
    );
    harness.sync().await.unwrap();

    // Item "2" is no longer active and item "1" is renamed.
    harness.organizer.events[0] = EventConfig::new(event_id, "conf", ["1"]);
    harness
        .source
        .set_items(ORG_URL, "conf", vec![item("1", "General Admission"), item("2", "VIP")]);
    let report = harness.sync().await.unwrap();

    assert_eq!(report.items, ChangeCounts { inserted: 0, updated: 1, deleted: 1 });
    assert_eq!(report.tickets, ChangeCounts { inserted: 0, updated: 0, deleted: 1 });

    let items = harness.gateway.items(event_id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "General Admission");

    let live = harness.gateway.live_tickets(event_id);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].email, "ada@example.com");

    let deleted: Vec<TicketRecord> = harness
        .gateway
        .tickets(event_id)
        .into_iter()
        .filter(|t| t.is_deleted)
        .collect();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].email, "grace@example.com");
}

#[tokio::test]
async fn test_item_writes_run_inserts_then_updates_then_deletes() {
    let harness = Harness::new(event_config("conf", &["1", "2"]));
    let event_id = harness.event().id;
    for (external_id, name) in [("1", "Old"), ("3", "Gone")] {
        harness.gateway.seed_item(ItemInfo {
            id: ItemInfoId::new(),
            event_config_id: event_id,
            external_item_id: external_id.to_string(),
            name: name.to_string(),
        });
    }
    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness
        .source
        .set_items(ORG_URL, "conf", vec![item("1", "New"), item("2", "Fresh")]);
    harness.source.set_orders(ORG_URL, "conf", vec![]);

    harness.sync().await.unwrap();

    let item_writes: Vec<GatewayOp> = harness
        .gateway
        .writes()
        .into_iter()
        .filter(|op| matches!(op, GatewayOp::InsertItem | GatewayOp::UpdateItem | GatewayOp::DeleteItem))
        .collect();
    assert_eq!(
        item_writes,
        vec![GatewayOp::InsertItem, GatewayOp::UpdateItem, GatewayOp::DeleteItem]
    );
}

// ============================================================================
// Ticket phase
// ============================================================================

#[tokio::test]
async fn test_ticket_writes_run_inserts_then_updates_then_soft_deletes() {
    let harness = Harness::new(event_config("conf", &["1"]));
    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness.source.set_items(ORG_URL, "conf", vec![item("1", "GA")]);
    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![paid_order(
            "ORD1",
            "buyer@example.com",
            vec![
                position("p1", "1", Some("Ada"), Some("ada@example.com")),
                position("p2", "1", Some("Grace"), Some("grace@example.com")),
            ],
        )],
    );
    harness.sync().await.unwrap();
    harness.gateway.clear_log();

    // Ada is renamed, Grace leaves, Alan joins.
    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![paid_order(
            "ORD1",
            "buyer@example.com",
            vec![
                position("p1", "1", Some("Ada King"), Some("ada@example.com")),
                position("p3", "1", Some("Alan"), Some("alan@example.com")),
            ],
        )],
    );
    let report = harness.sync().await.unwrap();

    assert_eq!(report.tickets, ChangeCounts { inserted: 1, updated: 1, deleted: 1 });
    assert_eq!(
        harness.gateway.writes(),
        vec![GatewayOp::InsertTicket, GatewayOp::UpdateTicket, GatewayOp::SoftDeleteTicket]
    );
}

#[tokio::test]
async fn test_unpaid_orders_yield_no_tickets() {
    let harness = Harness::new(event_config("conf", &["1"]));
    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness.source.set_items(ORG_URL, "conf", vec![item("1", "GA")]);
    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![
            order("PEND", "n", "a@example.com", vec![position("p1", "1", None, Some("a@example.com"))]),
            order("CANC", "c", "b@example.com", vec![position("p2", "1", None, Some("b@example.com"))]),
            order("EXP", "e", "c@example.com", vec![position("p3", "1", None, Some("c@example.com"))]),
        ],
    );

    let report = harness.sync().await.unwrap();

    assert_eq!(report.tickets, ChangeCounts::default());
    assert_eq!(harness.gateway.count(GatewayOp::InsertTicket), 0);
}

#[tokio::test]
async fn test_missing_attendee_email_falls_back_to_purchaser() {
    let harness = Harness::new(event_config("conf", &["1"]));
    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness.source.set_items(ORG_URL, "conf", vec![item("1", "GA")]);
    let mut order = paid_order(
        "ORD1",
        "Buyer@Example.com",
        vec![position("p1", "1", None, None)],
    );
    order.purchaser_name = Some("Bea Buyer".to_string());
    harness.source.set_orders(ORG_URL, "conf", vec![order]);

    harness.sync().await.unwrap();

    let tickets = harness.gateway.live_tickets(harness.event().id);
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].email, "buyer@example.com");
    assert_eq!(tickets[0].full_name, "Bea Buyer");
}

#[tokio::test]
async fn test_attendee_name_change_updates_ticket_in_place() {
    let harness = ga_scenario();
    harness.sync().await.unwrap();
    let before = harness.gateway.live_tickets(harness.event().id);

    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![paid_order(
            "ORD1",
            "buyer@example.com",
            vec![position("p1", "1", Some("Ada King"), Some("x@y.com"))],
        )],
    );
    let report = harness.sync().await.unwrap();

    assert_eq!(report.tickets, ChangeCounts { inserted: 0, updated: 1, deleted: 0 });
    let after = harness.gateway.live_tickets(harness.event().id);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, before[0].id);
    assert_eq!(after[0].full_name, "Ada King");
}

#[tokio::test]
async fn test_duplicate_positions_collapse_to_one_ticket() {
    let harness = Harness::new(event_config("conf", &["1"]));
    harness.source.set_event(ORG_URL, "conf", "Conference");
    harness.source.set_items(ORG_URL, "conf", vec![item("1", "GA")]);
    harness.source.set_orders(
        ORG_URL,
        "conf",
        vec![
            paid_order("ORD1", "a@example.com", vec![position("p1", "1", Some("First"), Some("a@example.com"))]),
            paid_order("ORD2", "a@example.com", vec![position("p2", "1", Some("Second"), Some("A@example.com"))]),
        ],
    );

    harness.sync().await.unwrap();

    let tickets = harness.gateway.live_tickets(harness.event().id);
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].full_name, "First");
}

#[tokio::test]
async fn test_duplicate_live_rows_are_soft_deleted() {
    let harness = ga_scenario();
    harness.sync().await.unwrap();
    let event_id = harness.event().id;
    let live = harness.gateway.live_tickets(event_id);
    harness.gateway.seed_ticket(TicketRecord {
        id: TicketId::new(),
        ..live[0].clone()
    });

    let report = harness.sync().await.unwrap();

    assert_eq!(report.tickets.deleted, 1);
    assert_eq!(harness.gateway.live_tickets(event_id).len(), 1);
}

#[tokio::test]
async fn test_ticket_write_failure_keeps_earlier_phase_writes() {
    let harness = ga_scenario();
    harness
        .gateway
        .fail_on(GatewayOp::InsertTicket, GatewayError::Storage("disk full".to_string()));

    let error = harness.sync().await.unwrap_err();

    assert_eq!(error.phase(), SyncPhase::Tickets);
    let event_id = harness.event().id;
    assert!(harness.gateway.event_info(event_id).is_some());
    assert_eq!(harness.gateway.items(event_id).len(), 1);
    assert!(harness.gateway.live_tickets(event_id).is_empty());
    assert_eq!(harness.reporter.len(), 1);

    // The next run finishes the job.
    harness.gateway.clear_failures();
    let report = harness.sync().await.unwrap();
    assert!(!report.event_name_changed);
    assert_eq!(report.items, ChangeCounts::default());
    assert_eq!(report.tickets.inserted, 1);
}

#[tokio::test]
async fn test_orders_fetch_failure_is_a_ticket_phase_error() {
    let harness = ga_scenario();
    harness
        .source
        .fail(ORG_URL, "conf", SourceCall::Orders, SourceError::RateLimited);

    let error = harness.sync().await.unwrap_err();

    assert!(matches!(
        error,
        SyncError::Source {
            phase: SyncPhase::Tickets,
            source: SourceError::RateLimited,
            ..
        }
    ));
}
