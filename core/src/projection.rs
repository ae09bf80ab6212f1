//! Mapping of external orders into candidate ticket records.
//!
//! The projection is the only place that interprets order contents. It is a
//! pure function of the fetched orders and the item rows refreshed by the item
//! phase: it never reads or writes persistent state.
//!
//! # Rules
//!
//! - Orders whose status is not [`PAID_STATUS`](crate::PAID_STATUS) yield nothing.
//! - Positions sold as an item that is not tracked are dropped silently.
//! - A position without an attendee email falls back to the purchaser email.
//!   The fallback is flagged on the candidate so the caller can log it.
//! - Emails are lower-cased.
//! - A position with neither an attendee nor a purchaser email cannot be
//!   addressed and is reported in [`ProjectedOrders::unaddressable`].

use crate::types::{ExternalOrder, ItemInfo, ItemInfoId, TicketKey};
use std::collections::HashMap;

/// Tracked items of one event, indexed by external item id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveItems {
    by_external_id: HashMap<String, ItemInfoId>,
}

impl ActiveItems {
    /// Build the index from stored item rows.
    #[must_use]
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a ItemInfo>) -> Self {
        Self {
            by_external_id: items
                .into_iter()
                .map(|item| (item.external_item_id.clone(), item.id))
                .collect(),
        }
    }

    /// Local id of a tracked external item.
    #[must_use]
    pub fn get(&self, external_item_id: &str) -> Option<ItemInfoId> {
        self.by_external_id.get(external_item_id).copied()
    }

    /// Number of tracked items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_external_id.len()
    }

    /// Whether no item is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_external_id.is_empty()
    }
}

/// Where a candidate ticket came from on the external system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionRef {
    /// Order code
    pub order_code: String,
    /// Position id within the order
    pub position_id: String,
}

/// A ticket as it should exist locally after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTicket {
    /// Lower-cased email
    pub email: String,
    /// Attendee (or purchaser) name, empty when neither is known
    pub full_name: String,
    /// Owning item
    pub item_info_id: ItemInfoId,
    /// Originating order position
    pub source: PositionRef,
    /// `true` when the attendee email was missing and the purchaser email was used
    pub purchaser_email_fallback: bool,
}

impl CandidateTicket {
    /// Identity key of this ticket.
    #[must_use]
    pub fn key(&self) -> TicketKey {
        TicketKey {
            email: self.email.clone(),
            item_info_id: self.item_info_id,
        }
    }
}

/// Result of projecting a batch of orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedOrders {
    /// Candidate tickets in order/position order
    pub tickets: Vec<CandidateTicket>,
    /// Tracked paid positions that carry no usable email at all
    pub unaddressable: Vec<PositionRef>,
}

impl ProjectedOrders {
    /// Candidates that fell back to the purchaser email.
    pub fn fallbacks(&self) -> impl Iterator<Item = &CandidateTicket> {
        self.tickets.iter().filter(|t| t.purchaser_email_fallback)
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Project one order into candidate tickets.
///
/// Positions with no usable email are appended to `unaddressable`.
pub fn project_order(
    order: &ExternalOrder,
    active_items: &ActiveItems,
    unaddressable: &mut Vec<PositionRef>,
) -> Vec<CandidateTicket> {
    if !order.is_paid() {
        return Vec::new();
    }

    let purchaser_email = non_blank(Some(&order.email));
    let purchaser_name = non_blank(order.purchaser_name.as_ref());

    order
        .positions
        .iter()
        .filter_map(|position| {
            let item_info_id = active_items.get(&position.item_id)?;
            let source = PositionRef {
                order_code: order.code.clone(),
                position_id: position.id.clone(),
            };

            let (email, purchaser_email_fallback) =
                match (non_blank(position.attendee_email.as_ref()), purchaser_email) {
                    (Some(attendee), _) => (attendee, false),
                    (None, Some(purchaser)) => (purchaser, true),
                    (None, None) => {
                        unaddressable.push(source);
                        return None;
                    }
                };

            let full_name = non_blank(position.attendee_name.as_ref())
                .or(purchaser_name)
                .unwrap_or_default();

            Some(CandidateTicket {
                email: email.to_lowercase(),
                full_name: full_name.to_string(),
                item_info_id,
                source,
                purchaser_email_fallback,
            })
        })
        .collect()
}

/// Project a batch of orders into candidate tickets.
#[must_use]
pub fn project_orders<'a>(
    orders: impl IntoIterator<Item = &'a ExternalOrder>,
    active_items: &ActiveItems,
) -> ProjectedOrders {
    let mut projected = ProjectedOrders::default();
    for order in orders {
        let mut tickets = project_order(order, active_items, &mut projected.unaddressable);
        projected.tickets.append(&mut tickets);
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventConfigId, ExternalPosition};
    use proptest::prelude::*;

    fn item(external_id: &str, name: &str) -> ItemInfo {
        ItemInfo {
            id: ItemInfoId::new(),
            event_config_id: EventConfigId::new(),
            external_item_id: external_id.to_string(),
            name: name.to_string(),
        }
    }

    fn position(id: &str, item_id: &str, name: Option<&str>, email: Option<&str>) -> ExternalPosition {
        ExternalPosition {
            id: id.to_string(),
            item_id: item_id.to_string(),
            attendee_name: name.map(str::to_string),
            attendee_email: email.map(str::to_string),
        }
    }

    fn order(status: &str, positions: Vec<ExternalPosition>) -> ExternalOrder {
        ExternalOrder {
            code: "ORD01".to_string(),
            status: status.to_string(),
            email: "Buyer@Example.com".to_string(),
            purchaser_name: Some("Buyer Person".to_string()),
            positions,
        }
    }

    #[test]
    fn test_paid_order_with_attendee_email() {
        let ga = item("1", "GA");
        let active = ActiveItems::from_items([&ga]);
        let order = order("p", vec![position("10", "1", Some("Ada"), Some("X@Y.com"))]);

        let projected = project_orders([&order], &active);

        assert_eq!(projected.tickets.len(), 1);
        let ticket = &projected.tickets[0];
        assert_eq!(ticket.email, "x@y.com");
        assert_eq!(ticket.full_name, "Ada");
        assert_eq!(ticket.item_info_id, ga.id);
        assert!(!ticket.purchaser_email_fallback);
        assert!(projected.unaddressable.is_empty());
    }

    #[test]
    fn test_unpaid_order_yields_nothing() {
        let ga = item("1", "GA");
        let active = ActiveItems::from_items([&ga]);

        for status in ["n", "e", "c", "P", ""] {
            let order = order(status, vec![position("10", "1", Some("Ada"), Some("a@b.c"))]);
            assert!(project_orders([&order], &active).tickets.is_empty());
        }
    }

    #[test]
    fn test_untracked_item_is_dropped() {
        let ga = item("1", "GA");
        let active = ActiveItems::from_items([&ga]);
        let order = order(
            "p",
            vec![
                position("10", "1", None, Some("a@b.c")),
                position("11", "99", None, Some("d@e.f")),
            ],
        );

        let projected = project_orders([&order], &active);
        assert_eq!(projected.tickets.len(), 1);
        assert_eq!(projected.tickets[0].source.position_id, "10");
        assert!(projected.unaddressable.is_empty());
    }

    #[test]
    fn test_missing_attendee_email_falls_back_to_purchaser() {
        let ga = item("1", "GA");
        let active = ActiveItems::from_items([&ga]);
        let order = order(
            "p",
            vec![position("10", "1", None, None), position("11", "1", Some("Bo"), Some("  "))],
        );

        let projected = project_orders([&order], &active);

        assert_eq!(projected.tickets.len(), 2);
        for ticket in &projected.tickets {
            assert_eq!(ticket.email, "buyer@example.com");
            assert!(ticket.purchaser_email_fallback);
        }
        assert_eq!(projected.tickets[0].full_name, "Buyer Person");
        assert_eq!(projected.tickets[1].full_name, "Bo");
        assert_eq!(projected.fallbacks().count(), 2);
    }

    #[test]
    fn test_position_without_any_email_is_unaddressable() {
        let ga = item("1", "GA");
        let active = ActiveItems::from_items([&ga]);
        let mut order = order("p", vec![position("10", "1", Some("Ada"), None)]);
        order.email = String::new();

        let projected = project_orders([&order], &active);

        assert!(projected.tickets.is_empty());
        assert_eq!(
            projected.unaddressable,
            vec![PositionRef {
                order_code: "ORD01".to_string(),
                position_id: "10".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_names_yield_empty_full_name() {
        let ga = item("1", "GA");
        let active = ActiveItems::from_items([&ga]);
        let mut order = order("p", vec![position("10", "1", None, Some("a@b.c"))]);
        order.purchaser_name = None;

        let projected = project_orders([&order], &active);
        assert_eq!(projected.tickets[0].full_name, "");
    }

    proptest! {
        #[test]
        fn prop_unpaid_orders_never_project(
            status in "[a-oq-z]{0,2}",
            emails in proptest::collection::vec(proptest::option::of("[A-Za-z]{1,8}@[a-z]{1,5}\\.com"), 0..5),
        ) {
            let ga = item("1", "GA");
            let active = ActiveItems::from_items([&ga]);
            let positions = emails
                .iter()
                .enumerate()
                .map(|(i, email)| position(&i.to_string(), "1", None, email.as_deref()))
                .collect();
            let order = order(&status, positions);

            let projected = project_orders([&order], &active);
            prop_assert!(projected.tickets.is_empty());
            prop_assert!(projected.unaddressable.is_empty());
        }

        #[test]
        fn prop_paid_tracked_positions_project_lower_cased(
            email in "[A-Za-z]{1,8}@[A-Za-z]{1,5}\\.[A-Za-z]{2,3}",
        ) {
            let ga = item("1", "GA");
            let active = ActiveItems::from_items([&ga]);
            let order = order("p", vec![position("10", "1", None, Some(&email))]);

            let projected = project_orders([&order], &active);
            prop_assert_eq!(projected.tickets.len(), 1);
            prop_assert_eq!(&projected.tickets[0].email, &email.to_lowercase());
            prop_assert_eq!(projected.tickets[0].item_info_id, ga.id);
        }
    }
}
