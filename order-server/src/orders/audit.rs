//! Replay audit
//!
//! Compares what the pure reducer derives from the log with what the
//! projector has written, so drift between the two consumers shows up.

use serde::Serialize;
use shared::order::{OrderStateSnapshot, OrderStatus};
use std::collections::BTreeSet;

use super::reducer::Reduction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub order_id: i64,
    pub in_sync: bool,
    pub reduced_status: OrderStatus,
    pub projected_status: OrderStatus,
    pub log_sequence: i64,
    pub projected_sequence: i64,
    /// Lines in the log that the live aggregate lacks
    pub missing_items: Vec<String>,
    /// Active live lines the log does not account for
    pub unexpected_items: Vec<String>,
    pub unsupported_events: usize,
}

pub fn compare(reduction: &Reduction, snapshot: &OrderStateSnapshot) -> AuditReport {
    let reduced: BTreeSet<&str> = reduction.state.items.keys().map(String::as_str).collect();
    let projected: BTreeSet<&str> = snapshot
        .active_items()
        .map(|item| item.line_key.as_str())
        .collect();

    let missing_items: Vec<String> = reduced
        .difference(&projected)
        .map(|k| k.to_string())
        .collect();
    let unexpected_items: Vec<String> = projected
        .difference(&reduced)
        .map(|k| k.to_string())
        .collect();

    let in_sync = reduction.state.status == snapshot.status
        && reduction.state.last_sequence == snapshot.last_projected_event_sequence
        && missing_items.is_empty()
        && unexpected_items.is_empty();

    AuditReport {
        order_id: snapshot.order_id,
        in_sync,
        reduced_status: reduction.state.status,
        projected_status: snapshot.status,
        log_sequence: reduction.state.last_sequence,
        projected_sequence: snapshot.last_projected_event_sequence,
        missing_items,
        unexpected_items,
        unsupported_events: reduction.unsupported_events.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{ItemSnapshot, ItemStatus, OrderTotals, ReducedItem, ReducedState};

    fn reduction(status: OrderStatus, keys: &[&str], last_sequence: i64) -> Reduction {
        let mut state = ReducedState {
            status,
            last_sequence,
            ..Default::default()
        };
        for key in keys {
            state.items.insert(
                key.to_string(),
                ReducedItem {
                    menu_item_id: 1,
                    qty: 1,
                    price: None,
                    status: ItemStatus::Opened,
                },
            );
        }
        Reduction {
            state,
            unsupported_events: vec![],
        }
    }

    fn snapshot(status: OrderStatus, lines: &[(&str, ItemStatus)], cursor: i64) -> OrderStateSnapshot {
        OrderStateSnapshot {
            order_id: 1,
            status,
            public_slug: None,
            items: lines
                .iter()
                .enumerate()
                .map(|(i, (key, status))| ItemSnapshot {
                    id: i as i64 + 1,
                    line_key: key.to_string(),
                    menu_item_id: 1,
                    qty: 1,
                    price: 1.0,
                    status: *status,
                    station: None,
                    station_ticket_id: None,
                })
                .collect(),
            totals: OrderTotals::default(),
            last_projected_event_sequence: cursor,
            updated_at: 0,
        }
    }

    #[test]
    fn test_in_sync_ignores_removed_lines() {
        let report = compare(
            &reduction(OrderStatus::Ordered, &["A"], 4),
            &snapshot(
                OrderStatus::Ordered,
                &[("A", ItemStatus::Ordered), ("B", ItemStatus::Removed)],
                4,
            ),
        );
        assert!(report.in_sync);
    }

    #[test]
    fn test_reports_drift() {
        let report = compare(
            &reduction(OrderStatus::Paid, &["A", "B"], 6),
            &snapshot(
                OrderStatus::BillRequested,
                &[("A", ItemStatus::Paid), ("C", ItemStatus::Paid)],
                5,
            ),
        );
        assert!(!report.in_sync);
        assert_eq!(report.missing_items, vec!["B".to_string()]);
        assert_eq!(report.unexpected_items, vec!["C".to_string()]);
        assert_eq!(report.log_sequence, 6);
        assert_eq!(report.projected_sequence, 5);
    }
}
