//! Pure reducer
//!
//! Folds an order's events into a [`ReducedState`]. Input order does not
//! matter: events are sorted by sequence first, so every permutation of the
//! same log reduces to the same state. Events of unrecognised types are
//! returned in `unsupported_events` instead of being applied.

use super::appliers::EventAction;
use super::traits::EventApplier;
use serde::Serialize;
use shared::order::{OrderEvent, ReducedState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reduction {
    pub state: ReducedState,
    /// Unsupported events, ascending by sequence
    pub unsupported_events: Vec<OrderEvent>,
}

pub fn reduce(events: &[OrderEvent]) -> Reduction {
    let mut ordered: Vec<&OrderEvent> = events.iter().collect();
    ordered.sort_by_key(|e| (e.sequence, e.id));

    let mut state = ReducedState::default();
    let mut unsupported_events = Vec::new();

    for event in ordered {
        match EventAction::for_event(event) {
            Some(action) => action.apply(&mut state, event),
            None => unsupported_events.push(event.clone()),
        }
        state.last_sequence = state.last_sequence.max(event.sequence);
    }

    Reduction {
        state,
        unsupported_events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::appliers::test_support::event;
    use serde_json::json;
    use shared::order::{
        EventPayload, ItemAdded, ItemRemoved, ItemStatus, OrderStatus, PaymentMarker,
        StatusChanged,
    };

    fn add(sequence: i64, key: &str, menu_item_id: i64) -> OrderEvent {
        event(
            sequence,
            EventPayload::ItemAdded(ItemAdded {
                line_key: Some(key.into()),
                menu_item_id,
                qty: 1,
                price: None,
            }),
        )
    }

    fn sample_log() -> Vec<OrderEvent> {
        vec![
            add(1, "A", 10),
            add(2, "B", 11),
            event(3, EventPayload::ItemsSubmitted(Default::default())),
            event(
                4,
                EventPayload::ItemRemoved(ItemRemoved {
                    line_key: Some("A".into()),
                    item_id: None,
                }),
            ),
            event(
                5,
                EventPayload::StatusChanged(StatusChanged {
                    from: Some(OrderStatus::Ordered),
                    to: OrderStatus::Delivered,
                }),
            ),
            event(
                6,
                EventPayload::Unknown {
                    event_type: "table_moved".into(),
                    payload: json!({ "to": 7 }),
                },
            ),
            event(7, EventPayload::Paid(PaymentMarker::default())),
        ]
    }

    /// Every permutation of `items` (Heap's algorithm)
    fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
        fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
            if k <= 1 {
                out.push(items.clone());
                return;
            }
            heap(k - 1, items, out);
            for i in 0..k - 1 {
                if k % 2 == 0 {
                    items.swap(i, k - 1);
                } else {
                    items.swap(0, k - 1);
                }
                heap(k - 1, items, out);
            }
        }
        let mut items = items.to_vec();
        let mut out = Vec::new();
        heap(items.len(), &mut items, &mut out);
        out
    }

    #[test]
    fn test_reduce_sample_log() {
        let reduction = reduce(&sample_log());
        assert_eq!(reduction.state.status, OrderStatus::Paid);
        assert_eq!(reduction.state.last_sequence, 7);
        assert_eq!(reduction.state.items.len(), 1);
        assert_eq!(reduction.state.items["B"].status, ItemStatus::Paid);
        assert_eq!(reduction.unsupported_events.len(), 1);
        assert_eq!(reduction.unsupported_events[0].event_type, "table_moved");
    }

    #[test]
    fn test_reduce_is_permutation_invariant() {
        let log = sample_log();
        let expected = reduce(&log);
        let all = permutations(&log);
        assert_eq!(all.len(), 5040);
        for permutation in all {
            assert_eq!(reduce(&permutation), expected);
        }
    }

    #[test]
    fn test_empty_log() {
        let reduction = reduce(&[]);
        assert_eq!(reduction.state, ReducedState::default());
        assert!(reduction.unsupported_events.is_empty());
    }

    #[test]
    fn test_unknown_event_does_not_touch_state() {
        let unknown = event(
            1,
            EventPayload::Unknown {
                event_type: "loyalty_points".into(),
                payload: json!({}),
            },
        );
        let reduction = reduce(&[unknown]);
        assert_eq!(reduction.state.status, OrderStatus::Opened);
        assert!(reduction.state.items.is_empty());
        assert_eq!(reduction.unsupported_events.len(), 1);
    }

    #[test]
    fn test_closed_order_ignores_later_status_changes() {
        let log = vec![
            event(1, EventPayload::Closed(PaymentMarker::default())),
            event(
                2,
                EventPayload::StatusChanged(StatusChanged {
                    from: None,
                    to: OrderStatus::Opened,
                }),
            ),
        ];
        assert_eq!(reduce(&log).state.status, OrderStatus::Closed);
    }
}
