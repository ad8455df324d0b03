//! ItemAdded event applier
//!
//! Upserts the line keyed by its line key (or the event's entity id).
//! Events carrying neither key cannot be placed and leave the state as is.

use super::line_key;
use crate::orders::traits::EventApplier;
use shared::order::{EventPayload, ItemStatus, OrderEvent, ReducedItem, ReducedState};

/// ItemAdded applier
pub struct ItemAddedApplier;

impl EventApplier for ItemAddedApplier {
    fn apply(&self, state: &mut ReducedState, event: &OrderEvent) {
        if let EventPayload::ItemAdded(added) = &event.payload {
            let Some(key) = line_key(added.line_key.as_deref(), event) else {
                return;
            };
            state.items.insert(
                key.to_string(),
                ReducedItem {
                    menu_item_id: added.menu_item_id,
                    qty: added.qty,
                    price: added.price,
                    status: ItemStatus::Opened,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::appliers::test_support::event;
    use shared::order::ItemAdded;

    fn added(line_key: Option<&str>, menu_item_id: i64) -> EventPayload {
        EventPayload::ItemAdded(ItemAdded {
            line_key: line_key.map(str::to_string),
            menu_item_id,
            qty: 2,
            price: Some(4.5),
        })
    }

    #[test]
    fn test_adds_line_by_line_key() {
        let mut state = ReducedState::default();
        ItemAddedApplier.apply(&mut state, &event(1, added(Some("L1"), 10)));

        let item = &state.items["L1"];
        assert_eq!(item.menu_item_id, 10);
        assert_eq!(item.qty, 2);
        assert_eq!(item.price, Some(4.5));
    }

    #[test]
    fn test_falls_back_to_entity_id() {
        let mut state = ReducedState::default();
        let mut e = event(1, added(None, 10));
        e.entity_id = Some("L9".into());
        ItemAddedApplier.apply(&mut state, &e);
        assert!(state.items.contains_key("L9"));
    }

    #[test]
    fn test_keyless_event_is_ignored() {
        let mut state = ReducedState::default();
        ItemAddedApplier.apply(&mut state, &event(1, added(None, 10)));
        assert!(state.items.is_empty());
    }
}
