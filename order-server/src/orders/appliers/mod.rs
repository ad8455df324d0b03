//! Event applier implementations
//!
//! Each applier implements the `EventApplier` trait and handles one event
//! type. Appliers are PURE functions over [`ReducedState`].

use enum_dispatch::enum_dispatch;

use crate::orders::traits::EventApplier;
use shared::order::{EventPayload, OrderEvent, OrderStatus, ReducedState};

mod item_added;
mod item_removed;
mod items_submitted;
mod status_changed;
mod status_marker;

pub use item_added::ItemAddedApplier;
pub use item_removed::ItemRemovedApplier;
pub use items_submitted::ItemsSubmittedApplier;
pub use status_changed::StatusChangedApplier;
pub use status_marker::StatusMarkerApplier;

/// EventAction enum - dispatches to concrete applier implementations
///
/// Uses enum_dispatch for zero-cost static dispatch.
#[enum_dispatch(EventApplier)]
pub enum EventAction {
    StatusChanged(StatusChangedApplier),
    ItemAdded(ItemAddedApplier),
    ItemRemoved(ItemRemovedApplier),
    ItemsSubmitted(ItemsSubmittedApplier),
    StatusMarker(StatusMarkerApplier),
}

impl EventAction {
    /// Applier for an event, `None` when the type is not supported
    pub fn for_event(event: &OrderEvent) -> Option<Self> {
        Some(match &event.payload {
            EventPayload::StatusChanged(_) => EventAction::StatusChanged(StatusChangedApplier),
            EventPayload::ItemAdded(_) => EventAction::ItemAdded(ItemAddedApplier),
            EventPayload::ItemRemoved(_) => EventAction::ItemRemoved(ItemRemovedApplier),
            EventPayload::ItemsSubmitted(_) => EventAction::ItemsSubmitted(ItemsSubmittedApplier),
            EventPayload::BillRequested(_) => {
                EventAction::StatusMarker(StatusMarkerApplier::new(OrderStatus::BillRequested))
            }
            EventPayload::Paid(_) => {
                EventAction::StatusMarker(StatusMarkerApplier::new(OrderStatus::Paid))
            }
            EventPayload::Closed(_) => {
                EventAction::StatusMarker(StatusMarkerApplier::new(OrderStatus::Closed))
            }
            EventPayload::Unknown { .. } => return None,
        })
    }
}

/// Move the order and its lines to `to`; closed orders stay closed
pub(crate) fn transition(state: &mut ReducedState, to: OrderStatus) {
    if state.status.is_terminal() || state.status == to {
        return;
    }
    state.status = to;
    let item_status = to.item_status();
    for item in state.items.values_mut() {
        item.status = item_status;
    }
}

/// Line key of an item event: payload first, then the event's entity id
pub(crate) fn line_key<'a>(payload_key: Option<&'a str>, event: &'a OrderEvent) -> Option<&'a str> {
    payload_key.or(event.entity_id.as_deref())
}
