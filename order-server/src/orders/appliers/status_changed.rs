//! StatusChanged event applier

use super::transition;
use crate::orders::traits::EventApplier;
use shared::order::{EventPayload, OrderEvent, ReducedState};

/// StatusChanged applier
pub struct StatusChangedApplier;

impl EventApplier for StatusChangedApplier {
    fn apply(&self, state: &mut ReducedState, event: &OrderEvent) {
        if let EventPayload::StatusChanged(change) = &event.payload {
            transition(state, change.to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::appliers::test_support::event;
    use shared::order::{OrderStatus, StatusChanged};

    fn changed(to: OrderStatus) -> EventPayload {
        EventPayload::StatusChanged(StatusChanged { from: None, to })
    }

    #[test]
    fn test_sets_status() {
        let mut state = ReducedState::default();
        StatusChangedApplier.apply(&mut state, &event(1, changed(OrderStatus::Preparing)));
        assert_eq!(state.status, OrderStatus::Preparing);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = ReducedState {
            status: OrderStatus::Closed,
            ..Default::default()
        };
        StatusChangedApplier.apply(&mut state, &event(2, changed(OrderStatus::Opened)));
        assert_eq!(state.status, OrderStatus::Closed);
    }
}
