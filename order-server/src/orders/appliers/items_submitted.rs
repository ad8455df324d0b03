//! ItemsSubmitted event applier
//!
//! Opened lines go to the stations; an opened order becomes ordered.

use super::transition;
use crate::orders::traits::EventApplier;
use shared::order::{ItemStatus, OrderEvent, OrderStatus, ReducedState};

pub struct ItemsSubmittedApplier;

impl EventApplier for ItemsSubmittedApplier {
    fn apply(&self, state: &mut ReducedState, _event: &OrderEvent) {
        let mut submitted = false;
        for item in state.items.values_mut() {
            if item.status == ItemStatus::Opened {
                item.status = ItemStatus::Ordered;
                submitted = true;
            }
        }
        if submitted && state.status == OrderStatus::Opened {
            transition(state, OrderStatus::Ordered);
        }
    }
}
