//! ItemRemoved event applier
//!
//! Deletes the keyed line from the reduced state. Removals addressed only
//! by a database row id have no line key to match and are ignored here.

use super::line_key;
use crate::orders::traits::EventApplier;
use shared::order::{EventPayload, OrderEvent, ReducedState};

/// ItemRemoved applier
pub struct ItemRemovedApplier;

impl EventApplier for ItemRemovedApplier {
    fn apply(&self, state: &mut ReducedState, event: &OrderEvent) {
        if let EventPayload::ItemRemoved(removed) = &event.payload
            && let Some(key) = line_key(removed.line_key.as_deref(), event)
        {
            state.items.remove(key);
        }
    }
}
