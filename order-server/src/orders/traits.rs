//! Reducer seam

use enum_dispatch::enum_dispatch;
use shared::order::{OrderEvent, ReducedState};

// `#[enum_dispatch]` expands `impl EventApplier for EventAction` here, so the
// enum and every variant type must be in scope.
#[allow(unused_imports)]
use super::appliers::{
    EventAction, ItemAddedApplier, ItemRemovedApplier, ItemsSubmittedApplier,
    StatusChangedApplier, StatusMarkerApplier,
};

/// Applies one event to a reduced state.
///
/// Implementations are PURE: no I/O, no clock, no randomness. The same
/// event applied to the same state always yields the same state.
#[enum_dispatch]
pub trait EventApplier {
    fn apply(&self, state: &mut ReducedState, event: &OrderEvent);
}
