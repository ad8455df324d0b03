//! Applier for marker events that move an order forward
//! (`bill_requested`, `paid`, `closed`)
//!
//! A marker never moves an order backwards: an order already at or past the
//! target stage is left alone.

use super::transition;
use crate::orders::traits::EventApplier;
use shared::order::{OrderEvent, OrderStatus, ReducedState};

pub struct StatusMarkerApplier {
    target: OrderStatus,
}

impl StatusMarkerApplier {
    pub fn new(target: OrderStatus) -> Self {
        Self { target }
    }
}

impl EventApplier for StatusMarkerApplier {
    fn apply(&self, state: &mut ReducedState, _event: &OrderEvent) {
        if state.status >= self.target {
            return;
        }
        transition(state, self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::appliers::test_support::event;
    use shared::order::{EventPayload, PaymentMarker};

    #[test]
    fn test_paid_moves_forward() {
        let mut state = ReducedState {
            status: OrderStatus::BillRequested,
            ..Default::default()
        };
        let paid = event(3, EventPayload::Paid(PaymentMarker::default()));
        StatusMarkerApplier::new(OrderStatus::Paid).apply(&mut state, &paid);
        assert_eq!(state.status, OrderStatus::Paid);
    }

    #[test]
    fn test_bill_request_after_payment_is_ignored() {
        let mut state = ReducedState {
            status: OrderStatus::Paid,
            ..Default::default()
        };
        let bill = event(4, EventPayload::BillRequested(Default::default()));
        StatusMarkerApplier::new(OrderStatus::BillRequested).apply(&mut state, &bill);
        assert_eq!(state.status, OrderStatus::Paid);
    }
}
