//! Order, item and station vocabularies

use crate::types::str_enum;

str_enum! {
    /// Order lifecycle status
    ///
    /// Variants are declared in lifecycle order, so `Ord` answers
    /// "has the order reached this stage yet".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub enum OrderStatus {
        #[default]
        Opened => "opened",
        Ordered => "ordered",
        Preparing => "preparing",
        Ready => "ready",
        Delivered => "delivered",
        BillRequested => "billrequested",
        Paid => "paid",
        Closed => "closed",
    }
}

impl OrderStatus {
    /// Closed orders accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Closed)
    }

    /// Entering one of these statuses makes kitchen/bar tickets irrelevant
    pub fn clears_station_tickets(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::BillRequested
                | OrderStatus::Paid
                | OrderStatus::Closed
        )
    }

    /// Status that non-removed items take when the order moves here
    pub fn item_status(&self) -> ItemStatus {
        match self {
            OrderStatus::Opened => ItemStatus::Opened,
            OrderStatus::Ordered => ItemStatus::Ordered,
            OrderStatus::Preparing => ItemStatus::Preparing,
            OrderStatus::Ready => ItemStatus::Ready,
            OrderStatus::Delivered => ItemStatus::Delivered,
            OrderStatus::BillRequested => ItemStatus::BillRequested,
            OrderStatus::Paid => ItemStatus::Paid,
            OrderStatus::Closed => ItemStatus::Closed,
        }
    }
}

str_enum! {
    /// Order line status; mirrors the order status plus `removed`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum ItemStatus {
        #[default]
        Opened => "opened",
        Ordered => "ordered",
        Preparing => "preparing",
        Ready => "ready",
        Delivered => "delivered",
        BillRequested => "billrequested",
        Paid => "paid",
        Closed => "closed",
        Removed => "removed",
    }
}

impl ItemStatus {
    pub fn is_removed(&self) -> bool {
        matches!(self, ItemStatus::Removed)
    }
}

str_enum! {
    /// Preparation station a menu item is routed to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Station {
        Kitchen => "kitchen",
        Bar => "bar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_order() {
        assert!(OrderStatus::Opened < OrderStatus::Ordered);
        assert!(OrderStatus::BillRequested < OrderStatus::Paid);
        assert!(OrderStatus::Paid < OrderStatus::Closed);
    }

    #[test]
    fn test_ticket_clearing_statuses() {
        let clearing: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.clears_station_tickets())
            .copied()
            .collect();
        assert_eq!(
            clearing,
            vec![
                OrderStatus::Delivered,
                OrderStatus::BillRequested,
                OrderStatus::Paid,
                OrderStatus::Closed
            ]
        );
    }

    #[test]
    fn test_only_closed_is_terminal() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), *status == OrderStatus::Closed);
        }
    }
}
