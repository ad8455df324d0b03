//! Order Event Sourcing Module
//!
//! This module provides types for the order event sourcing system:
//! - Events: immutable, per-order sequenced facts
//! - Status: order, item and station vocabularies
//! - Snapshots: reduced state and the live broadcast view

pub mod event;
pub mod snapshot;
pub mod types;

// Re-exports
pub use event::{
    BillRequested, EntityType, EventPayload, EventSource, ItemAdded, ItemRemoved, ItemsSubmitted,
    OrderEvent, OrderEventType, PaymentMarker, PayloadError, StatusChanged,
};
pub use snapshot::{ItemSnapshot, OrderStateSnapshot, OrderTotals, ReducedItem, ReducedState};
pub use types::{ItemStatus, OrderStatus, Station};
