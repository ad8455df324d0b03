//! Order Event Sourcing Module
//!
//! - **event_store**: append-only per-order log with gapless sequences and
//!   idempotency keys
//! - **reducer**: pure fold of an event list into a [`ReducedState`]
//! - **projector**: cursor-driven application of new events to the live
//!   aggregate tables
//! - **hooks**: post-commit side effects (broadcast)
//! - **manager**: emit → project → hooks, plus replay and audit
//!
//! # Architecture
//!
//! ```text
//! Guest / Staff / Webhook
//!          │ emit
//!          ▼
//!     EventStore ── order_events (append-only)
//!          │
//!          ▼
//!     Projector ─── orders / order_items / order_station_tickets
//!          │ commit
//!          ▼
//!   PostCommitHooks ── LiveOrderHub (best effort)
//!
//!     order_events ──► reduce() ──► ReducedState   (replay / audit)
//! ```
//!
//! Writers of one order are serialized twice: in-process by [`OrderLocks`],
//! and in the database by making the first statement of every write
//! transaction a write to that order's row.
//!
//! [`ReducedState`]: shared::order::ReducedState

pub mod appliers;
pub mod audit;
pub mod error;
pub mod event_store;
pub mod hooks;
pub mod locks;
pub mod manager;
pub mod money;
pub mod projector;
pub mod reducer;
pub mod snapshot;
pub mod traits;

// Re-exports
pub use audit::AuditReport;
pub use error::{StoreError, StoreResult};
pub use event_store::{EmitGuard, EmitOutcome, EventStore, NewOrderEvent};
pub use hooks::{PostCommitHook, PostCommitHooks};
pub use locks::OrderLocks;
pub use manager::OrdersManager;
pub use projector::{ProjectionOutcome, Projector};
pub use reducer::{Reduction, reduce};

// Re-export shared types for convenience
pub use shared::order::{
    EntityType, EventPayload, EventSource, OrderEvent, OrderEventType, OrderStateSnapshot,
    OrderStatus, ReducedState,
};
