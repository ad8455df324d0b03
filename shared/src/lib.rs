//! Shared types for the order ledger
//!
//! Domain types used by the server and by any client that replays or renders
//! order state: event log records, status enums, live snapshots and
//! payment-domain values.

pub mod order;
pub mod payment;
pub mod types;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
pub use types::ParseEnumError;
pub use util::now_millis;
