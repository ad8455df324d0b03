//! Payment domain types
//!
//! - Ledger classification (entity/event types)
//! - Status vocabularies for attempts, refunds, split payments, merchant accounts
//! - [`ProviderEvent`]: an inbound provider webhook envelope

pub mod types;
pub mod webhook;

pub use types::{
    LedgerEntityType, LedgerEventType, MerchantAccountStatus, PaymentProvider, PaymentStatus,
};
pub use webhook::{ProviderEvent, WebhookParseError};
