//! Payments Module
//!
//! Inbound provider webhooks become an immutable ledger row plus, for
//! successful payments, `paid` / `closed` order events.
//!
//! - **classify**: pure normalization of provider event types and payloads
//! - **ledger**: append-only `(provider, provider_event_id)` log
//! - **settlement**: guarded `paid` / `closed` emission (split aware)
//! - **accounts**: merchant account capability sync
//! - **ingestor**: the pipeline tying them together

pub mod accounts;
pub mod classify;
pub mod error;
pub mod ingestor;
pub mod ledger;
pub mod settlement;

pub use error::{IngestError, IngestResult, LedgerError, LedgerResult};
pub use ingestor::{IngestReport, WebhookIngestor};
pub use ledger::{AppendOutcome, Ledger, LedgerEvent, NewLedgerEvent};
pub use settlement::{SettlementKeys, SettlementOutcome};
