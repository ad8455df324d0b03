//! Order state views
//!
//! - [`ReducedState`]: what a pure fold over the event log yields
//! - [`OrderStateSnapshot`]: the projected live aggregate as pushed to
//!   subscribers

use super::types::{ItemStatus, OrderStatus, Station};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line in a reduced state, keyed by line key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedItem {
    pub menu_item_id: i64,
    pub qty: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub status: ItemStatus,
}

/// Result of folding an order's events in sequence order
///
/// Items live in a `BTreeMap` so two reductions of the same log compare and
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducedState {
    pub status: OrderStatus,
    pub items: BTreeMap<String, ReducedItem>,
    /// Highest sequence folded in (0 for an empty log)
    pub last_sequence: i64,
}

/// Monetary totals of the live aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub nett: f64,
    pub tip: f64,
    pub service: f64,
    pub tax: f64,
    pub gross: f64,
}

/// Item line of the live aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: i64,
    pub line_key: String,
    pub menu_item_id: i64,
    pub qty: i64,
    pub price: f64,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<Station>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_ticket_id: Option<i64>,
}

/// Live order snapshot pushed to subscribers after each projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStateSnapshot {
    pub order_id: i64,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_slug: Option<String>,
    pub items: Vec<ItemSnapshot>,
    pub totals: OrderTotals,
    pub last_projected_event_sequence: i64,
    pub updated_at: i64,
}

impl OrderStateSnapshot {
    /// Lines that still count towards the bill
    pub fn active_items(&self) -> impl Iterator<Item = &ItemSnapshot> {
        self.items.iter().filter(|item| !item.status.is_removed())
    }
}
