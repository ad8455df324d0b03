//! Payment vocabularies

use crate::types::str_enum;

str_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum PaymentProvider {
        Stripe => "stripe",
    }
}

str_enum! {
    /// Domain entity a ledger row is about
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum LedgerEntityType {
        PaymentAttempt => "payment_attempt",
        Refund => "refund",
    }
}

str_enum! {
    /// Normalized ledger event type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum LedgerEventType {
        Created => "created",
        Succeeded => "succeeded",
        Failed => "failed",
        Refunded => "refunded",
    }
}

str_enum! {
    /// Status shared by payment attempts, refunds and split payments
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum PaymentStatus {
        #[default]
        Pending => "pending",
        Succeeded => "succeeded",
        Failed => "failed",
    }
}

str_enum! {
    /// Connected merchant account state at the provider
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MerchantAccountStatus {
        Onboarding => "onboarding",
        Restricted => "restricted",
        Enabled => "enabled",
    }
}

impl MerchantAccountStatus {
    /// Derive the account status from the provider's capability flags
    pub fn from_flags(charges_enabled: bool, payouts_enabled: bool, details_submitted: bool) -> Self {
        if charges_enabled && payouts_enabled {
            MerchantAccountStatus::Enabled
        } else if details_submitted {
            MerchantAccountStatus::Restricted
        } else {
            MerchantAccountStatus::Onboarding
        }
    }
}
