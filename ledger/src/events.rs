//! # Vault Events
//!
//! Every committed deposit or withdrawal emits exactly one event. Rejected
//! operations emit nothing. Events are wrapped in an [`EventRecord`] that
//! carries a gap-free sequence number starting at 1, so an indexer can
//! resume from the last sequence it saw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Address, Amount};

/// A lifecycle event observed by external indexers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEvent {
    /// `amount` entered custody on behalf of `depositor`.
    DepositSuccessful { depositor: Address, amount: Amount },
    /// `amount` left custody and was paid to `depositor`.
    WithdrawSuccessful { depositor: Address, amount: Amount },
}

impl VaultEvent {
    pub fn depositor(&self) -> &Address {
        match self {
            VaultEvent::DepositSuccessful { depositor, .. }
            | VaultEvent::WithdrawSuccessful { depositor, .. } => depositor,
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            VaultEvent::DepositSuccessful { amount, .. }
            | VaultEvent::WithdrawSuccessful { amount, .. } => *amount,
        }
    }

    /// Event name as indexers see it.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::DepositSuccessful { .. } => "DepositSuccessful",
            VaultEvent::WithdrawSuccessful { .. } => "WithdrawSuccessful",
        }
    }
}

/// A sequenced, timestamped event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the vault's event log, starting at 1.
    pub seq: u64,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: VaultEvent,
}

impl EventRecord {
    pub fn new(seq: u64, event: VaultEvent) -> Self {
        Self {
            seq,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}
