//! # Access Control
//!
//! A vault has exactly one owner, fixed at construction. The owner is the
//! custodian: it may read privileged views, but it may never act as a
//! depositor. Mixing the two roles would make the aggregate ambiguous in an
//! audit, so deposit and withdraw refuse the owner outright.

use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::types::Address;

/// Single-owner access policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    owner: Address,
}

impl AccessControl {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    /// The owner identity set at construction.
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// `true` if `caller` is the owner.
    pub fn is_owner(&self, caller: &Address) -> bool {
        *caller == self.owner
    }

    /// Guard for depositor-facing operations.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NotPermittedForOwner`] when `caller` is the owner.
    pub fn ensure_not_owner(&self, caller: &Address) -> Result<(), VaultError> {
        if self.is_owner(caller) {
            return Err(VaultError::NotPermittedForOwner {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    /// Guard for owner-only operations.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::OwnerOnly`] when `caller` is anyone else.
    pub fn ensure_owner(&self, caller: &Address) -> Result<(), VaultError> {
        if !self.is_owner(caller) {
            return Err(VaultError::OwnerOnly {
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}
