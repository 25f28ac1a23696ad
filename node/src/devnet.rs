//! # Devnet Asset Backend
//!
//! The node has no external chain to talk to, so it hosts the asset ledger
//! itself: a [`NativeBank`] for the native variant or an [`InMemoryToken`]
//! for the token variant. [`DevnetAsset`] wraps whichever one is active and
//! forwards the transfer seam to it.
//!
//! Neither backend is persisted. On boot the custodian account is seeded
//! with the restored vault aggregate so that every recorded claim is
//! backed again.

use custody_ledger::asset::{
    InMemoryToken, NativeBank, NativeCustody, TokenCustody, TokenLedger, TransferAdapter,
};
use custody_ledger::config::{
    ASSET_DECIMALS, DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SUPPLY, DEFAULT_TOKEN_SYMBOL,
};
use custody_ledger::{Address, Amount, AssetKind, TransferError};

/// Errors from the devnet-only helper endpoints.
#[derive(Debug, thiserror::Error)]
pub enum DevnetError {
    #[error("approvals only exist for token vaults")]
    NoAllowances,

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// The asset ledger a devnet node custodies against.
#[derive(Debug)]
pub enum DevnetAsset {
    Native(NativeCustody<NativeBank>),
    Token(TokenCustody<InMemoryToken>),
}

impl DevnetAsset {
    /// A native bank with `seed` issued straight to the custodian.
    pub fn native(custodian: Address, seed: Amount) -> Result<Self, TransferError> {
        let mut bank = NativeBank::new();
        if seed > 0 {
            bank.fund(&custodian, seed)?;
        }
        Ok(DevnetAsset::Native(NativeCustody::new(bank, custodian)))
    }

    /// A freshly deployed reference token. The deployer receives the default
    /// supply and the custodian receives `seed` on top.
    pub fn token(
        token_address: Address,
        deployer: &Address,
        custodian: Address,
        seed: Amount,
    ) -> Result<Self, TransferError> {
        let mut token = InMemoryToken::deploy(
            token_address,
            DEFAULT_TOKEN_NAME,
            DEFAULT_TOKEN_SYMBOL,
            ASSET_DECIMALS,
            deployer,
            DEFAULT_TOKEN_SUPPLY,
        )?;
        if seed > 0 {
            token.mint(&custodian, seed)?;
        }
        Ok(DevnetAsset::Token(TokenCustody::new(token, custodian)))
    }

    /// Issues `amount` to `account` and returns its new balance.
    pub fn faucet(&mut self, account: &Address, amount: Amount) -> Result<Amount, DevnetError> {
        match self {
            DevnetAsset::Native(custody) => {
                let bank = custody.bank_mut();
                bank.fund(account, amount).map_err(TransferError::from)?;
                Ok(bank.balance_of(account))
            }
            DevnetAsset::Token(custody) => {
                let token = custody.token_mut();
                token.mint(account, amount).map_err(TransferError::from)?;
                Ok(token.balance_of(account))
            }
        }
    }

    /// Sets `holder`'s allowance to the custodian. Token variant only.
    pub fn approve(&mut self, holder: &Address, amount: Amount) -> Result<Amount, DevnetError> {
        match self {
            DevnetAsset::Native(_) => Err(DevnetError::NoAllowances),
            DevnetAsset::Token(custody) => {
                let spender = custody.custodian().clone();
                let token = custody.token_mut();
                token.approve(holder, &spender, amount);
                Ok(token.allowance(holder, &spender))
            }
        }
    }

    /// `holder`'s balance on the asset ledger (not their vault claim).
    pub fn wallet_balance(&self, holder: &Address) -> Amount {
        match self {
            DevnetAsset::Native(custody) => custody.bank().balance_of(holder),
            DevnetAsset::Token(custody) => custody.token().balance_of(holder),
        }
    }
}

impl TransferAdapter for DevnetAsset {
    fn asset(&self) -> AssetKind {
        match self {
            DevnetAsset::Native(custody) => custody.asset(),
            DevnetAsset::Token(custody) => custody.asset(),
        }
    }

    fn custodian(&self) -> &Address {
        match self {
            DevnetAsset::Native(custody) => custody.custodian(),
            DevnetAsset::Token(custody) => custody.custodian(),
        }
    }

    fn pull(&mut self, from: &Address, amount: Amount) -> Result<(), TransferError> {
        match self {
            DevnetAsset::Native(custody) => custody.pull(from, amount),
            DevnetAsset::Token(custody) => custody.pull(from, amount),
        }
    }

    fn push(&mut self, to: &Address, amount: Amount) -> Result<(), TransferError> {
        match self {
            DevnetAsset::Native(custody) => custody.push(to, amount),
            DevnetAsset::Token(custody) => custody.push(to, amount),
        }
    }

    fn custody_balance(&self) -> Amount {
        match self {
            DevnetAsset::Native(custody) => custody.custody_balance(),
            DevnetAsset::Token(custody) => custody.custody_balance(),
        }
    }
}
