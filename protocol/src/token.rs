//! # Token Ledger
//!
//! A multi-token balance ledger with ERC20-shaped semantics: direct
//! transfers, plus `approve`/`transfer_from` for delegated deposits. Every
//! account -- a party's wallet or an escrow's custody account -- is just an
//! [`Address`] row in this ledger; contracts hold funds by owning a row,
//! not by embedding balances in their own state.
//!
//! ## Ordering Invariant
//!
//! `transfer` applies the sender debit before the recipient credit. This is
//! load-bearing: a contract that releases custody must have its bookkeeping
//! reduced before the receiving side is credited, so a transfer mechanism
//! that can call back into the contract never observes un-debited custody.
//! Keep the order if you touch this code.
//!
//! In production this state would live in the protocol's persistent store.
//! The in-memory representation here is used for validation logic and
//! testing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::identity::Address;

/// Identifier of a token type registered with the ledger. Hosts commonly use
/// the token's deployed contract address or its ticker symbol.
pub type TokenId = String;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The holder does not have enough balance for the requested movement.
    #[error(
        "insufficient balance: {holder} has {available} of {token}, requested {requested}"
    )]
    InsufficientBalance {
        /// The token being moved.
        token: TokenId,
        /// The account that was being debited.
        holder: Address,
        /// The holder's current balance.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// The spender's allowance does not cover the requested `transfer_from`.
    #[error(
        "insufficient allowance: {spender} may spend {available} of {token} from {owner}, requested {requested}"
    )]
    InsufficientAllowance {
        /// The token being moved.
        token: TokenId,
        /// The account whose funds would be spent.
        owner: Address,
        /// The account attempting the delegated spend.
        spender: Address,
        /// The current approved allowance.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// Arithmetic overflow during a credit or mint.
    #[error("balance overflow: current {current}, credit {credit} (token {token})")]
    Overflow {
        /// The token being credited.
        token: TokenId,
        /// The balance or supply before the failed credit.
        current: u64,
        /// The amount that caused the overflow.
        credit: u64,
    },
}

// ---------------------------------------------------------------------------
// TokenTransfer
// ---------------------------------------------------------------------------

/// The narrow transfer interface contracts consume.
///
/// Contracts never depend on [`TokenLedger`] directly -- only on this trait.
/// That keeps the escrow logic identical whether funds move through the
/// in-memory ledger, a persistent store, or a bridge to an external chain.
pub trait TokenTransfer {
    /// Moves `amount` of `token` from `from` to `to`.
    fn transfer(
        &mut self,
        token: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), TokenError>;

    /// Returns the balance of `holder` for `token`, zero if never credited.
    fn balance_of(&self, token: &str, holder: &str) -> u64;
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// The in-memory token ledger.
///
/// Tracks per-token balances, per-token total supply, and ERC20-style
/// allowances (`token -> owner -> spender -> amount`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Balances: `token -> (holder -> amount)`.
    balances: HashMap<TokenId, HashMap<Address, u64>>,
    /// Total minted supply per token.
    supplies: HashMap<TokenId, u64>,
    /// Delegated spend approvals: `token -> (owner -> (spender -> amount))`.
    allowances: HashMap<TokenId, HashMap<Address, HashMap<Address, u64>>>,
}

impl TokenLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints `amount` of `token` to `to`, growing total supply.
    ///
    /// Issuance policy (who may mint, against what reserves) is the host's
    /// concern; the ledger only enforces arithmetic soundness.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Overflow`] if the mint would overflow either
    /// the recipient balance or the total supply.
    pub fn mint(&mut self, token: &str, to: &str, amount: u64) -> Result<(), TokenError> {
        let supply = self.supplies.get(token).copied().unwrap_or(0);
        let new_supply = supply.checked_add(amount).ok_or(TokenError::Overflow {
            token: token.to_string(),
            current: supply,
            credit: amount,
        })?;

        let balance = self.balance_of(token, to);
        let new_balance = balance.checked_add(amount).ok_or(TokenError::Overflow {
            token: token.to_string(),
            current: balance,
            credit: amount,
        })?;

        self.supplies.insert(token.to_string(), new_supply);
        self.balances
            .entry(token.to_string())
            .or_default()
            .insert(to.to_string(), new_balance);

        debug!(token, to, amount, "minted");
        Ok(())
    }

    /// Approves `spender` to move up to `amount` of `token` out of `owner`'s
    /// account via [`transfer_from`](Self::transfer_from).
    ///
    /// Overwrites any previous approval for the same `(owner, spender)` pair.
    pub fn approve(&mut self, token: &str, owner: &str, spender: &str, amount: u64) {
        self.allowances
            .entry(token.to_string())
            .or_default()
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);

        debug!(token, owner, spender, amount, "approved");
    }

    /// Returns the remaining allowance of `spender` over `owner`'s `token`.
    pub fn allowance(&self, token: &str, owner: &str, spender: &str) -> u64 {
        self.allowances
            .get(token)
            .and_then(|owners| owners.get(owner))
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Moves `amount` of `token` from `from` to `to` on `spender`'s
    /// authority, consuming allowance.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InsufficientAllowance`] if the approval does
    /// not cover `amount`, otherwise any error of
    /// [`transfer`](TokenTransfer::transfer). The allowance is only reduced
    /// after the transfer has succeeded, so a failed call leaves both the
    /// balances and the approval untouched.
    pub fn transfer_from(
        &mut self,
        token: &str,
        spender: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), TokenError> {
        let approved = self.allowance(token, from, spender);
        if approved < amount {
            return Err(TokenError::InsufficientAllowance {
                token: token.to_string(),
                owner: from.to_string(),
                spender: spender.to_string(),
                available: approved,
                requested: amount,
            });
        }

        self.transfer(token, from, to, amount)?;

        self.allowances
            .entry(token.to_string())
            .or_default()
            .entry(from.to_string())
            .or_default()
            .insert(spender.to_string(), approved - amount);

        Ok(())
    }

    /// Returns the total minted supply of `token`, zero if never minted.
    pub fn total_supply(&self, token: &str) -> u64 {
        self.supplies.get(token).copied().unwrap_or(0)
    }
}

impl TokenTransfer for TokenLedger {
    fn transfer(
        &mut self,
        token: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), TokenError> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                token: token.to_string(),
                holder: from.to_string(),
                available,
                requested: amount,
            });
        }

        // All checks complete before any mutation. A self-transfer nets to
        // zero and cannot overflow; any other recipient is overflow-checked
        // against its pre-transfer balance.
        if from != to {
            let headroom = self.balance_of(token, to);
            headroom.checked_add(amount).ok_or(TokenError::Overflow {
                token: token.to_string(),
                current: headroom,
                credit: amount,
            })?;
        }

        // Debit before credit -- see the module-level ordering invariant.
        let accounts = self.balances.entry(token.to_string()).or_default();
        *accounts.entry(from.to_string()).or_insert(0) -= amount;
        *accounts.entry(to.to_string()).or_insert(0) += amount;

        debug!(token, from, to, amount, "transferred");
        Ok(())
    }

    fn balance_of(&self, token: &str, holder: &str) -> u64 {
        self.balances
            .get(token)
            .and_then(|accounts| accounts.get(holder))
            .copied()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
