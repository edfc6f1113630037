// Copyright (c) 2026 Covenant Labs. MIT License.
// See LICENSE for details.

//! # Covenant Protocol -- Runtime Support
//!
//! The pieces of the Covenant escrow system that are *not* contract logic:
//! the collaborators the contracts consume through narrow interfaces, so the
//! contract crate stays a pure state machine.
//!
//! ## Architecture
//!
//! - **clock** -- The timestamp oracle. Contracts never read wall-clock time
//!   directly; they are handed a [`clock::Clock`]. This is what makes the
//!   delay windows testable without sleeping.
//! - **identity** -- Caller identities. Authentication happens upstream; by
//!   the time an address reaches a contract it is assumed genuine.
//! - **token** -- A multi-token ledger with ERC20-shaped transfer and
//!   allowance semantics. Contracts hold funds as ordinary ledger accounts.
//!
//! ## Design Philosophy
//!
//! 1. Contracts depend on traits, not on this crate's concrete types.
//! 2. If it touches money, arithmetic is checked. No wrapping, ever.
//! 3. Every public type is serializable -- state has to survive a restart.

pub mod clock;
pub mod identity;
pub mod token;
