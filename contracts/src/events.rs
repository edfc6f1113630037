//! # Contract Events
//!
//! Typed records emitted by the factory and by escrow instances. Each
//! contract keeps an append-only log of the events it has emitted, exposed
//! through its `events()` accessor -- the host indexes these instead of
//! diffing contract state.
//!
//! Events are recorded only when the triggering operation succeeds; a
//! rejected call leaves the log untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use covenant_protocol::identity::Address;
use covenant_protocol::token::TokenId;

use crate::escrow_factory::Version;
use crate::payment_escrow::EscrowState;

/// Events emitted by the escrow factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactoryEvent {
    /// A version was bound (or re-bound) to an implementation beacon.
    BeaconSet {
        /// The escrow version the beacon now serves.
        version: Version,
        /// Identifier of the beacon that was installed.
        beacon: String,
    },

    /// A new escrow instance was created.
    EscrowCreated {
        /// Ledger address of the new instance.
        escrow: Address,
        /// The version it was created against.
        version: Version,
        /// The creator, now PartyA of the instance.
        party_a: Address,
        /// The counterparty, now PartyB.
        party_b: Address,
        /// Payment delay, in seconds.
        payment_delay_secs: u64,
        /// Cancellation dispute window, in seconds.
        cancel_delay_secs: u64,
        /// Re-dispute window, in seconds.
        dispute_delay_secs: u64,
    },

    /// Factory administration moved to a new owner.
    OwnershipTransferred {
        /// The owner that relinquished control.
        previous_owner: Address,
        /// The owner that now administers the factory.
        new_owner: Address,
    },
}

/// Events emitted by an escrow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEvent {
    /// The state machine moved along one of its allowed edges.
    StateChanged {
        /// The state being left.
        from: EscrowState,
        /// The state being entered.
        to: EscrowState,
        /// When the transition happened (oracle time).
        at: DateTime<Utc>,
    },

    /// Custodied funds were released to a party.
    Withdrawal {
        /// The token that was withdrawn.
        token: TokenId,
        /// The party the funds were released to.
        to: Address,
        /// The amount released.
        amount: u64,
        /// When the withdrawal happened (oracle time).
        at: DateTime<Utc>,
    },
}
