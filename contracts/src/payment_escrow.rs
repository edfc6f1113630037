//! # Payment Escrow Contract
//!
//! One instance per agreement between two fixed counterparties. PartyA owes
//! PartyB for something delivered off-chain; the escrow custodies the
//! payment tokens and arbitrates who may take them out, purely through a
//! state machine:
//!
//! ```text
//!                     confirmPayment (A)
//!   Pending ─────────────────────────────────▶ PaymentConfirmed
//!      │                                          (B withdraws)
//!      │ cancelPayment (A)
//!      ▼
//!   CancelPaymentPending ──────────────────▶ CancelPaymentConfirmed
//!      │        confirmCancelPayment (B)        (A withdraws)
//!      │ dispute (B, within cancel delay)
//!      ▼
//!   DisputedByPartyB ◀──────────────────▶ DisputedByPartyA
//!         dispute (A/B, within dispute delay, alternating)
//! ```
//!
//! Dispute alternation is unbounded: each flip restarts the dispute window,
//! and whichever disputed state survives its own window uncontested gains
//! withdrawal authority. There is no terminal flag -- terminality is defined
//! operationally by who may withdraw.
//!
//! ## Authorization Model
//!
//! Role checks, state checks on disputes, and time-window checks are folded
//! into a single [`EscrowError::NotAuthorized`] rejection. The contract
//! intentionally does not reveal which precondition failed: a caller probing
//! errors cannot distinguish "wrong party" from "window almost expired",
//! which shrinks the griefing surface. Replaying confirm/cancel operations
//! after the machine has moved on is the one case reported separately, as
//! [`EscrowError::IncorrectState`].
//!
//! Deposits are ordinary ledger transfers to the instance's address
//! ([`PaymentEscrow::address`]); the escrow does not observe them and never
//! needs to.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use covenant_protocol::clock::Clock;
use covenant_protocol::identity::Address;
use covenant_protocol::token::{TokenError, TokenTransfer};

use crate::events::EscrowEvent;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during escrow operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// The caller, the current state, or the elapsed time does not permit
    /// the attempted operation. Deliberately opaque about which one.
    #[error("not authorized")]
    NotAuthorized,

    /// The operation is defined, but the state machine has already left the
    /// state it requires.
    #[error("incorrect state: escrow is {current}, expected {expected}")]
    IncorrectState {
        /// The escrow's current state.
        current: EscrowState,
        /// The state required for this operation.
        expected: String,
    },

    /// The ledger refused the withdrawal transfer.
    #[error("token transfer failed: {0}")]
    Transfer(#[from] TokenError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The control state of a payment escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowState {
    /// Created; PartyA has neither confirmed nor cancelled yet.
    Pending,
    /// PartyA confirmed the payment. PartyB may withdraw.
    PaymentConfirmed,
    /// PartyA asked to cancel; PartyB may confirm or dispute.
    CancelPaymentPending,
    /// PartyB agreed to the cancellation. PartyA may withdraw.
    CancelPaymentConfirmed,
    /// PartyA holds the latest dispute. Withdrawal opens to PartyA once the
    /// dispute window lapses uncontested.
    DisputedByPartyA,
    /// PartyB holds the latest dispute. Symmetric to [`DisputedByPartyA`].
    ///
    /// [`DisputedByPartyA`]: EscrowState::DisputedByPartyA
    DisputedByPartyB,
}

impl std::fmt::Display for EscrowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowState::Pending => write!(f, "Pending"),
            EscrowState::PaymentConfirmed => write!(f, "PaymentConfirmed"),
            EscrowState::CancelPaymentPending => write!(f, "CancelPaymentPending"),
            EscrowState::CancelPaymentConfirmed => write!(f, "CancelPaymentConfirmed"),
            EscrowState::DisputedByPartyA => write!(f, "DisputedByPartyA"),
            EscrowState::DisputedByPartyB => write!(f, "DisputedByPartyB"),
        }
    }
}

/// A two-party payment escrow instance.
///
/// Created by the factory (or directly, for hosts that manage their own
/// deployment). Parties, delays, and the instance address are fixed at
/// creation; only `state` and `state_changed_at` ever change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEscrow {
    /// Unique instance ID; doubles as the ledger address custodying funds.
    escrow_id: Address,
    /// The paying party. Confirms or cancels the payment.
    party_a: Address,
    /// The receiving party. Confirms cancellation or disputes it.
    party_b: Address,
    /// Payment delay, in seconds. Recorded and exposed for the agreement's
    /// terms; no transition is gated on it.
    payment_delay_secs: u64,
    /// How long PartyB may dispute after PartyA requests cancellation.
    cancel_delay_secs: u64,
    /// How long the opposing party may counter after each dispute flip.
    dispute_delay_secs: u64,
    /// Current control state.
    state: EscrowState,
    /// Oracle time of the most recent transition; anchors every window.
    state_changed_at: DateTime<Utc>,
    /// Oracle time of creation.
    created_at: DateTime<Utc>,
    /// Everything this instance has emitted, in order.
    events: Vec<EscrowEvent>,
}

impl PaymentEscrow {
    /// Creates a new escrow in `Pending` state between `party_a` (the
    /// caller-to-be-payer) and `party_b`, with all three delay parameters
    /// fixed for the instance's lifetime.
    pub fn new(
        party_a: impl Into<Address>,
        party_b: impl Into<Address>,
        payment_delay_secs: u64,
        cancel_delay_secs: u64,
        dispute_delay_secs: u64,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            escrow_id: Uuid::new_v4().to_string(),
            party_a: party_a.into(),
            party_b: party_b.into(),
            payment_delay_secs,
            cancel_delay_secs,
            dispute_delay_secs,
            state: EscrowState::Pending,
            state_changed_at: now,
            created_at: now,
            events: Vec::new(),
        }
    }

    /// PartyA confirms the payment, releasing withdrawal authority to
    /// PartyB.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::IncorrectState`] unless the escrow is
    /// `Pending`, and [`EscrowError::NotAuthorized`] unless the caller is
    /// PartyA.
    pub fn confirm_payment(&mut self, caller: &str, clock: &dyn Clock) -> Result<(), EscrowError> {
        self.require_state(EscrowState::Pending)?;
        if caller != self.party_a {
            return Err(EscrowError::NotAuthorized);
        }
        self.transition(EscrowState::PaymentConfirmed, clock.now());
        Ok(())
    }

    /// PartyA requests cancellation of the payment.
    ///
    /// PartyB then has `cancel_delay_secs` to dispute; confirming the
    /// cancellation instead hands withdrawal authority back to PartyA.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::IncorrectState`] unless the escrow is
    /// `Pending`, and [`EscrowError::NotAuthorized`] unless the caller is
    /// PartyA.
    pub fn cancel_payment(&mut self, caller: &str, clock: &dyn Clock) -> Result<(), EscrowError> {
        self.require_state(EscrowState::Pending)?;
        if caller != self.party_a {
            return Err(EscrowError::NotAuthorized);
        }
        self.transition(EscrowState::CancelPaymentPending, clock.now());
        Ok(())
    }

    /// PartyB accepts PartyA's cancellation request.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::IncorrectState`] unless the escrow is
    /// `CancelPaymentPending`, and [`EscrowError::NotAuthorized`] unless the
    /// caller is PartyB.
    pub fn confirm_cancel_payment(
        &mut self,
        caller: &str,
        clock: &dyn Clock,
    ) -> Result<(), EscrowError> {
        self.require_state(EscrowState::CancelPaymentPending)?;
        if caller != self.party_b {
            return Err(EscrowError::NotAuthorized);
        }
        self.transition(EscrowState::CancelPaymentConfirmed, clock.now());
        Ok(())
    }

    /// Disputes the current outcome, flipping custody authority to the
    /// caller's side.
    ///
    /// Exactly three (caller, state, window) combinations are admitted:
    ///
    /// | caller | from | within |
    /// |---|---|---|
    /// | PartyB | `CancelPaymentPending` | `cancel_delay_secs` |
    /// | PartyA | `DisputedByPartyB` | `dispute_delay_secs` |
    /// | PartyB | `DisputedByPartyA` | `dispute_delay_secs` |
    ///
    /// Each successful flip re-anchors the window at its own transition
    /// time, so alternation can continue indefinitely while both sides keep
    /// answering in time.
    ///
    /// # Errors
    ///
    /// Every other combination -- wrong caller, wrong state, or an expired
    /// window -- is [`EscrowError::NotAuthorized`], with no further detail.
    pub fn dispute(&mut self, caller: &str, clock: &dyn Clock) -> Result<(), EscrowError> {
        let now = clock.now();
        let next = match self.state {
            EscrowState::CancelPaymentPending
                if caller == self.party_b && self.within_window(self.cancel_delay_secs, now) =>
            {
                EscrowState::DisputedByPartyB
            }
            EscrowState::DisputedByPartyB
                if caller == self.party_a && self.within_window(self.dispute_delay_secs, now) =>
            {
                EscrowState::DisputedByPartyA
            }
            EscrowState::DisputedByPartyA
                if caller == self.party_b && self.within_window(self.dispute_delay_secs, now) =>
            {
                EscrowState::DisputedByPartyB
            }
            _ => return Err(EscrowError::NotAuthorized),
        };
        self.transition(next, now);
        Ok(())
    }

    /// Withdraws `amount` of `token` from the instance's custody account to
    /// the caller.
    ///
    /// Does not change `state`: while authorization holds, a party may take
    /// partial amounts across as many calls and token types as it likes.
    /// The ledger debits the custody account before crediting the caller
    /// (see the ordering invariant in `covenant_protocol::token`), so even a
    /// transfer mechanism that re-enters cannot double-spend custody.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NotAuthorized`] unless the (caller, state,
    /// elapsed-time) triple is authorized per [`can_withdraw`], and
    /// [`EscrowError::Transfer`] if custody does not cover `amount`.
    ///
    /// [`can_withdraw`]: Self::can_withdraw
    pub fn withdraw(
        &mut self,
        caller: &str,
        token: &str,
        amount: u64,
        tokens: &mut dyn TokenTransfer,
        clock: &dyn Clock,
    ) -> Result<(), EscrowError> {
        let now = clock.now();
        if !self.can_withdraw(caller, now) {
            return Err(EscrowError::NotAuthorized);
        }

        tokens.transfer(token, &self.escrow_id, caller, amount)?;

        self.events.push(EscrowEvent::Withdrawal {
            token: token.to_string(),
            to: caller.to_string(),
            amount,
            at: now,
        });
        Ok(())
    }

    /// Whether `caller` holds withdrawal authority at instant `now`.
    ///
    /// - `PaymentConfirmed` -- PartyB, unconditionally.
    /// - `CancelPaymentConfirmed` -- PartyA, unconditionally.
    /// - `DisputedByPartyB` -- PartyB, once the counter-dispute window has
    ///   lapsed.
    /// - `DisputedByPartyA` -- PartyA, symmetric.
    /// - `Pending` / `CancelPaymentPending` -- nobody.
    pub fn can_withdraw(&self, caller: &str, now: DateTime<Utc>) -> bool {
        match self.state {
            EscrowState::PaymentConfirmed => caller == self.party_b,
            EscrowState::CancelPaymentConfirmed => caller == self.party_a,
            EscrowState::DisputedByPartyB => {
                caller == self.party_b && !self.within_window(self.dispute_delay_secs, now)
            }
            EscrowState::DisputedByPartyA => {
                caller == self.party_a && !self.within_window(self.dispute_delay_secs, now)
            }
            EscrowState::Pending | EscrowState::CancelPaymentPending => false,
        }
    }

    /// The instance's unique ID.
    pub fn escrow_id(&self) -> &str {
        &self.escrow_id
    }

    /// The ledger address custodying this agreement's funds. Deposits are
    /// plain transfers to this address.
    pub fn address(&self) -> &str {
        &self.escrow_id
    }

    /// The paying party.
    pub fn party_a(&self) -> &str {
        &self.party_a
    }

    /// The receiving party.
    pub fn party_b(&self) -> &str {
        &self.party_b
    }

    /// Payment delay, in seconds.
    pub fn payment_delay_secs(&self) -> u64 {
        self.payment_delay_secs
    }

    /// Cancellation dispute window, in seconds.
    pub fn cancel_delay_secs(&self) -> u64 {
        self.cancel_delay_secs
    }

    /// Re-dispute window, in seconds.
    pub fn dispute_delay_secs(&self) -> u64 {
        self.dispute_delay_secs
    }

    /// Current control state.
    pub fn state(&self) -> EscrowState {
        self.state
    }

    /// Oracle time of the most recent state transition.
    pub fn state_changed_at(&self) -> DateTime<Utc> {
        self.state_changed_at
    }

    /// Oracle time of creation.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Every event this instance has emitted, oldest first.
    pub fn events(&self) -> &[EscrowEvent] {
        &self.events
    }

    fn require_state(&self, expected: EscrowState) -> Result<(), EscrowError> {
        if self.state != expected {
            return Err(EscrowError::IncorrectState {
                current: self.state,
                expected: expected.to_string(),
            });
        }
        Ok(())
    }

    /// A window of `delay_secs` anchored at the last transition admits `now`
    /// up to and including the boundary instant.
    fn within_window(&self, delay_secs: u64, now: DateTime<Utc>) -> bool {
        now <= self.state_changed_at + Duration::seconds(delay_secs as i64)
    }

    fn transition(&mut self, to: EscrowState, now: DateTime<Utc>) {
        let from = self.state;
        self.state = to;
        self.state_changed_at = now;
        self.events.push(EscrowEvent::StateChanged { from, to, at: now });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
