//! Integration tests for the payment escrow contract.
//!
//! These exercise whole agreement lifecycles against a live ledger: deposit,
//! confirmation or cancellation, dispute ping-pong across delay windows, and
//! the withdrawal authority that falls out at the end. The clock is manual --
//! every window is crossed by advancing it, never by sleeping.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use covenant_contracts::payment_escrow::{EscrowError, EscrowState, PaymentEscrow};
use covenant_protocol::clock::{Clock, ManualClock};
use covenant_protocol::token::{TokenError, TokenLedger, TokenTransfer};

const DAY: u64 = 24 * 60 * 60;
const PAYMENT_DELAY: u64 = 3 * DAY;
const CANCEL_DELAY: u64 = 3 * DAY;
const DISPUTE_DELAY: u64 = 30 * DAY;

const TOKEN: &str = "MTK";
const PARTY_A: &str = "party_a";
const PARTY_B: &str = "party_b";
const DEPOSIT: u64 = 100;

fn genesis() -> DateTime<Utc> {
    Utc.timestamp_opt(1_750_000_000, 0).unwrap()
}

/// Escrow + ledger + clock, with PartyA funded and 100 MTK already
/// deposited into the escrow's custody account.
fn funded_escrow() -> (PaymentEscrow, TokenLedger, ManualClock) {
    let clock = ManualClock::new(genesis());
    let escrow = PaymentEscrow::new(
        PARTY_A,
        PARTY_B,
        PAYMENT_DELAY,
        CANCEL_DELAY,
        DISPUTE_DELAY,
        &clock,
    );

    let mut ledger = TokenLedger::new();
    ledger.mint(TOKEN, PARTY_A, 1000).unwrap();
    ledger
        .transfer(TOKEN, PARTY_A, escrow.address(), DEPOSIT)
        .unwrap();

    (escrow, ledger, clock)
}

fn assert_not_authorized(result: std::result::Result<(), EscrowError>) {
    assert!(matches!(result.unwrap_err(), EscrowError::NotAuthorized));
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

#[test]
fn initializes_with_agreement_parameters() {
    let (escrow, ledger, _clock) = funded_escrow();

    assert_eq!(escrow.party_a(), PARTY_A);
    assert_eq!(escrow.party_b(), PARTY_B);
    assert_eq!(escrow.payment_delay_secs(), PAYMENT_DELAY);
    assert_eq!(escrow.cancel_delay_secs(), CANCEL_DELAY);
    assert_eq!(escrow.dispute_delay_secs(), DISPUTE_DELAY);
    assert_eq!(escrow.state(), EscrowState::Pending);
    assert_eq!(ledger.balance_of(TOKEN, escrow.address()), DEPOSIT);
}

// ---------------------------------------------------------------------------
// Payment Flow
// ---------------------------------------------------------------------------

#[test]
fn confirmed_payment_releases_funds_to_party_b() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    escrow.confirm_payment(PARTY_A, &clock)?;
    assert_eq!(escrow.state(), EscrowState::PaymentConfirmed);

    escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock)?;

    assert_eq!(ledger.balance_of(TOKEN, PARTY_B), DEPOSIT);
    assert_eq!(ledger.balance_of(TOKEN, escrow.address()), 0);

    // PartyA has no claim once the payment is confirmed.
    assert_not_authorized(escrow.withdraw(PARTY_A, TOKEN, 1, &mut ledger, &clock));
    Ok(())
}

#[test]
fn partial_withdrawals_sum_exactly() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();
    escrow.confirm_payment(PARTY_A, &clock)?;

    escrow.withdraw(PARTY_B, TOKEN, 30, &mut ledger, &clock)?;
    escrow.withdraw(PARTY_B, TOKEN, 45, &mut ledger, &clock)?;

    assert_eq!(ledger.balance_of(TOKEN, PARTY_B), 75);
    assert_eq!(ledger.balance_of(TOKEN, escrow.address()), DEPOSIT - 75);

    // Custody is the hard ceiling: the remaining 25 is all there is.
    let result = escrow.withdraw(PARTY_B, TOKEN, 26, &mut ledger, &clock);
    assert!(matches!(
        result.unwrap_err(),
        EscrowError::Transfer(TokenError::InsufficientBalance {
            available: 25,
            requested: 26,
            ..
        })
    ));
    Ok(())
}

#[test]
fn withdrawal_is_per_token() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    // A second token deposited alongside MTK.
    ledger.mint("WETH", PARTY_A, 10)?;
    ledger.transfer("WETH", PARTY_A, escrow.address(), 10)?;

    escrow.confirm_payment(PARTY_A, &clock)?;
    escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock)?;
    escrow.withdraw(PARTY_B, "WETH", 10, &mut ledger, &clock)?;

    assert_eq!(ledger.balance_of(TOKEN, PARTY_B), DEPOSIT);
    assert_eq!(ledger.balance_of("WETH", PARTY_B), 10);
    Ok(())
}

#[test]
fn no_withdrawal_while_pending() {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    assert_not_authorized(escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock));
    assert_not_authorized(escrow.withdraw(PARTY_A, TOKEN, DEPOSIT, &mut ledger, &clock));
    assert_eq!(ledger.balance_of(TOKEN, escrow.address()), DEPOSIT);
}

// ---------------------------------------------------------------------------
// Cancellation Flow
// ---------------------------------------------------------------------------

#[test]
fn confirmed_cancellation_refunds_party_a() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    escrow.cancel_payment(PARTY_A, &clock)?;
    escrow.confirm_cancel_payment(PARTY_B, &clock)?;
    assert_eq!(escrow.state(), EscrowState::CancelPaymentConfirmed);

    let before = ledger.balance_of(TOKEN, PARTY_A);
    escrow.withdraw(PARTY_A, TOKEN, DEPOSIT, &mut ledger, &clock)?;
    assert_eq!(ledger.balance_of(TOKEN, PARTY_A) - before, DEPOSIT);

    assert_not_authorized(escrow.withdraw(PARTY_B, TOKEN, 1, &mut ledger, &clock));
    Ok(())
}

#[test]
fn no_withdrawal_while_cancellation_is_pending() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();
    escrow.cancel_payment(PARTY_A, &clock)?;

    assert_not_authorized(escrow.withdraw(PARTY_A, TOKEN, DEPOSIT, &mut ledger, &clock));
    assert_not_authorized(escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock));
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispute Flow
// ---------------------------------------------------------------------------

#[test]
fn party_b_disputes_within_cancel_window() -> Result<()> {
    let (mut escrow, _ledger, clock) = funded_escrow();

    escrow.cancel_payment(PARTY_A, &clock)?;
    clock.advance_secs(CANCEL_DELAY); // boundary instant still counts
    escrow.dispute(PARTY_B, &clock)?;

    assert_eq!(escrow.state(), EscrowState::DisputedByPartyB);
    Ok(())
}

#[test]
fn dispute_after_cancel_window_rejected() -> Result<()> {
    let (mut escrow, _ledger, clock) = funded_escrow();

    escrow.cancel_payment(PARTY_A, &clock)?;
    clock.advance_secs(CANCEL_DELAY + 1);

    assert!(matches!(
        escrow.dispute(PARTY_B, &clock).unwrap_err(),
        EscrowError::NotAuthorized
    ));
    assert_eq!(escrow.state(), EscrowState::CancelPaymentPending);
    Ok(())
}

#[test]
fn uncontested_dispute_pays_party_b() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    escrow.cancel_payment(PARTY_A, &clock)?;
    escrow.dispute(PARTY_B, &clock)?;

    // Window still running -- neither side may touch the funds yet.
    assert_not_authorized(escrow.withdraw(PARTY_A, TOKEN, DEPOSIT, &mut ledger, &clock));
    assert_not_authorized(escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock));

    clock.advance_secs(DISPUTE_DELAY + 1);
    escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock)?;
    assert_eq!(ledger.balance_of(TOKEN, PARTY_B), DEPOSIT);

    assert_not_authorized(escrow.withdraw(PARTY_A, TOKEN, 1, &mut ledger, &clock));
    Ok(())
}

#[test]
fn uncontested_re_dispute_pays_party_a() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    escrow.cancel_payment(PARTY_A, &clock)?;
    escrow.dispute(PARTY_B, &clock)?;
    escrow.dispute(PARTY_A, &clock)?;
    assert_eq!(escrow.state(), EscrowState::DisputedByPartyA);

    assert_not_authorized(escrow.withdraw(PARTY_A, TOKEN, DEPOSIT, &mut ledger, &clock));
    assert_not_authorized(escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock));

    clock.advance_secs(DISPUTE_DELAY + 1);
    let before = ledger.balance_of(TOKEN, PARTY_A);
    escrow.withdraw(PARTY_A, TOKEN, DEPOSIT, &mut ledger, &clock)?;
    assert_eq!(ledger.balance_of(TOKEN, PARTY_A) - before, DEPOSIT);

    assert_not_authorized(escrow.withdraw(PARTY_B, TOKEN, 1, &mut ledger, &clock));
    Ok(())
}

#[test]
fn third_dispute_swings_authority_back_to_party_b() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    escrow.cancel_payment(PARTY_A, &clock)?;
    escrow.dispute(PARTY_B, &clock)?;
    escrow.dispute(PARTY_A, &clock)?;
    escrow.dispute(PARTY_B, &clock)?;
    assert_eq!(escrow.state(), EscrowState::DisputedByPartyB);

    clock.advance_secs(DISPUTE_DELAY + 1);
    escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock)?;
    assert_eq!(ledger.balance_of(TOKEN, PARTY_B), DEPOSIT);

    assert_not_authorized(escrow.withdraw(PARTY_A, TOKEN, 1, &mut ledger, &clock));
    Ok(())
}

#[test]
fn dispute_alternation_is_unbounded() -> Result<()> {
    let (mut escrow, _ledger, clock) = funded_escrow();
    escrow.cancel_payment(PARTY_A, &clock)?;
    escrow.dispute(PARTY_B, &clock)?;

    // Ten more flips, each just inside the window of the one before.
    for round in 0..10 {
        clock.advance_secs(DISPUTE_DELAY - 1);
        let (caller, expected) = if round % 2 == 0 {
            (PARTY_A, EscrowState::DisputedByPartyA)
        } else {
            (PARTY_B, EscrowState::DisputedByPartyB)
        };
        escrow.dispute(caller, &clock)?;
        assert_eq!(escrow.state(), expected);
        assert_eq!(escrow.state_changed_at(), clock.now());
    }
    Ok(())
}

#[test]
fn expired_counter_dispute_settles_for_the_last_disputant() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    // PartyA cancels; PartyB disputes one second later; PartyA answers a
    // second after that. PartyB then oversleeps its window by one second.
    escrow.cancel_payment(PARTY_A, &clock)?;
    clock.advance_secs(1);
    escrow.dispute(PARTY_B, &clock)?;
    clock.advance_secs(1);
    escrow.dispute(PARTY_A, &clock)?;

    clock.advance_secs(DISPUTE_DELAY + 1);
    assert!(matches!(
        escrow.dispute(PARTY_B, &clock).unwrap_err(),
        EscrowError::NotAuthorized
    ));

    // PartyA's dispute stood uncontested; the funds are PartyA's.
    escrow.withdraw(PARTY_A, TOKEN, DEPOSIT, &mut ledger, &clock)?;
    assert_eq!(ledger.balance_of(TOKEN, escrow.address()), 0);
    Ok(())
}

#[test]
fn withdrawal_at_window_boundary_is_still_denied() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();

    escrow.cancel_payment(PARTY_A, &clock)?;
    escrow.dispute(PARTY_B, &clock)?;

    // At exactly the boundary the counter-dispute is still possible, so
    // withdrawal authority has not vested yet.
    clock.advance_secs(DISPUTE_DELAY);
    assert_not_authorized(escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock));

    clock.advance_secs(1);
    escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Late Deposits
// ---------------------------------------------------------------------------

#[test]
fn deposits_after_settlement_remain_withdrawable() -> Result<()> {
    let (mut escrow, mut ledger, clock) = funded_escrow();
    escrow.confirm_payment(PARTY_A, &clock)?;
    escrow.withdraw(PARTY_B, TOKEN, DEPOSIT, &mut ledger, &clock)?;

    // A top-up arriving after settlement is governed by the same authority.
    ledger.transfer(TOKEN, PARTY_A, escrow.address(), 50)?;
    escrow.withdraw(PARTY_B, TOKEN, 50, &mut ledger, &clock)?;

    assert_eq!(ledger.balance_of(TOKEN, PARTY_B), DEPOSIT + 50);
    Ok(())
}
