//! # Covenant Contracts
//!
//! Contract logic for the Covenant payment network: two-party token-custody
//! escrow with versioned, upgradeable deployment.
//!
//! - **Payment Escrow** -- one instance per agreement; a strict state machine
//!   over payment confirmation, cancellation, and alternating disputes, with
//!   state-dependent withdrawal authority over the custodied tokens.
//! - **Escrow Factory** -- an owner-administered registry of version ->
//!   implementation beacons, and the single instantiation point for new
//!   escrows. Holds no funds itself, ever.
//! - **Events** -- typed records appended by both contracts so hosts can
//!   observe state transitions without polling.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow -- wrapping arithmetic and
//!    money do not mix.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//! 3. Time comes from an injected [`covenant_protocol::clock::Clock`], never
//!    from the wall clock.
//! 4. Every operation is all-or-nothing: a rejected call mutates nothing.
//! 5. Every public type is serializable (serde) for wire transport and
//!    persistent storage.

pub mod escrow_factory;
pub mod events;
pub mod payment_escrow;
