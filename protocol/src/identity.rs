//! # Identity
//!
//! Covenant identifies counterparties by hex-encoded public keys, carried
//! around as plain strings. Key management, signature checks, and session
//! authentication all happen in the host layer -- a contract receives the
//! caller's address as an argument and treats it as already authenticated.
//!
//! Keeping the type a `String` alias (rather than a validated newtype) is
//! deliberate: contracts compare addresses for equality and store them, and
//! never need to interpret their contents.

/// A hex-encoded public key identifying a party, an escrow account, or the
/// factory owner.
pub type Address = String;
