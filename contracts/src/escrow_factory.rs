//! # Escrow Factory Contract
//!
//! The single instantiation point for payment escrows, and the registry
//! that makes their logic upgradeable: each escrow *version* is bound to a
//! beacon, an indirection record naming the implementation template
//! currently serving that version. Re-binding a version's beacon upgrades
//! what future `create_escrow` calls deploy, without touching the factory.
//!
//! The factory is a pure registry -- it never custodies funds and it drops
//! out of the picture the moment an escrow is created. Administration
//! (binding beacons, handing over ownership) is owner-gated; creation is
//! open to anyone.

use std::collections::HashMap;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use covenant_protocol::clock::Clock;
use covenant_protocol::identity::Address;

use crate::events::FactoryEvent;
use crate::payment_escrow::PaymentEscrow;

/// An escrow logic version. Versions start at 1 -- zero is unrepresentable,
/// so an unset "version 0" can never resolve by accident.
pub type Version = NonZeroU32;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during factory operations.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The caller is not the factory owner.
    #[error("caller {caller} is not the factory owner")]
    NotOwner {
        /// The address that attempted the owner-only operation.
        caller: Address,
    },

    /// No beacon has been bound for the requested version.
    #[error("no escrow beacon found for version {0}")]
    NoBeaconFound(Version),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An upgrade beacon: binds a version to its current implementation
/// template.
///
/// The `implementation` field is an opaque reference (a template name, a
/// code hash, a deployed address) -- the factory records and reports it but
/// never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowBeacon {
    /// Unique identifier of this beacon.
    pub beacon_id: String,
    /// Opaque reference to the implementation template behind the beacon.
    pub implementation: String,
}

impl EscrowBeacon {
    /// Creates a beacon pointing at `implementation`.
    pub fn new(implementation: impl Into<String>) -> Self {
        Self {
            beacon_id: Uuid::new_v4().to_string(),
            implementation: implementation.into(),
        }
    }
}

/// The escrow factory -- version registry plus instantiation point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowFactory {
    /// The administrative identity. Set once at construction, transferable.
    owner: Address,
    /// Version bindings. Absence of a version is an observable condition
    /// ([`FactoryError::NoBeaconFound`]), never a silent default.
    beacons: HashMap<Version, EscrowBeacon>,
    /// Everything this factory has emitted, in order.
    events: Vec<FactoryEvent>,
}

impl EscrowFactory {
    /// Creates a factory administered by `owner`, with no versions bound.
    pub fn new(owner: impl Into<Address>) -> Self {
        Self {
            owner: owner.into(),
            beacons: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Binds `version` to `beacon`, overwriting any existing binding.
    ///
    /// Overwriting is how upgrades roll out: future escrows created against
    /// `version` follow the new beacon; existing instances are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::NotOwner`] unless the caller is the current
    /// owner.
    pub fn set_beacon(
        &mut self,
        caller: &str,
        version: Version,
        beacon: EscrowBeacon,
    ) -> Result<(), FactoryError> {
        self.require_owner(caller)?;

        self.events.push(FactoryEvent::BeaconSet {
            version,
            beacon: beacon.beacon_id.clone(),
        });
        self.beacons.insert(version, beacon);
        Ok(())
    }

    /// Creates a new escrow against `version`'s beacon. Open to anyone: the
    /// caller becomes PartyA, `counterparty` becomes PartyB.
    ///
    /// The returned instance starts `Pending` with its windows anchored at
    /// the oracle's current time. The factory keeps no reference to it --
    /// from here on the parties deal with the escrow directly.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::NoBeaconFound`] if `version` has no bound
    /// beacon.
    #[allow(clippy::too_many_arguments)]
    pub fn create_escrow(
        &mut self,
        caller: &str,
        version: Version,
        counterparty: &str,
        payment_delay_secs: u64,
        cancel_delay_secs: u64,
        dispute_delay_secs: u64,
        clock: &dyn Clock,
    ) -> Result<PaymentEscrow, FactoryError> {
        if !self.beacons.contains_key(&version) {
            return Err(FactoryError::NoBeaconFound(version));
        }

        let escrow = PaymentEscrow::new(
            caller,
            counterparty,
            payment_delay_secs,
            cancel_delay_secs,
            dispute_delay_secs,
            clock,
        );

        self.events.push(FactoryEvent::EscrowCreated {
            escrow: escrow.address().to_string(),
            version,
            party_a: caller.to_string(),
            party_b: counterparty.to_string(),
            payment_delay_secs,
            cancel_delay_secs,
            dispute_delay_secs,
        });
        Ok(escrow)
    }

    /// Hands factory administration to `new_owner`.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::NotOwner`] unless the caller is the current
    /// owner.
    pub fn transfer_ownership(
        &mut self,
        caller: &str,
        new_owner: impl Into<Address>,
    ) -> Result<(), FactoryError> {
        self.require_owner(caller)?;

        let new_owner = new_owner.into();
        self.events.push(FactoryEvent::OwnershipTransferred {
            previous_owner: self.owner.clone(),
            new_owner: new_owner.clone(),
        });
        self.owner = new_owner;
        Ok(())
    }

    /// The current administrative owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The beacon bound to `version`, if any.
    pub fn beacon_for(&self, version: Version) -> Option<&EscrowBeacon> {
        self.beacons.get(&version)
    }

    /// Every event this factory has emitted, oldest first.
    pub fn events(&self) -> &[FactoryEvent] {
        &self.events
    }

    fn require_owner(&self, caller: &str) -> Result<(), FactoryError> {
        if caller != self.owner {
            return Err(FactoryError::NotOwner {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
