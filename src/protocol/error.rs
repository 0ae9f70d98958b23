use derive_more::{Display, Error};

use super::types::RegisterMode;

/// Errors produced by the slave request pipeline.
///
/// None of these are fatal: each one is reported back to the transport,
/// which turns it into a Modbus exception response.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SlaveError {
    /// A get/set referenced an address that was never seeded.
    #[display("no {kind} at address {address}")]
    AddressNotFound { kind: RegisterMode, address: u16 },

    /// The request targets a unit id this slave does not answer for.
    #[display("unit id {unit_id} is not served by this slave (expected {expected})")]
    UnsupportedUnit { unit_id: u8, expected: u8 },

    /// A range operation failed part way; `address` is the exact address
    /// that failed.
    #[display("{operation} failed at address {address}: {source}")]
    Range {
        operation: &'static str,
        address: u16,
        source: Box<SlaveError>,
    },

    #[display("{count} {kind} values starting at {address} run past address 65535")]
    AddressOverflow {
        kind: RegisterMode,
        address: u16,
        count: u16,
    },

    #[display("request quantity is {quantity} but {provided} values were supplied")]
    QuantityMismatch { quantity: u16, provided: usize },
}

impl SlaveError {
    /// Address this error refers to, if it names one.
    pub fn address(&self) -> Option<u16> {
        match self {
            Self::AddressNotFound { address, .. } | Self::Range { address, .. } => Some(*address),
            Self::AddressOverflow { address, .. } => Some(*address),
            Self::UnsupportedUnit { .. } | Self::QuantityMismatch { .. } => None,
        }
    }

    /// Innermost error with range context peeled off.
    pub fn root_cause(&self) -> &SlaveError {
        match self {
            Self::Range { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_address_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::AddressNotFound { .. })
    }

    /// Attach range context to a missing-address failure. Other errors are
    /// returned untouched.
    pub(crate) fn in_range(self, operation: &'static str) -> SlaveError {
        if let Self::AddressNotFound { address, .. } = &self {
            let address = *address;
            return Self::Range {
                operation,
                address,
                source: Box::new(self),
            };
        }
        self
    }
}
