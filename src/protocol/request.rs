use std::sync::Arc;

use super::error::SlaveError;

/// Request against a writable table (coils or holding registers).
///
/// `args` carries the values to write; it is empty for reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RwRequest<T> {
    pub unit_id: u8,
    pub addr: u16,
    pub quantity: u16,
    pub is_write: bool,
    pub args: Vec<T>,
}

impl<T> RwRequest<T> {
    pub fn read(unit_id: u8, addr: u16, quantity: u16) -> Self {
        Self {
            unit_id,
            addr,
            quantity,
            is_write: false,
            args: Vec::new(),
        }
    }

    pub fn write_single(unit_id: u8, addr: u16, value: T) -> Self {
        Self {
            unit_id,
            addr,
            quantity: 1,
            is_write: true,
            args: vec![value],
        }
    }

    /// Quantities above 65535 are clamped; the adapter then reports the
    /// shortfall as a quantity mismatch.
    pub fn write_multiple(unit_id: u8, addr: u16, values: Vec<T>) -> Self {
        Self {
            unit_id,
            addr,
            quantity: u16::try_from(values.len()).unwrap_or(u16::MAX),
            is_write: true,
            args: values,
        }
    }
}

/// Request against a read-only table (discrete inputs or input registers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadRequest {
    pub unit_id: u8,
    pub addr: u16,
    pub quantity: u16,
}

impl ReadRequest {
    pub fn new(unit_id: u8, addr: u16, quantity: u16) -> Self {
        Self {
            unit_id,
            addr,
            quantity,
        }
    }
}

pub type CoilsRequest = RwRequest<bool>;
pub type HoldingRegistersRequest = RwRequest<u16>;
pub type DiscreteInputsRequest = ReadRequest;
pub type InputRegistersRequest = ReadRequest;

/// Result of one pipeline stage.
///
/// `values` is `None` for writes and for failed reads. Once the reply has
/// passed the fallback stage it is always `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    pub values: Option<Vec<T>>,
    pub error: Option<SlaveError>,
}

impl<T> Reply<T> {
    pub fn values(values: Vec<T>) -> Self {
        Self {
            values: Some(values),
            error: None,
        }
    }

    pub fn written() -> Self {
        Self {
            values: None,
            error: None,
        }
    }

    pub fn failed(error: SlaveError) -> Self {
        Self {
            values: None,
            error: Some(error),
        }
    }

    pub fn from_read(result: Result<Vec<T>, SlaveError>) -> Self {
        match result {
            Ok(values) => Self::values(values),
            Err(err) => Self::failed(err),
        }
    }

    pub fn from_write(result: Result<(), SlaveError>) -> Self {
        match result {
            Ok(()) => Self::written(),
            Err(err) => Self::failed(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Error wins over values; a successful reply without values yields an
    /// empty vector.
    pub fn into_result(self) -> Result<Vec<T>, SlaveError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.values.unwrap_or_default()),
        }
    }
}

/// One stage of the slave request pipeline.
///
/// Implementations must be callable from several connections at once.
pub trait RequestHandler: Send + Sync {
    fn handle_coils(&self, req: &CoilsRequest) -> Reply<bool>;
    fn handle_discrete_inputs(&self, req: &DiscreteInputsRequest) -> Reply<bool>;
    fn handle_holding_registers(&self, req: &HoldingRegistersRequest) -> Reply<u16>;
    fn handle_input_registers(&self, req: &InputRegistersRequest) -> Reply<u16>;
}

impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    fn handle_coils(&self, req: &CoilsRequest) -> Reply<bool> {
        (**self).handle_coils(req)
    }

    fn handle_discrete_inputs(&self, req: &DiscreteInputsRequest) -> Reply<bool> {
        (**self).handle_discrete_inputs(req)
    }

    fn handle_holding_registers(&self, req: &HoldingRegistersRequest) -> Reply<u16> {
        (**self).handle_holding_registers(req)
    }

    fn handle_input_registers(&self, req: &InputRegistersRequest) -> Reply<u16> {
        (**self).handle_input_registers(req)
    }
}
