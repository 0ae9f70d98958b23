use std::sync::Arc;

use super::{error::SlaveError, store::DataStore};

/// Range layer between request routing and the store.
///
/// Single writes pass store errors through untouched; range failures are
/// wrapped so the caller learns the exact address that failed.
pub struct RegisterHandler<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for RegisterHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DataStore + ?Sized> RegisterHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn read_coils(&self, addr: u16, count: u16) -> Result<Vec<bool>, SlaveError> {
        log::debug!("read coils: addr={addr}, count={count}");
        self.store
            .get_coils(addr, count)
            .map_err(|err| err.in_range("read coils"))
    }

    pub fn read_discrete_inputs(&self, addr: u16, count: u16) -> Result<Vec<bool>, SlaveError> {
        log::debug!("read discrete inputs: addr={addr}, count={count}");
        self.store
            .get_discrete_inputs(addr, count)
            .map_err(|err| err.in_range("read discrete inputs"))
    }

    pub fn read_holding_registers(&self, addr: u16, count: u16) -> Result<Vec<u16>, SlaveError> {
        log::debug!("read holding registers: addr={addr}, count={count}");
        self.store
            .get_holding_registers(addr, count)
            .map_err(|err| err.in_range("read holding registers"))
    }

    pub fn read_input_registers(&self, addr: u16, count: u16) -> Result<Vec<u16>, SlaveError> {
        log::debug!("read input registers: addr={addr}, count={count}");
        self.store
            .get_input_registers(addr, count)
            .map_err(|err| err.in_range("read input registers"))
    }

    pub fn write_single_coil(&self, addr: u16, value: bool) -> Result<(), SlaveError> {
        log::debug!("write single coil: addr={addr}, value={value}");
        self.store.set_coil(addr, value)
    }

    pub fn write_single_register(&self, addr: u16, value: u16) -> Result<(), SlaveError> {
        log::debug!("write single register: addr={addr}, value={value}");
        self.store.set_holding_register(addr, value)
    }

    pub fn write_multiple_coils(&self, addr: u16, values: &[bool]) -> Result<(), SlaveError> {
        log::debug!("write multiple coils: addr={addr}, values={values:?}");
        self.store
            .set_coils(addr, values)
            .map_err(|err| err.in_range("write multiple coils"))
    }

    pub fn write_multiple_registers(&self, addr: u16, values: &[u16]) -> Result<(), SlaveError> {
        log::debug!("write multiple registers: addr={addr}, values={values:?}");
        self.store
            .set_holding_registers(addr, values)
            .map_err(|err| err.in_range("write multiple registers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        store::Store,
        types::{Coil, Dump, Register, RegisterMode},
    };

    fn handler() -> RegisterHandler<Store> {
        let dump = Dump {
            coils: (0..16)
                .map(|address| Coil {
                    address,
                    value: address % 2 == 1,
                })
                .collect(),
            holding_registers: (100..104)
                .map(|address| Register { address, value: 0 })
                .collect(),
            input_registers: vec![Register {
                address: 65535,
                value: 1,
            }],
            ..Default::default()
        };
        RegisterHandler::new(Arc::new(Store::from_dump(&dump)))
    }

    #[test]
    fn test_read_coils_in_ascending_order() {
        let handler = handler();
        assert_eq!(
            handler.read_coils(0, 4).unwrap(),
            vec![false, true, false, true]
        );
    }

    #[test]
    fn test_read_reports_first_missing_address() {
        let handler = handler();
        let err = handler.read_coils(14, 4).unwrap_err();

        assert_eq!(err.address(), Some(16));
        assert!(matches!(
            err,
            SlaveError::Range {
                operation: "read coils",
                ..
            }
        ));
    }

    #[test]
    fn test_partial_multi_write_is_not_rolled_back() {
        let handler = handler();
        let err = handler
            .write_multiple_registers(102, &[5, 6, 7])
            .unwrap_err();

        assert_eq!(err.address(), Some(104));
        assert_eq!(handler.read_holding_registers(102, 2).unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_single_write_error_is_unwrapped() {
        let handler = handler();
        assert_eq!(
            handler.write_single_coil(99, true).unwrap_err(),
            SlaveError::AddressNotFound {
                kind: RegisterMode::Coils,
                address: 99
            }
        );
    }

    #[test]
    fn test_range_past_end_of_address_space() {
        let handler = handler();
        assert_eq!(handler.read_input_registers(65535, 1).unwrap(), vec![1]);
        assert_eq!(
            handler.read_input_registers(65535, 2).unwrap_err(),
            SlaveError::AddressOverflow {
                kind: RegisterMode::Input,
                address: 65535,
                count: 2
            }
        );
    }

    #[test]
    fn test_zero_count_touches_nothing() {
        let handler = handler();
        assert!(handler.read_discrete_inputs(0, 0).unwrap().is_empty());
        assert!(handler.write_multiple_coils(500, &[]).is_ok());
    }
}
