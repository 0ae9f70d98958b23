use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use super::{
    error::SlaveError,
    range::{read_range, write_range},
    types::{Change, Coil, CoilChange, Dump, Register, RegisterChange, RegisterMode},
};

/// Address-level access to the four tables.
///
/// The range methods have default bodies built on the single-address calls;
/// [`Store`] overrides them so a whole range runs under one lock.
pub trait DataStore: Send + Sync {
    fn get_coil(&self, address: u16) -> Result<bool, SlaveError>;
    fn set_coil(&self, address: u16, value: bool) -> Result<(), SlaveError>;
    fn get_discrete_input(&self, address: u16) -> Result<bool, SlaveError>;
    fn set_discrete_input(&self, address: u16, value: bool) -> Result<(), SlaveError>;
    fn get_holding_register(&self, address: u16) -> Result<u16, SlaveError>;
    fn set_holding_register(&self, address: u16, value: u16) -> Result<(), SlaveError>;
    fn get_input_register(&self, address: u16) -> Result<u16, SlaveError>;
    fn set_input_register(&self, address: u16, value: u16) -> Result<(), SlaveError>;

    fn get_coils(&self, address: u16, count: u16) -> Result<Vec<bool>, SlaveError> {
        read_range(RegisterMode::Coils, address, count, |a| self.get_coil(a))
    }

    fn get_discrete_inputs(&self, address: u16, count: u16) -> Result<Vec<bool>, SlaveError> {
        read_range(RegisterMode::DiscreteInputs, address, count, |a| {
            self.get_discrete_input(a)
        })
    }

    fn get_holding_registers(&self, address: u16, count: u16) -> Result<Vec<u16>, SlaveError> {
        read_range(RegisterMode::Holding, address, count, |a| {
            self.get_holding_register(a)
        })
    }

    fn get_input_registers(&self, address: u16, count: u16) -> Result<Vec<u16>, SlaveError> {
        read_range(RegisterMode::Input, address, count, |a| {
            self.get_input_register(a)
        })
    }

    fn set_coils(&self, address: u16, values: &[bool]) -> Result<(), SlaveError> {
        write_range(RegisterMode::Coils, address, values, |a, v| {
            self.set_coil(a, v)
        })
    }

    fn set_holding_registers(&self, address: u16, values: &[u16]) -> Result<(), SlaveError> {
        write_range(RegisterMode::Holding, address, values, |a, v| {
            self.set_holding_register(a, v)
        })
    }
}

type Subscriber<T> = Box<dyn Fn(&Change<T>) + Send + Sync>;

struct Bank<T> {
    mode: RegisterMode,
    values: Mutex<HashMap<u16, T>>,
    subscribers: RwLock<Vec<Subscriber<T>>>,
}

impl<T: Copy + PartialEq> Bank<T> {
    fn new(mode: RegisterMode, seed: impl IntoIterator<Item = (u16, T)>) -> Self {
        Self {
            mode,
            values: Mutex::new(seed.into_iter().collect()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn missing(&self, address: u16) -> SlaveError {
        SlaveError::AddressNotFound {
            kind: self.mode,
            address,
        }
    }

    fn get(&self, address: u16) -> Result<T, SlaveError> {
        self.values
            .lock()
            .get(&address)
            .copied()
            .ok_or_else(|| self.missing(address))
    }

    fn set(&self, address: u16, value: T) -> Result<(), SlaveError> {
        let mut values = self.values.lock();
        self.set_locked(&mut values, address, value)
    }

    fn set_locked(
        &self,
        values: &mut HashMap<u16, T>,
        address: u16,
        value: T,
    ) -> Result<(), SlaveError> {
        let slot = values
            .get_mut(&address)
            .ok_or_else(|| self.missing(address))?;
        let from = std::mem::replace(slot, value);
        if from != value {
            self.notify(&Change {
                address,
                from,
                to: value,
            });
        }
        Ok(())
    }

    fn get_range(&self, address: u16, count: u16) -> Result<Vec<T>, SlaveError> {
        let values = self.values.lock();
        read_range(self.mode, address, count, |a| {
            values.get(&a).copied().ok_or_else(|| self.missing(a))
        })
    }

    fn set_range(&self, address: u16, new_values: &[T]) -> Result<(), SlaveError> {
        let mut values = self.values.lock();
        write_range(self.mode, address, new_values, |a, v| {
            self.set_locked(&mut values, a, v)
        })
    }

    fn subscribe(&self, callback: Subscriber<T>) {
        self.subscribers.write().push(callback);
    }

    fn notify(&self, change: &Change<T>) {
        for subscriber in self.subscribers.read().iter() {
            subscriber(change);
        }
    }

    fn addresses(&self) -> Vec<u16> {
        let mut addresses: Vec<u16> = self.values.lock().keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    fn snapshot(&self) -> Vec<(u16, T)> {
        let mut entries: Vec<(u16, T)> = self
            .values
            .lock()
            .iter()
            .map(|(address, value)| (*address, *value))
            .collect();
        entries.sort_unstable_by_key(|(address, _)| *address);
        entries
    }
}

/// In-memory register map shared by the whole slave.
///
/// Only addresses present at construction exist; writes never create new
/// ones. Subscribers run synchronously on the writing thread while the
/// table lock is held, so they must not call back into the same table.
pub struct Store {
    coils: Bank<bool>,
    discrete_inputs: Bank<bool>,
    holding_registers: Bank<u16>,
    input_registers: Bank<u16>,
}

impl Default for Store {
    fn default() -> Self {
        Self::from_dump(&Dump::default())
    }
}

impl Store {
    pub fn from_dump(dump: &Dump) -> Self {
        Self {
            coils: Bank::new(
                RegisterMode::Coils,
                dump.coils.iter().map(|c| (c.address, c.value)),
            ),
            discrete_inputs: Bank::new(
                RegisterMode::DiscreteInputs,
                dump.discrete_inputs.iter().map(|c| (c.address, c.value)),
            ),
            holding_registers: Bank::new(
                RegisterMode::Holding,
                dump.holding_registers.iter().map(|r| (r.address, r.value)),
            ),
            input_registers: Bank::new(
                RegisterMode::Input,
                dump.input_registers.iter().map(|r| (r.address, r.value)),
            ),
        }
    }

    pub fn subscribe_coils<F>(&self, callback: F)
    where
        F: Fn(&CoilChange) + Send + Sync + 'static,
    {
        self.coils.subscribe(Box::new(callback));
    }

    pub fn subscribe_discrete_inputs<F>(&self, callback: F)
    where
        F: Fn(&CoilChange) + Send + Sync + 'static,
    {
        self.discrete_inputs.subscribe(Box::new(callback));
    }

    pub fn subscribe_holding_registers<F>(&self, callback: F)
    where
        F: Fn(&RegisterChange) + Send + Sync + 'static,
    {
        self.holding_registers.subscribe(Box::new(callback));
    }

    pub fn subscribe_input_registers<F>(&self, callback: F)
    where
        F: Fn(&RegisterChange) + Send + Sync + 'static,
    {
        self.input_registers.subscribe(Box::new(callback));
    }

    /// Seeded addresses of one table, ascending.
    pub fn addresses(&self, mode: RegisterMode) -> Vec<u16> {
        match mode {
            RegisterMode::Coils => self.coils.addresses(),
            RegisterMode::DiscreteInputs => self.discrete_inputs.addresses(),
            RegisterMode::Holding => self.holding_registers.addresses(),
            RegisterMode::Input => self.input_registers.addresses(),
        }
    }

    /// Current contents of every table, sorted by address.
    pub fn snapshot(&self) -> Dump {
        let coils = |bank: &Bank<bool>| -> Vec<Coil> {
            bank.snapshot()
                .into_iter()
                .map(|(address, value)| Coil { address, value })
                .collect()
        };
        let registers = |bank: &Bank<u16>| -> Vec<Register> {
            bank.snapshot()
                .into_iter()
                .map(|(address, value)| Register { address, value })
                .collect()
        };

        Dump {
            coils: coils(&self.coils),
            discrete_inputs: coils(&self.discrete_inputs),
            holding_registers: registers(&self.holding_registers),
            input_registers: registers(&self.input_registers),
        }
    }
}

impl DataStore for Store {
    fn get_coil(&self, address: u16) -> Result<bool, SlaveError> {
        self.coils.get(address)
    }

    fn set_coil(&self, address: u16, value: bool) -> Result<(), SlaveError> {
        self.coils.set(address, value)
    }

    fn get_discrete_input(&self, address: u16) -> Result<bool, SlaveError> {
        self.discrete_inputs.get(address)
    }

    fn set_discrete_input(&self, address: u16, value: bool) -> Result<(), SlaveError> {
        self.discrete_inputs.set(address, value)
    }

    fn get_holding_register(&self, address: u16) -> Result<u16, SlaveError> {
        self.holding_registers.get(address)
    }

    fn set_holding_register(&self, address: u16, value: u16) -> Result<(), SlaveError> {
        self.holding_registers.set(address, value)
    }

    fn get_input_register(&self, address: u16) -> Result<u16, SlaveError> {
        self.input_registers.get(address)
    }

    fn set_input_register(&self, address: u16, value: u16) -> Result<(), SlaveError> {
        self.input_registers.set(address, value)
    }

    fn get_coils(&self, address: u16, count: u16) -> Result<Vec<bool>, SlaveError> {
        self.coils.get_range(address, count)
    }

    fn get_discrete_inputs(&self, address: u16, count: u16) -> Result<Vec<bool>, SlaveError> {
        self.discrete_inputs.get_range(address, count)
    }

    fn get_holding_registers(&self, address: u16, count: u16) -> Result<Vec<u16>, SlaveError> {
        self.holding_registers.get_range(address, count)
    }

    fn get_input_registers(&self, address: u16, count: u16) -> Result<Vec<u16>, SlaveError> {
        self.input_registers.get_range(address, count)
    }

    fn set_coils(&self, address: u16, values: &[bool]) -> Result<(), SlaveError> {
        self.coils.set_range(address, values)
    }

    fn set_holding_registers(&self, address: u16, values: &[u16]) -> Result<(), SlaveError> {
        self.holding_registers.set_range(address, values)
    }
}
