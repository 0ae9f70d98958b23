use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// The four addressable Modbus data tables.
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterMode {
    Coils = 1,
    DiscreteInputs = 2,
    Holding = 3,
    Input = 4,
}

impl RegisterMode {
    /// Coils and holding registers accept writes; the other two tables are
    /// read-only from the bus side.
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Coils | Self::Holding)
    }

    pub const fn is_bit(self) -> bool {
        matches!(self, Self::Coils | Self::DiscreteInputs)
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Coils => "Coils",
            Self::DiscreteInputs => "Discrete Inputs",
            Self::Holding => "Holding Registers",
            Self::Input => "Input Registers",
        }
    }
}

impl std::fmt::Display for RegisterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterMode::Coils => write!(f, "coil"),
            RegisterMode::DiscreteInputs => write!(f, "discrete input"),
            RegisterMode::Holding => write!(f, "holding register"),
            RegisterMode::Input => write!(f, "input register"),
        }
    }
}

/// A single discrete output or discrete input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coil {
    pub address: u16,
    pub value: bool,
}

/// A single 16-bit holding or input register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub address: u16,
    pub value: u16,
}

/// Value transition delivered to store subscribers. Only produced when
/// `from != to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change<T> {
    pub address: u16,
    pub from: T,
    pub to: T,
}

pub type CoilChange = Change<bool>;
pub type RegisterChange = Change<u16>;

/// Initial contents of every table, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dump {
    pub coils: Vec<Coil>,
    pub discrete_inputs: Vec<Coil>,
    pub holding_registers: Vec<Register>,
    pub input_registers: Vec<Register>,
}

impl Dump {
    pub fn len(&self) -> usize {
        self.coils.len()
            + self.discrete_inputs.len()
            + self.holding_registers.len()
            + self.input_registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
