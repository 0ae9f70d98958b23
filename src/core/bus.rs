use flume::{Receiver, Sender};

use crate::protocol::{CoilChange, RegisterChange, RegisterMode, Store};

/// A value change observed in one of the store's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Coil(CoilChange),
    DiscreteInput(CoilChange),
    HoldingRegister(RegisterChange),
    InputRegister(RegisterChange),
}

impl StoreEvent {
    pub fn mode(&self) -> RegisterMode {
        match self {
            StoreEvent::Coil(_) => RegisterMode::Coils,
            StoreEvent::DiscreteInput(_) => RegisterMode::DiscreteInputs,
            StoreEvent::HoldingRegister(_) => RegisterMode::Holding,
            StoreEvent::InputRegister(_) => RegisterMode::Input,
        }
    }

    pub fn address(&self) -> u16 {
        match self {
            StoreEvent::Coil(c) | StoreEvent::DiscreteInput(c) => c.address,
            StoreEvent::HoldingRegister(r) | StoreEvent::InputRegister(r) => r.address,
        }
    }

    /// New value widened to a register word; bits become 0 or 1.
    pub fn value(&self) -> u16 {
        match self {
            StoreEvent::Coil(c) | StoreEvent::DiscreteInput(c) => u16::from(c.to),
            StoreEvent::HoldingRegister(r) | StoreEvent::InputRegister(r) => r.to,
        }
    }
}

/// Subscribe to all four tables and forward every change over an unbounded
/// channel. Sending never blocks the writer; once the receiver is gone the
/// events are dropped.
pub fn watch_store(store: &Store) -> Receiver<StoreEvent> {
    let (tx, rx) = flume::unbounded();

    let coils = tx.clone();
    store.subscribe_coils(move |change| {
        let _ = coils.send(StoreEvent::Coil(*change));
    });
    let discrete_inputs = tx.clone();
    store.subscribe_discrete_inputs(move |change| {
        let _ = discrete_inputs.send(StoreEvent::DiscreteInput(*change));
    });
    let holding = tx.clone();
    store.subscribe_holding_registers(move |change| {
        let _ = holding.send(StoreEvent::HoldingRegister(*change));
    });
    store.subscribe_input_registers(move |change| {
        let _ = tx.send(StoreEvent::InputRegister(*change));
    });

    rx
}

/// Messages sent from the dashboard to the slave runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiToCore {
    ToggleSimulation,
    Quit,
}

/// Messages sent from the slave runner back to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreToUi {
    SimulationChanged(bool),
    Stopped,
}

/// Dashboard side of the control channel pair.
#[derive(Debug, Clone)]
pub struct Bus {
    pub core_rx: Receiver<CoreToUi>,
    pub ui_tx: Sender<UiToCore>,
}

impl Bus {
    pub fn new(core_rx: Receiver<CoreToUi>, ui_tx: Sender<UiToCore>) -> Self {
        Self { core_rx, ui_tx }
    }
}
