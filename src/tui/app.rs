use strum::IntoEnumIterator;

use crate::{
    core::StoreEvent,
    protocol::{Dump, RegisterMode},
};

/// Rows of one table as (address, value); bits are stored as 0/1.
pub struct TableModel {
    pub mode: RegisterMode,
    pub rows: Vec<(u16, u16)>,
    pub last_changed: Option<u16>,
    pub offset: usize,
}

impl TableModel {
    fn new(mode: RegisterMode, rows: Vec<(u16, u16)>) -> Self {
        Self {
            mode,
            rows,
            last_changed: None,
            offset: 0,
        }
    }

    /// Update the row for `address`. Unknown addresses are ignored.
    pub fn apply(&mut self, address: u16, value: u16) {
        if let Ok(index) = self.rows.binary_search_by_key(&address, |(a, _)| *a) {
            self.rows[index].1 = value;
            self.last_changed = Some(address);
        }
    }

    pub fn scroll_down(&mut self) {
        if self.offset + 1 < self.rows.len() {
            self.offset += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.offset = self.offset.saturating_sub(1);
    }
}

pub struct App {
    pub tables: Vec<TableModel>,
    pub focus: RegisterMode,
    pub simulating: bool,
}

impl App {
    pub fn new(dump: &Dump, simulating: bool) -> Self {
        let tables = RegisterMode::iter()
            .map(|mode| {
                let rows = match mode {
                    RegisterMode::Coils => bit_rows(&dump.coils),
                    RegisterMode::DiscreteInputs => bit_rows(&dump.discrete_inputs),
                    RegisterMode::Holding => word_rows(&dump.holding_registers),
                    RegisterMode::Input => word_rows(&dump.input_registers),
                };
                TableModel::new(mode, rows)
            })
            .collect();
        Self {
            tables,
            focus: RegisterMode::Coils,
            simulating,
        }
    }

    pub fn apply(&mut self, event: &StoreEvent) {
        let mode = event.mode();
        if let Some(table) = self.tables.iter_mut().find(|t| t.mode == mode) {
            table.apply(event.address(), event.value());
        }
    }

    pub fn table(&self, mode: RegisterMode) -> Option<&TableModel> {
        self.tables.iter().find(|t| t.mode == mode)
    }

    fn focused_mut(&mut self) -> Option<&mut TableModel> {
        let focus = self.focus;
        self.tables.iter_mut().find(|t| t.mode == focus)
    }

    pub fn next(&mut self) {
        let modes: Vec<RegisterMode> = RegisterMode::iter().collect();
        if let Some(index) = modes.iter().position(|m| *m == self.focus) {
            self.focus = modes[(index + 1) % modes.len()];
        }
    }

    pub fn prev(&mut self) {
        let modes: Vec<RegisterMode> = RegisterMode::iter().collect();
        if let Some(index) = modes.iter().position(|m| *m == self.focus) {
            self.focus = modes[(index + modes.len() - 1) % modes.len()];
        }
    }

    pub fn scroll_down(&mut self) {
        if let Some(table) = self.focused_mut() {
            table.scroll_down();
        }
    }

    pub fn scroll_up(&mut self) {
        if let Some(table) = self.focused_mut() {
            table.scroll_up();
        }
    }
}

fn bit_rows(coils: &[crate::protocol::Coil]) -> Vec<(u16, u16)> {
    coils
        .iter()
        .map(|c| (c.address, u16::from(c.value)))
        .collect()
}

fn word_rows(registers: &[crate::protocol::Register]) -> Vec<(u16, u16)> {
    registers.iter().map(|r| (r.address, r.value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Coil, Register, RegisterChange};

    fn app() -> App {
        App::new(
            &Dump {
                coils: vec![
                    Coil {
                        address: 1,
                        value: true,
                    },
                    Coil {
                        address: 2,
                        value: false,
                    },
                ],
                holding_registers: vec![Register {
                    address: 40,
                    value: 0,
                }],
                ..Default::default()
            },
            false,
        )
    }

    #[test]
    fn test_focus_cycles_through_tables() {
        let mut app = app();
        assert_eq!(app.focus, RegisterMode::Coils);

        app.next();
        assert_eq!(app.focus, RegisterMode::DiscreteInputs);
        app.prev();
        app.prev();
        assert_eq!(app.focus, RegisterMode::Input);
        app.next();
        assert_eq!(app.focus, RegisterMode::Coils);
    }

    #[test]
    fn test_events_update_rows_and_highlight() {
        let mut app = app();
        app.apply(&StoreEvent::HoldingRegister(RegisterChange {
            address: 40,
            from: 0,
            to: 1234,
        }));

        let table = app.table(RegisterMode::Holding).unwrap();
        assert_eq!(table.rows, vec![(40, 1234)]);
        assert_eq!(table.last_changed, Some(40));
        assert_eq!(app.table(RegisterMode::Coils).unwrap().last_changed, None);
    }

    #[test]
    fn test_scroll_stays_in_bounds() {
        let mut app = app();
        app.scroll_up();
        app.scroll_down();
        app.scroll_down();
        app.scroll_down();
        assert_eq!(app.table(RegisterMode::Coils).unwrap().offset, 1);
    }
}
