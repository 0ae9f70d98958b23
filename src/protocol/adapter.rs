use std::sync::Arc;

use super::{
    error::SlaveError,
    handler::RegisterHandler,
    request::{
        CoilsRequest, DiscreteInputsRequest, HoldingRegistersRequest, InputRegistersRequest,
        Reply, RequestHandler, RwRequest,
    },
    store::DataStore,
};

const SEPARATOR: &str =
    "================================================================================";

/// Routes decoded requests onto the range layer.
///
/// Writes are split by quantity: exactly one value goes through the
/// single-write path, anything else through the multi-write path.
pub struct Adapter<S: ?Sized> {
    handler: RegisterHandler<S>,
}

impl<S: DataStore + ?Sized> Adapter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            handler: RegisterHandler::new(store),
        }
    }

    pub fn handler(&self) -> &RegisterHandler<S> {
        &self.handler
    }
}

enum Route<'a, T> {
    Single(T),
    Multiple(&'a [T]),
    Read(u16),
}

fn route<T: Copy>(req: &RwRequest<T>) -> Result<Route<'_, T>, SlaveError> {
    if !req.is_write {
        return Ok(Route::Read(req.quantity));
    }
    let wanted = usize::from(req.quantity);
    if req.args.len() < wanted {
        return Err(SlaveError::QuantityMismatch {
            quantity: req.quantity,
            provided: req.args.len(),
        });
    }
    if req.quantity == 1 {
        Ok(Route::Single(req.args[0]))
    } else {
        Ok(Route::Multiple(&req.args[..wanted]))
    }
}

fn describe(unit_id: u8, function: u8, name: &str, addr: u16, quantity: u16) {
    log::debug!("{SEPARATOR}");
    log::info!(
        "unit {unit_id} function 0x{function:02X} {name}: addr={addr}, quantity={quantity}"
    );
}

impl<S: DataStore + ?Sized> RequestHandler for Adapter<S> {
    fn handle_coils(&self, req: &CoilsRequest) -> Reply<bool> {
        let route = match route(req) {
            Ok(route) => route,
            Err(err) => return Reply::failed(err),
        };
        match route {
            Route::Single(value) => {
                describe(req.unit_id, 0x05, "write single coil", req.addr, 1);
                Reply::from_write(self.handler.write_single_coil(req.addr, value))
            }
            Route::Multiple(values) => {
                describe(req.unit_id, 0x0F, "write multiple coils", req.addr, req.quantity);
                Reply::from_write(self.handler.write_multiple_coils(req.addr, values))
            }
            Route::Read(count) => {
                describe(req.unit_id, 0x01, "read coils", req.addr, count);
                Reply::from_read(self.handler.read_coils(req.addr, count))
            }
        }
    }

    fn handle_discrete_inputs(&self, req: &DiscreteInputsRequest) -> Reply<bool> {
        describe(req.unit_id, 0x02, "read discrete inputs", req.addr, req.quantity);
        Reply::from_read(self.handler.read_discrete_inputs(req.addr, req.quantity))
    }

    fn handle_holding_registers(&self, req: &HoldingRegistersRequest) -> Reply<u16> {
        let route = match route(req) {
            Ok(route) => route,
            Err(err) => return Reply::failed(err),
        };
        match route {
            Route::Single(value) => {
                describe(req.unit_id, 0x06, "write single register", req.addr, 1);
                Reply::from_write(self.handler.write_single_register(req.addr, value))
            }
            Route::Multiple(values) => {
                describe(
                    req.unit_id,
                    0x10,
                    "write multiple registers",
                    req.addr,
                    req.quantity,
                );
                Reply::from_write(self.handler.write_multiple_registers(req.addr, values))
            }
            Route::Read(count) => {
                describe(req.unit_id, 0x03, "read holding registers", req.addr, count);
                Reply::from_read(self.handler.read_holding_registers(req.addr, count))
            }
        }
    }

    fn handle_input_registers(&self, req: &InputRegistersRequest) -> Reply<u16> {
        describe(req.unit_id, 0x04, "read input registers", req.addr, req.quantity);
        Reply::from_read(self.handler.read_input_registers(req.addr, req.quantity))
    }
}
