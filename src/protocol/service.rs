use std::{
    future::{self, Future},
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use super::{
    error::SlaveError,
    request::{
        CoilsRequest, DiscreteInputsRequest, HoldingRegistersRequest, InputRegistersRequest,
        Reply, RequestHandler,
    },
};

/// Exception code reported to the master for a pipeline error.
pub fn exception_for(err: &SlaveError) -> ExceptionCode {
    match err.root_cause() {
        SlaveError::UnsupportedUnit { .. } => ExceptionCode::IllegalFunction,
        SlaveError::QuantityMismatch { .. } => ExceptionCode::IllegalDataValue,
        SlaveError::AddressNotFound { .. }
        | SlaveError::AddressOverflow { .. }
        | SlaveError::Range { .. } => ExceptionCode::IllegalDataAddress,
    }
}

fn read_response<T>(
    reply: Reply<T>,
    wrap: impl FnOnce(Vec<T>) -> Response,
) -> Result<Response, ExceptionCode> {
    reply
        .into_result()
        .map(wrap)
        .map_err(|err| exception_for(&err))
}

fn write_response<T>(reply: Reply<T>, echo: Response) -> Result<Response, ExceptionCode> {
    reply
        .into_result()
        .map(|_| echo)
        .map_err(|err| exception_for(&err))
}

/// Counts live connections against a fixed ceiling.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    limit: usize,
}

impl ConnectionTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Reserve a slot, or `None` when the ceiling is reached.
    pub fn try_acquire(&self, peer: SocketAddr) -> Option<ConnectionSlot> {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()
            .map(|_| ConnectionSlot {
                active: self.active.clone(),
                peer,
            })
    }
}

/// Held by a connection's service; releases the slot when dropped.
#[derive(Debug)]
pub struct ConnectionSlot {
    active: Arc<AtomicUsize>,
    peer: SocketAddr,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        let left = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        log::info!("client {} disconnected ({left} active)", self.peer);
    }
}

/// tokio-modbus service feeding decoded requests into the handler chain.
pub struct SlaveService {
    pipeline: Arc<dyn RequestHandler>,
    _slot: Option<ConnectionSlot>,
}

impl SlaveService {
    pub fn new(pipeline: Arc<dyn RequestHandler>) -> Self {
        Self {
            pipeline,
            _slot: None,
        }
    }

    fn with_slot(pipeline: Arc<dyn RequestHandler>, slot: ConnectionSlot) -> Self {
        Self {
            pipeline,
            _slot: Some(slot),
        }
    }

    pub fn dispatch(&self, req: SlaveRequest<'_>) -> Result<Response, ExceptionCode> {
        let unit_id = req.slave;
        let pipeline = &self.pipeline;

        match req.request {
            Request::ReadCoils(addr, cnt) => read_response(
                pipeline.handle_coils(&CoilsRequest::read(unit_id, addr, cnt)),
                Response::ReadCoils,
            ),
            Request::WriteSingleCoil(addr, value) => write_response(
                pipeline.handle_coils(&CoilsRequest::write_single(unit_id, addr, value)),
                Response::WriteSingleCoil(addr, value),
            ),
            Request::WriteMultipleCoils(addr, values) => {
                let req = CoilsRequest::write_multiple(unit_id, addr, values.to_vec());
                let quantity = req.quantity;
                write_response(
                    pipeline.handle_coils(&req),
                    Response::WriteMultipleCoils(addr, quantity),
                )
            }
            Request::ReadDiscreteInputs(addr, cnt) => read_response(
                pipeline.handle_discrete_inputs(&DiscreteInputsRequest::new(unit_id, addr, cnt)),
                Response::ReadDiscreteInputs,
            ),
            Request::ReadHoldingRegisters(addr, cnt) => read_response(
                pipeline.handle_holding_registers(&HoldingRegistersRequest::read(
                    unit_id, addr, cnt,
                )),
                Response::ReadHoldingRegisters,
            ),
            Request::WriteSingleRegister(addr, value) => write_response(
                pipeline.handle_holding_registers(&HoldingRegistersRequest::write_single(
                    unit_id, addr, value,
                )),
                Response::WriteSingleRegister(addr, value),
            ),
            Request::WriteMultipleRegisters(addr, values) => {
                let req = HoldingRegistersRequest::write_multiple(unit_id, addr, values.to_vec());
                let quantity = req.quantity;
                write_response(
                    pipeline.handle_holding_registers(&req),
                    Response::WriteMultipleRegisters(addr, quantity),
                )
            }
            Request::ReadInputRegisters(addr, cnt) => read_response(
                pipeline.handle_input_registers(&InputRegistersRequest::new(unit_id, addr, cnt)),
                Response::ReadInputRegisters,
            ),
            other => {
                log::warn!("unit {unit_id}: unsupported function in request {other:?}");
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

impl tokio_modbus::server::Service for SlaveService {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        future::ready(self.dispatch(req))
    }
}

/// Bound TCP listener plus the pipeline it serves.
pub struct SlaveServer {
    listener: TcpListener,
    pipeline: Arc<dyn RequestHandler>,
    tracker: ConnectionTracker,
}

impl SlaveServer {
    pub async fn bind(
        addr: SocketAddr,
        pipeline: Arc<dyn RequestHandler>,
        max_clients: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind modbus listener on {addr}"))?;
        Ok(Self {
            listener,
            pipeline,
            tracker: ConnectionTracker::new(max_clients),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept and serve connections until `shutdown` resolves.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let local = self.local_addr()?;
        let server = Server::new(self.listener);
        let pipeline = self.pipeline;
        let tracker = self.tracker;

        let on_connected = move |stream, socket_addr: SocketAddr| {
            let pipeline = pipeline.clone();
            let tracker = tracker.clone();
            async move {
                accept_tcp_connection(stream, socket_addr, move |peer: SocketAddr| {
                    match tracker.try_acquire(peer) {
                        Some(slot) => {
                            log::info!("client {peer} connected ({} active)", tracker.active());
                            Ok(Some(SlaveService::with_slot(pipeline.clone(), slot)))
                        }
                        None => {
                            log::warn!(
                                "refusing client {peer}: {} clients already connected",
                                tracker.limit()
                            );
                            Ok(None)
                        }
                    }
                })
            }
        };
        let on_process_error = |err| {
            log::error!("modbus connection error: {err}");
        };

        log::info!("modbus slave listening on {local}");
        tokio::select! {
            result = server.serve(&on_connected, on_process_error) => {
                result.context("modbus server stopped")?;
            }
            _ = shutdown => {
                log::info!("modbus slave on {local} shutting down");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use crate::protocol::{
        pipeline::build_pipeline,
        store::Store,
        types::{Coil, Dump, Register},
    };

    fn service() -> SlaveService {
        let dump = Dump {
            coils: (0..8)
                .map(|address| Coil {
                    address,
                    value: false,
                })
                .collect(),
            holding_registers: vec![Register {
                address: 40,
                value: 3,
            }],
            ..Default::default()
        };
        let store = Arc::new(Store::from_dump(&dump));
        SlaveService::new(Arc::new(build_pipeline(store, 1)))
    }

    fn request(slave: u8, request: Request<'static>) -> SlaveRequest<'static> {
        SlaveRequest { slave, request }
    }

    #[test]
    fn test_write_multiple_coils_echoes_quantity() {
        let service = service();
        let req = Request::WriteMultipleCoils(2, Cow::Owned(vec![true, true, false]));

        assert_eq!(
            service.dispatch(request(1, req)),
            Ok(Response::WriteMultipleCoils(2, 3))
        );
        assert_eq!(
            service.dispatch(request(1, Request::ReadCoils(0, 4))),
            Ok(Response::ReadCoils(vec![false, false, true, true]))
        );
    }

    #[test]
    fn test_errors_map_to_exceptions() {
        let service = service();

        assert_eq!(
            service.dispatch(request(1, Request::ReadHoldingRegisters(40, 2))),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            service.dispatch(request(9, Request::ReadCoils(0, 1))),
            Err(ExceptionCode::IllegalFunction)
        );
        assert_eq!(
            service.dispatch(request(1, Request::ReadInputRegisters(0, 1))),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn test_unsupported_function_is_illegal() {
        let service = service();
        let req = Request::MaskWriteRegister(40, 0xFF00, 0x0001);
        assert_eq!(
            service.dispatch(request(1, req)),
            Err(ExceptionCode::IllegalFunction)
        );
    }

    #[test]
    fn test_quantity_mismatch_is_illegal_value() {
        assert_eq!(
            exception_for(&SlaveError::QuantityMismatch {
                quantity: 4,
                provided: 1
            }),
            ExceptionCode::IllegalDataValue
        );
    }

    #[test]
    fn test_tracker_refuses_past_limit() {
        let tracker = ConnectionTracker::new(1);
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        let slot = tracker.try_acquire(peer);
        assert!(slot.is_some());
        assert!(tracker.try_acquire(peer).is_none());

        drop(slot);
        assert_eq!(tracker.active(), 0);
        assert!(tracker.try_acquire(peer).is_some());
    }
}
