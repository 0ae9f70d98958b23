use crate::protocol::{
    error::SlaveError,
    request::{
        CoilsRequest, DiscreteInputsRequest, HoldingRegistersRequest, InputRegistersRequest,
        Reply, RequestHandler,
    },
};

pub const DEFAULT_UNIT_ID: u8 = 1;

/// Rejects requests for any unit id other than the configured one before
/// they reach routing.
pub struct ValidationMiddleware<H> {
    inner: H,
    unit_id: u8,
}

impl<H: RequestHandler> ValidationMiddleware<H> {
    pub fn new(inner: H) -> Self {
        Self::with_unit_id(inner, DEFAULT_UNIT_ID)
    }

    pub fn with_unit_id(inner: H, unit_id: u8) -> Self {
        Self { inner, unit_id }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn check(&self, method: &str, unit_id: u8) -> Result<(), SlaveError> {
        if unit_id == self.unit_id {
            return Ok(());
        }
        log::error!("{method} accessed with wrong unit id {unit_id}");
        Err(SlaveError::UnsupportedUnit {
            unit_id,
            expected: self.unit_id,
        })
    }
}

impl<H: RequestHandler> RequestHandler for ValidationMiddleware<H> {
    fn handle_coils(&self, req: &CoilsRequest) -> Reply<bool> {
        match self.check("handle_coils", req.unit_id) {
            Ok(()) => self.inner.handle_coils(req),
            Err(err) => Reply::failed(err),
        }
    }

    fn handle_discrete_inputs(&self, req: &DiscreteInputsRequest) -> Reply<bool> {
        match self.check("handle_discrete_inputs", req.unit_id) {
            Ok(()) => self.inner.handle_discrete_inputs(req),
            Err(err) => Reply::failed(err),
        }
    }

    fn handle_holding_registers(&self, req: &HoldingRegistersRequest) -> Reply<u16> {
        match self.check("handle_holding_registers", req.unit_id) {
            Ok(()) => self.inner.handle_holding_registers(req),
            Err(err) => Reply::failed(err),
        }
    }

    fn handle_input_registers(&self, req: &InputRegistersRequest) -> Reply<u16> {
        match self.check("handle_input_registers", req.unit_id) {
            Ok(()) => self.inner.handle_input_registers(req),
            Err(err) => Reply::failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl RequestHandler for Counting {
        fn handle_coils(&self, _req: &CoilsRequest) -> Reply<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Reply::values(vec![true])
        }

        fn handle_discrete_inputs(&self, _req: &DiscreteInputsRequest) -> Reply<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Reply::values(vec![true])
        }

        fn handle_holding_registers(&self, _req: &HoldingRegistersRequest) -> Reply<u16> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Reply::values(vec![1])
        }

        fn handle_input_registers(&self, _req: &InputRegistersRequest) -> Reply<u16> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Reply::values(vec![1])
        }
    }

    #[test]
    fn test_wrong_unit_never_reaches_inner() {
        let validation = ValidationMiddleware::new(Counting::default());

        let reply = validation.handle_input_registers(&InputRegistersRequest::new(2, 0, 1));
        assert_eq!(
            reply,
            Reply::failed(SlaveError::UnsupportedUnit {
                unit_id: 2,
                expected: 1
            })
        );
        assert_eq!(validation.inner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_configured_unit_passes_through() {
        let validation = ValidationMiddleware::with_unit_id(Counting::default(), 17);

        assert!(validation.handle_coils(&CoilsRequest::read(17, 0, 1)).is_ok());
        assert!(!validation.handle_coils(&CoilsRequest::read(1, 0, 1)).is_ok());
        assert_eq!(validation.inner.calls.load(Ordering::SeqCst), 1);
    }
}
