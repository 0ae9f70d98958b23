use crate::protocol::request::{
    CoilsRequest, DiscreteInputsRequest, HoldingRegistersRequest, InputRegistersRequest, Reply,
    RequestHandler,
};

/// Guarantees every reply carries a value sequence.
///
/// The transport rejects a reply without values, so an absent sequence is
/// replaced by a single default element. The inner error, if any, is kept.
pub struct FallbackMiddleware<H> {
    inner: H,
}

impl<H: RequestHandler> FallbackMiddleware<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

fn fill<T: Default>(method: &str, reply: Reply<T>) -> Reply<T> {
    if reply.values.is_some() {
        return reply;
    }
    log::debug!("{method} returned no values, substituting a single default");
    Reply {
        values: Some(vec![T::default()]),
        error: reply.error,
    }
}

impl<H: RequestHandler> RequestHandler for FallbackMiddleware<H> {
    fn handle_coils(&self, req: &CoilsRequest) -> Reply<bool> {
        fill("handle_coils", self.inner.handle_coils(req))
    }

    fn handle_discrete_inputs(&self, req: &DiscreteInputsRequest) -> Reply<bool> {
        fill(
            "handle_discrete_inputs",
            self.inner.handle_discrete_inputs(req),
        )
    }

    fn handle_holding_registers(&self, req: &HoldingRegistersRequest) -> Reply<u16> {
        fill(
            "handle_holding_registers",
            self.inner.handle_holding_registers(req),
        )
    }

    fn handle_input_registers(&self, req: &InputRegistersRequest) -> Reply<u16> {
        fill(
            "handle_input_registers",
            self.inner.handle_input_registers(req),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::SlaveError;

    /// Inner stage that answers every request with a fixed reply.
    struct Canned {
        bits: Reply<bool>,
        words: Reply<u16>,
    }

    impl RequestHandler for Canned {
        fn handle_coils(&self, _req: &CoilsRequest) -> Reply<bool> {
            self.bits.clone()
        }

        fn handle_discrete_inputs(&self, _req: &DiscreteInputsRequest) -> Reply<bool> {
            self.bits.clone()
        }

        fn handle_holding_registers(&self, _req: &HoldingRegistersRequest) -> Reply<u16> {
            self.words.clone()
        }

        fn handle_input_registers(&self, _req: &InputRegistersRequest) -> Reply<u16> {
            self.words.clone()
        }
    }

    fn foreign_unit() -> SlaveError {
        SlaveError::UnsupportedUnit {
            unit_id: 3,
            expected: 1,
        }
    }

    #[test]
    fn test_absent_values_are_substituted_and_error_kept() {
        let fallback = FallbackMiddleware::new(Canned {
            bits: Reply::failed(foreign_unit()),
            words: Reply::failed(foreign_unit()),
        });

        let bits = fallback.handle_coils(&CoilsRequest::read(3, 0, 1));
        assert_eq!(bits.values, Some(vec![false]));
        assert_eq!(bits.error, Some(foreign_unit()));

        let words = fallback.handle_input_registers(&InputRegistersRequest::new(3, 0, 1));
        assert_eq!(words.values, Some(vec![0]));
        assert_eq!(words.error, Some(foreign_unit()));
    }

    #[test]
    fn test_successful_write_gets_default_values() {
        let fallback = FallbackMiddleware::new(Canned {
            bits: Reply::written(),
            words: Reply::written(),
        });

        let reply = fallback.handle_holding_registers(&HoldingRegistersRequest::write_single(1, 0, 5));
        assert_eq!(reply, Reply::values(vec![0]));
    }

    #[test]
    fn test_present_values_pass_through_even_when_empty() {
        let fallback = FallbackMiddleware::new(Canned {
            bits: Reply::values(Vec::new()),
            words: Reply {
                values: Some(vec![4, 5]),
                error: Some(foreign_unit()),
            },
        });

        assert_eq!(
            fallback.handle_discrete_inputs(&DiscreteInputsRequest::new(1, 0, 0)),
            Reply::values(Vec::new())
        );
        let words = fallback.handle_holding_registers(&HoldingRegistersRequest::read(1, 0, 2));
        assert_eq!(words.values, Some(vec![4, 5]));
        assert_eq!(words.error, Some(foreign_unit()));
    }
}
