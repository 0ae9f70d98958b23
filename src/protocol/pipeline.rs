use std::sync::Arc;

use super::{
    adapter::Adapter,
    middleware::{FallbackMiddleware, ValidationMiddleware},
    store::DataStore,
};

/// Full handler chain, outermost stage first.
pub type Pipeline<S> = FallbackMiddleware<ValidationMiddleware<Adapter<S>>>;

/// Wire `Fallback(Validation(Adapter(Handler(store))))` for a single unit.
pub fn build_pipeline<S: DataStore + ?Sized>(store: Arc<S>, unit_id: u8) -> Pipeline<S> {
    FallbackMiddleware::new(ValidationMiddleware::with_unit_id(
        Adapter::new(store),
        unit_id,
    ))
}
