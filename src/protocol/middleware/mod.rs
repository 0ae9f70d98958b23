mod fallback;
mod validation;

pub use fallback::FallbackMiddleware;
pub use validation::{ValidationMiddleware, DEFAULT_UNIT_ID};
