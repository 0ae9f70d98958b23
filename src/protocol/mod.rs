pub mod adapter;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod pipeline;
mod range;
pub mod request;
pub mod seed;
pub mod service;
pub mod simulator;
pub mod store;
pub mod types;

pub use error::SlaveError;
pub use pipeline::{build_pipeline, Pipeline};
pub use request::{
    CoilsRequest, DiscreteInputsRequest, HoldingRegistersRequest, InputRegistersRequest, Reply,
    RequestHandler,
};
pub use store::{DataStore, Store};
pub use types::{Coil, CoilChange, Dump, Register, RegisterChange, RegisterMode};
