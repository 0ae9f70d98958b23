//! mbsim: Modbus TCP master/slave simulator
//!
//! The slave side is a layered request pipeline over an in-memory register
//! map: `Fallback(Validation(Adapter(Handler(Store))))`, bridged to the wire
//! by a `tokio-modbus` service. The master side wraps a `tokio-modbus`
//! client with bounded retry. A ratatui dashboard and a clap CLI sit on top.

pub mod api;
#[doc(hidden)]
pub mod cli;
#[doc(hidden)]
pub mod core;
pub mod protocol;
#[doc(hidden)]
pub mod tui;

pub use api::*;
