//! Public entry points for embedding the simulator.
//!
//! The master wrapper lives here; the slave side is assembled from
/// [`crate::protocol`] and started through [`crate::cli::slave`].
pub mod master;

pub use master::{MasterLink, ModbusMaster, Operation, Output, TcpLink};
