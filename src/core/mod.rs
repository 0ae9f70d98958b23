//! UI-independent plumbing shared by the CLI and the dashboard:
//! - change-event fan-out from the store and the dashboard control bus
//! - the in-memory log ring
pub mod bus;
pub mod logs;

pub use bus::{watch_store, Bus, CoreToUi, StoreEvent, UiToCore};
pub use logs::{BufferLogger, LogBuffer, LogEntry, LogLevel, SharedLogBuffer};
