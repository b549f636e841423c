//! Outpost change-feed worker.
//!
//! Decodes control-plane change records and provisions newly created
//! accounts exactly once across concurrent consumers.

pub mod change;
pub mod config;
pub mod router;

pub use change::{ChangeBatch, ChangeRecord};
pub use config::WorkerConfig;
pub use router::{ChangeEventRouter, RecordOutcome, RouterConfig, TerminalTransition};
