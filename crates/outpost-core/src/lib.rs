//! Outpost Core — domain models, control-plane key codec, errors and
//! repository traits shared by every Outpost crate.

pub mod error;
pub mod keys;
pub mod models;
pub mod repository;

pub use error::{OutpostError, OutpostResult};
