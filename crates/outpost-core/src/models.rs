//! Domain models for Outpost.
//!
//! Organizations own accounts; both are scoped to the caller identity
//! that created them.

pub mod account;
pub mod organization;
