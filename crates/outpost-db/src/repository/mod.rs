//! SurrealDB repository implementations.

mod account;
mod organization;

pub use account::SurrealAccountRepository;
pub use organization::SurrealOrganizationRepository;
