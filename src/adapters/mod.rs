// Adapters layer: concrete implementations of the domain ports (record store, signing keys).

pub mod airtable;
pub mod jwks;
pub mod memory;

pub use airtable::AirtableStore;
pub use jwks::JwksKeySource;
pub use memory::{InMemoryStore, StoreOperation};
