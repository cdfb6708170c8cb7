pub mod journal;
pub mod schema;
pub mod store;

pub use journal::{CycleTally, Journal};
pub use store::StateStore;
