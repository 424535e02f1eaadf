pub mod affiliate;
pub mod alert;
pub mod categorize;
pub mod extract;
pub mod fetch;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod router;
pub mod store;
pub mod testutil;

pub use pipeline::{Pipeline, ProcessOutcome};
pub use router::ChannelRegistry;
pub use store::{CatalogStore, PgCatalogStore};
