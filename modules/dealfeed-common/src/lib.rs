pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Transport};
pub use error::{DealfeedError, Result};
pub use types::*;
