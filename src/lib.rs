pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod logging;
pub mod store;
pub mod ui;

pub use error::{Result, SemverStoreError};
