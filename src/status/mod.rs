//! Status module for SiteWatch.
//!
//! Per-target health state persisted between runs as a JSON file.

mod models;
mod store;

pub use models::*;
pub use store::*;
