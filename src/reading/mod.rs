//! The reading data model and the store that distributes it.
//!
//! A single [`ReadingStore`] is written by exactly one acquisition task and
//! read by any number of displays and HTTP handlers.

pub mod data;
pub mod store;

pub use data::{ApiReading, Reading};
pub use store::ReadingStore;
