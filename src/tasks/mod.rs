//! Periodic activities.
//!
//! Every long-running activity is a [`run_periodic`] loop bound to one
//! action: polling the sensor, fetching from a peer, or refreshing a display
//! (see [`crate::display::DisplayUpdater`]).

pub mod fetcher;
pub mod periodic;
pub mod poller;

pub use fetcher::RemoteFetcher;
pub use periodic::run_periodic;
pub use poller::SensorPoller;
