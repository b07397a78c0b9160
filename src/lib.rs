//! Local tracker of the time spent on each website. A small daemon receives tab and window events
//! from a browser bridge, turns them into per-domain sessions and keeps daily totals in a json
//! store. The cli reports on that data and manages categories.
//!

pub mod cli;
pub mod config;
pub mod daemon;
pub mod tracking;
pub mod utils;
