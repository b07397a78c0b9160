//! Sources of [crate::tracking::event::BrowserEvent]s: the browser bridge on stdin and the
//! daemon's own timers.

pub mod reader;
pub mod scheduler;
