use anyhow::Result;

use crate::tracking::event::BrowserEvent;

/// Represents an event processor. Events are handed over one at a time, in the order they were
/// received.
pub trait EventProcessor {
    fn process_next(
        &mut self,
        event: BrowserEvent,
    ) -> impl std::future::Future<Output = Result<()>>;

    /// Called once the event sources are gone.
    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
