use anyhow::Result;

use crate::{
    daemon::storage::kv::KeyValueStore,
    tracking::{event::BrowserEvent, Engine},
};

use super::module::EventProcessor;

/// Feeds events to the tracking [Engine]. Finalizing closes the active session so its time is not
/// lost when the daemon stops.
pub struct EngineProcessor<S> {
    engine: Engine<S>,
}

impl<S: KeyValueStore> EngineProcessor<S> {
    pub fn new(engine: Engine<S>) -> Self {
        Self { engine }
    }
}

impl<S: KeyValueStore> EventProcessor for EngineProcessor<S> {
    async fn process_next(&mut self, event: BrowserEvent) -> Result<()> {
        self.engine.handle_event(&event).await?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.engine.shutdown().await?;
        Ok(())
    }
}
