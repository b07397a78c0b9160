use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use crate::tracking::event::BrowserEvent;

pub mod engine_processor;
pub mod module;

/// Single consumer of every event source. Draining one channel is what keeps engine mutations in
/// arrival order.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<BrowserEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<BrowserEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Processing event {:?}", event);
            match self.processor.process_next(event.clone()).await {
                Ok(_) => {
                    info!("Processed event {:?}", event)
                }
                Err(e) => {
                    error!("Error processing event {:?}: {e:?}", event)
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}
