use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    tracking::event::{BrowserEvent, TickTag},
    utils::clock::Clock,
};

/// Emits the recurring [BrowserEvent::ScheduledTick]s. The first rollup fires right away so a
/// period left over by a previous run gets aggregated on start.
pub struct TickScheduler {
    next: mpsc::Sender<BrowserEvent>,
    shutdown: CancellationToken,
    clock: Arc<dyn Clock>,
    checkpoint_interval: Duration,
    rollup_interval: Duration,
}

impl TickScheduler {
    pub fn new(
        next: mpsc::Sender<BrowserEvent>,
        shutdown: CancellationToken,
        clock: Arc<dyn Clock>,
        checkpoint_interval: Duration,
        rollup_interval: Duration,
    ) -> Self {
        Self {
            next,
            shutdown,
            clock,
            checkpoint_interval,
            rollup_interval,
        }
    }

    pub async fn run(self) -> Result<()> {
        let start = self.clock.instant();
        let mut next_rollup = start;
        let mut next_checkpoint = start + self.checkpoint_interval;
        loop {
            let (tag, at) = if next_rollup <= next_checkpoint {
                (TickTag::DailyAggregation, next_rollup)
            } else {
                (TickTag::Checkpoint, next_checkpoint)
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(at) => ()
            }

            match tag {
                TickTag::DailyAggregation => next_rollup += self.rollup_interval,
                _ => next_checkpoint += self.checkpoint_interval,
            }
            debug!("Scheduling {tag:?}");
            self.next
                .send(BrowserEvent::ScheduledTick { tag })
                .await
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::TickScheduler;
    use crate::{
        tracking::event::{BrowserEvent, TickTag},
        utils::clock::DefaultClock,
    };

    #[tokio::test(start_paused = true)]
    async fn test_tick_order() -> Result<()> {
        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let scheduler = TickScheduler::new(
            sender,
            shutdown.clone(),
            Arc::new(DefaultClock),
            Duration::from_secs(60),
            Duration::from_secs(150),
        );

        let (result, tags) = tokio::join!(scheduler.run(), async {
            let mut tags = vec![];
            while tags.len() < 6 {
                match receiver.recv().await {
                    Some(BrowserEvent::ScheduledTick { tag }) => tags.push(tag),
                    _ => break,
                }
            }
            shutdown.cancel();
            tags
        });

        result?;
        use TickTag::*;
        // 0s, 60s, 120s, 150s, 180s, 240s
        assert_eq!(
            tags,
            [
                DailyAggregation,
                Checkpoint,
                Checkpoint,
                DailyAggregation,
                Checkpoint,
                Checkpoint
            ]
        );
        Ok(())
    }
}
