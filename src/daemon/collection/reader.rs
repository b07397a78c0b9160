use anyhow::Result;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
};
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::tracking::event::BrowserEvent;

/// Reads newline delimited [BrowserEvent]s written by the browser bridge. The end of the input
/// means the browser is gone, which shuts the whole daemon down.
pub struct EventReader<R> {
    input: R,
    next: mpsc::Sender<BrowserEvent>,
    shutdown: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> EventReader<R> {
    pub fn new(input: R, next: mpsc::Sender<BrowserEvent>, shutdown: CancellationToken) -> Self {
        Self {
            input,
            next,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut lines = LinesStream::new(self.input.lines());
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                line = lines.next() => line,
            };

            match line {
                None => {
                    info!("Event input closed, shutting down");
                    self.shutdown.cancel();
                    return Ok(());
                }
                Some(Err(e)) => {
                    error!("Couldn't read event input {e:?}");
                    self.shutdown.cancel();
                    return Err(e.into());
                }
                Some(Ok(line)) if line.trim().is_empty() => (),
                Some(Ok(line)) => match serde_json::from_str::<BrowserEvent>(&line) {
                    Ok(event) => {
                        debug!("Received {event:?}");
                        self.next
                            .send(event)
                            .await
                            .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                    }
                    // A misbehaving bridge must not take the daemon down.
                    Err(e) => warn!("Skipping illegal event {line:?}: {e}"),
                },
            }
        }
    }
}
