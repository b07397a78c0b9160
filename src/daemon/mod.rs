use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use collection::{reader::EventReader, scheduler::TickScheduler};
use processing::{engine_processor::EngineProcessor, ProcessingModule};
use storage::{file_store::JsonFileStore, kv::KeyValueStore};
use tokio::{
    io::{AsyncBufRead, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::Config,
    tracking::{event::BrowserEvent, Engine},
    utils::{
        clock::{Clock, DefaultClock},
        dir::store_path,
    },
};

pub mod args;
pub mod collection;
pub mod processing;
pub mod shutdown;
pub mod storage;

const EVENT_QUEUE_SIZE: usize = 64;

/// Represents the starting point for the daemon. Events are read from stdin until it closes or
/// the process is interrupted.
pub async fn start_daemon(dir: PathBuf, config: Config) -> Result<()> {
    let store = JsonFileStore::new(store_path(&dir))?;
    info!("Starting daemon on {:?}", store.path());

    let shutdown_token = CancellationToken::new();
    let (_, pipeline_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        run_pipeline(
            BufReader::new(tokio::io::stdin()),
            store,
            Arc::new(DefaultClock),
            &config,
            shutdown_token.clone(),
        ),
    );
    pipeline_result
}

/// Wires the event sources to the engine through a single channel and runs until the input ends
/// or `shutdown_token` is cancelled.
async fn run_pipeline<R, S>(
    input: R,
    store: S,
    clock: Arc<dyn Clock>,
    config: &Config,
    shutdown_token: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: KeyValueStore,
{
    let engine = Engine::new(store, clock.clone(), config.engine());
    if let Err(e) = engine.initialize().await {
        error!("Couldn't seed default categories {e:?}");
    }

    let (sender, receiver) = mpsc::channel::<BrowserEvent>(EVENT_QUEUE_SIZE);
    let reader = EventReader::new(input, sender.clone(), shutdown_token.clone());
    let scheduler = TickScheduler::new(
        sender,
        shutdown_token.clone(),
        clock,
        config.checkpoint_interval(),
        config.rollup_interval(),
    );
    let processor = ProcessingModule::new(receiver, EngineProcessor::new(engine));

    let (reading_result, scheduling_result, processing_result) =
        tokio::join!(reader.run(), scheduler.run(), processor.run());

    if let Err(reading_result) = reading_result {
        error!("Event reader got an error {:?}", reading_result);
    }

    if let Err(scheduling_result) = scheduling_result {
        error!("Tick scheduler got an error {:?}", scheduling_result);
    }

    if let Err(processing_result) = &processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    processing_result
}

#[cfg(test)]
mod daemon_tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::{
        io::{AsyncWriteExt, BufReader},
        time::Instant,
    };
    use tokio_util::sync::CancellationToken;

    use super::run_pipeline;
    use crate::{
        config::Config,
        daemon::storage::{
            entities::{Categories, CurrentPeriod},
            file_store::JsonFileStore,
            kv::{KeyValueStore, StoreKey},
        },
        tracking::domain::Domain,
        utils::{clock::TestClock, logging::TEST_LOGGING},
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    /// Feeds a browser session through the whole pipeline, with tokio time paused so the minute of
    /// watching passes instantly.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("store.json");
        let (mut client, server) = tokio::io::duplex(1024);
        let clock = TestClock {
            start_time: Utc.from_utc_datetime(&TEST_START_DATE),
            reference: Instant::now(),
        };

        let feed = async move {
            client
                .write_all(b"{\"type\":\"focusChanged\",\"tabId\":1,\"url\":\"https://github.com/\"}\n")
                .await?;
            tokio::time::sleep(Duration::from_millis(5000)).await;
            client
                .write_all(b"{\"type\":\"focusChanged\",\"tabId\":2,\"url\":\"https://youtube.com/watch?v=1\"}\n")
                .await?;
            client.write_all(b"garbage\n").await?;
            tokio::time::sleep(Duration::from_millis(60000)).await;
            client
                .write_all(b"{\"type\":\"tabClosed\",\"tabId\":2}\n")
                .await?;
            tokio::time::sleep(Duration::from_millis(1000)).await;
            // Dropping the writer closes the input.
            drop(client);
            anyhow::Ok(())
        };

        let store = JsonFileStore::new(path.clone())?;
        let config = Config::default();
        let (fed, pipeline) = tokio::join!(
            feed,
            run_pipeline(
                BufReader::new(server),
                store,
                Arc::new(clock),
                &config,
                CancellationToken::new(),
            )
        );
        fed?;
        pipeline?;

        let snapshot = JsonFileStore::new(path)?
            .get(vec![StoreKey::CurrentPeriod, StoreKey::Categories])
            .await?;
        let totals = snapshot.decode::<CurrentPeriod>()?.totals();
        let github = &totals[&Domain::from("github.com")];
        let youtube = &totals[&Domain::from("youtube.com")];
        assert_eq!((github.total_time.num_milliseconds(), github.visits), (5000, 1));
        assert_eq!((youtube.total_time.num_milliseconds(), youtube.visits), (60000, 1));
        assert_eq!(snapshot.decode::<Categories>()?.0.len(), 3);

        Ok(())
    }
}
