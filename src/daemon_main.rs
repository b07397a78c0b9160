use std::{env::args, time::Duration};

use anyhow::Result;
use clap::Parser;
use sitetime::{
    config::Config,
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::application_path,
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::error;

/// Stdin is read on a blocking thread that can't be interrupted, so the runtime doesn't wait for it.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    run(DaemonArgs::parse_from(args()))
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = application_path(args.dir)?;
    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    let config = Config::load_from(&app_dir, args.config.as_deref())
        .inspect_err(|e| error!("Invalid configuration {e}"))?;

    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(start_daemon(app_dir, config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result.inspect_err(|e| error!("Daemon stopped with an error {e:?}"))
}
