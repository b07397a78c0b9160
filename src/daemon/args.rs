use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

/// The daemon is started by the browser bridge, which writes events to its stdin.
#[derive(Parser)]
pub struct DaemonArgs {
    /// Application directory. By default $XDG_STATE_HOME/sitetime or $HOME/.local/state/sitetime
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Extra configuration file, merged over <dir>/config.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// This option is for debugging purposes only. Stdout isn't read by the bridge.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
