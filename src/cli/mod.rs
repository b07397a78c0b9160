pub mod manage;
pub mod report;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use manage::{process_clear_command, process_export_command, process_set_category_command};
use report::{
    process_categories_command, process_history_command, process_score_command,
    process_today_command, ScoreCommand,
};
use tracing::level_filters::LevelFilter;

use crate::{
    config::Config,
    daemon::{start_daemon, storage::file_store::JsonFileStore},
    tracking::Engine,
    utils::{
        clock::DefaultClock,
        dir::{application_path, store_path},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Sitetime", version, long_about = None)]
#[command(about = "Time spent per website, tracked locally", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Configuration file merged over <dir>/config.toml")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Show time spent on each site today")]
    Today {
        #[arg(long, default_value_t = 10, help = "Number of sites to show")]
        top: usize,
        #[arg(long = "by-category", help = "Group today's time by category instead")]
        by_category: bool,
    },
    #[command(about = "Show daily totals of the last days")]
    History {
        #[arg(long, default_value_t = 7, help = "Number of days, today included")]
        days: u32,
    },
    #[command(about = "Show the share of a day spent on work sites")]
    Score {
        #[command(flatten)]
        command: ScoreCommand,
    },
    #[command(about = "List category rules in the order they are matched")]
    Categories {},
    #[command(about = "Create a category or replace its patterns")]
    SetCategory {
        name: String,
        #[arg(
            required = true,
            help = "Substrings of domains belonging to the category, e.g. github.com"
        )]
        patterns: Vec<String>,
    },
    #[command(about = "Write all stored data as json")]
    Export {
        #[arg(long, short, help = "File to write into. Prints to stdout by default")]
        output: Option<PathBuf>,
    },
    #[command(about = "Delete all tracked time and categories")]
    Clear {
        #[arg(long, help = "Confirm deleting everything")]
        yes: bool,
    },
    #[command(
        about = "Run a daemon directly in current console, reading browser events from stdin. Used by the browser bridge and for debugging"
    )]
    Serve {},
}

pub type CliEngine = Engine<JsonFileStore>;

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = application_path(args.dir)?;
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;
    let config = Config::load_from(&app_dir, args.config.as_deref())?;

    match args.commands {
        Commands::Today { top, by_category } => {
            process_today_command(&open_engine(&app_dir, &config)?, top, by_category).await
        }
        Commands::History { days } => {
            process_history_command(&open_engine(&app_dir, &config)?, days).await
        }
        Commands::Score { command } => {
            process_score_command(&open_engine(&app_dir, &config)?, command).await
        }
        Commands::Categories {} => {
            process_categories_command(&open_engine(&app_dir, &config)?).await
        }
        Commands::SetCategory { name, patterns } => {
            process_set_category_command(&open_engine(&app_dir, &config)?, &name, &patterns).await
        }
        Commands::Export { output } => {
            process_export_command(&open_engine(&app_dir, &config)?, output).await
        }
        Commands::Clear { yes } => {
            process_clear_command(&open_engine(&app_dir, &config)?, yes).await
        }
        Commands::Serve {} => start_daemon(app_dir, config).await,
    }
}

/// The cli shares the daemon's store. It never seeds categories, that is left to the daemon.
fn open_engine(app_dir: &Path, config: &Config) -> Result<CliEngine> {
    Ok(Engine::new(
        JsonFileStore::new(store_path(app_dir))?,
        Arc::new(DefaultClock),
        config.engine(),
    ))
}
