use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

const APPLICATION_DIR: &str = "sitetime";
const STORE_FILE: &str = "store.json";

/// Returns the application directory, creating it if needed. On Linux this is
/// `$XDG_STATE_HOME/sitetime` or `$HOME/.local/state/sitetime`.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = base_state_dir()?;
    path.push(APPLICATION_DIR);

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

/// Resolves `dir` if given, the default application directory otherwise.
pub fn application_path(dir: Option<PathBuf>) -> Result<PathBuf> {
    dir.map_or_else(create_application_default_path, Ok)
}

/// The single document holding every record.
pub fn store_path(app_dir: &Path) -> PathBuf {
    app_dir.join(STORE_FILE)
}

#[cfg(windows)]
fn base_state_dir() -> Result<PathBuf> {
    env::var("APPDATA")
        .map(PathBuf::from)
        .map_err(|_| anyhow!("APPDATA should be present on Windows"))
}

#[cfg(not(windows))]
fn base_state_dir() -> Result<PathBuf> {
    env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))
}
