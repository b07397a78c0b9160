use std::{fmt::Display, ops::Deref};

use serde::{Deserialize, Serialize};
use tracing::trace;
use url::Url;

use super::error::EngineError;

/// Normalized hostname used to group time spent on different pages of the same site.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Domain {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Deref for Domain {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

const TRACKABLE_SCHEMES: [&str; 2] = ["http", "https"];

/// Parses a url into its [Domain]. Hosts are lowercased and default ports dropped by the url
/// parser, a non default port stays part of the key.
pub fn parse_domain(url: &str) -> Result<Domain, EngineError> {
    let invalid = || EngineError::InvalidUrl(url.to_owned());

    let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
    if !TRACKABLE_SCHEMES.contains(&parsed.scheme()) {
        return Err(invalid());
    }
    let host = parsed
        .host_str()
        .map(|v| v.trim_end_matches('.').to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .ok_or_else(invalid)?;

    Ok(match parsed.port() {
        Some(port) => Domain(format!("{host}:{port}")),
        None => Domain(host),
    })
}

/// Resolves a url the way trackers need it: anything that isn't a trackable url simply has no
/// domain.
pub fn resolve(url: Option<&str>) -> Option<Domain> {
    let url = url?;
    parse_domain(url)
        .inspect_err(|e| trace!("Not tracking {e}"))
        .ok()
}
