use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platforms posts are collected from.
///
/// Ordering is used for deterministic iteration in aggregate maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Reddit,
    Stocktwits,
    X,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Reddit, Source::Stocktwits, Source::X];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::Stocktwits => "stocktwits",
            Source::X => "x",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collection window accepted by the query entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    #[default]
    #[serde(rename = "24h")]
    Hours24,
    #[serde(rename = "7d")]
    Days7,
    #[serde(rename = "1w")]
    Weeks1,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid window \"{0}\"; expected one of 24h, 7d, 1w")]
pub struct InvalidWindow(pub String);

impl Window {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Window::Hours24 => "24h",
            Window::Days7 => "7d",
            Window::Weeks1 => "1w",
        }
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        match self {
            Window::Hours24 => TimeDelta::hours(24),
            Window::Days7 | Window::Weeks1 => TimeDelta::days(7),
        }
    }

    /// Earliest creation time a post may have to fall inside this window.
    #[must_use]
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Window {
    type Err = InvalidWindow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" => Ok(Window::Hours24),
            "7d" => Ok(Window::Days7),
            "1w" => Ok(Window::Weeks1),
            _ => Err(InvalidWindow(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_parses_all_variants() {
        assert_eq!("24h".parse::<Window>().unwrap(), Window::Hours24);
        assert_eq!("7d".parse::<Window>().unwrap(), Window::Days7);
        assert_eq!(" 1W ".parse::<Window>().unwrap(), Window::Weeks1);
    }

    #[test]
    fn window_rejects_unknown_value() {
        let err = "3d".parse::<Window>().unwrap_err();
        assert_eq!(err, InvalidWindow("3d".to_string()));
    }

    #[test]
    fn week_windows_cover_same_span() {
        assert_eq!(Window::Days7.duration(), Window::Weeks1.duration());
        assert_eq!(Window::Hours24.duration(), TimeDelta::hours(24));
    }

    #[test]
    fn window_serializes_as_wire_string() {
        let json = serde_json::to_string(&Window::Days7).unwrap();
        assert_eq!(json, "\"7d\"");
    }

    #[test]
    fn source_serializes_lowercase() {
        let json = serde_json::to_string(&Source::Stocktwits).unwrap();
        assert_eq!(json, "\"stocktwits\"");
        assert_eq!(Source::X.to_string(), "x");
    }
}
