//! Converter configuration persisted next to the user profile.
//!
//! One JSON file, one recognized key; unknown keys are ignored so newer
//! and older builds can share the file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConvertError, Result};

pub const CONFIG_FILENAME: &str = ".dlas_html_converter.json";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
  /// Path to the user logo embedded into emitted viewers; empty = none.
  #[serde(default)]
  pub user_logo_path: String,
}

fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME")
    .or_else(|| std::env::var_os("USERPROFILE"))
    .map(PathBuf::from)
}

impl AppConfig {
  pub fn path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(CONFIG_FILENAME))
  }

  /// Load the profile config; a missing or unreadable file yields defaults.
  pub fn load() -> AppConfig {
    let Some(path) = Self::path() else {
      return AppConfig::default();
    };
    match std::fs::read_to_string(&path) {
      Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
        warn!(path = %path.display(), %err, "malformed config, using defaults");
        AppConfig::default()
      }),
      Err(_) => AppConfig::default(),
    }
  }

  pub fn save(&self) -> Result<()> {
    let path = Self::path().ok_or_else(|| ConvertError::Io {
      path: PathBuf::from(CONFIG_FILENAME),
      source: std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory"),
    })?;
    let text = serde_json::to_string_pretty(self).map_err(|e| ConvertError::Io {
      path: path.clone(),
      source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    std::fs::write(&path, text).map_err(|e| ConvertError::io(&path, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_keys_are_ignored() {
    let parsed: AppConfig =
      serde_json::from_str(r#"{"user_logo_path":"/tmp/logo.png","future_key":42}"#).unwrap();
    assert_eq!(parsed.user_logo_path, "/tmp/logo.png");
  }

  #[test]
  fn test_missing_key_defaults_empty() {
    let parsed: AppConfig = serde_json::from_str("{}").unwrap();
    assert!(parsed.user_logo_path.is_empty());
  }
}
