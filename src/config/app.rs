//! Application configuration loading from config.toml
//!
//! The file carries the settlement tolerance, an optional database URL and an
//! optional list of trips to seed on first run. Every section is optional; a
//! missing file is not an error for the binary, which falls back to defaults.

use crate::core::settlement::DEFAULT_EPSILON;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Settlement engine settings
    #[serde(default)]
    pub settlement: SettlementConfig,
    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Trips to create when missing
    #[serde(default)]
    pub trips: Vec<TripConfig>,
}

/// `[settlement]` section
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SettlementConfig {
    /// Currency tolerance used for the zero-sum check and for treating a balance as settled
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
        }
    }
}

const fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

/// `[database]` section
#[derive(Debug, Default, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Connection URL; `DATABASE_URL` in the environment takes precedence
    pub url: Option<String>,
}

/// One `[[trips]]` entry to seed
#[derive(Debug, Deserialize, Clone)]
pub struct TripConfig {
    /// Trip id (also used as the live-query key)
    pub id: String,
    /// Trip name
    pub name: String,
    /// Members of the trip
    #[serde(default)]
    pub participants: Vec<ParticipantConfig>,
    /// Budget categories
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,
}

/// A participant of a seeded trip
#[derive(Debug, Deserialize, Clone)]
pub struct ParticipantConfig {
    /// User id
    pub user_id: String,
    /// Name used in reports; defaults to the user id
    pub display_name: Option<String>,
}

/// A category of a seeded trip
#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    /// Category name
    pub name: String,
    /// Emoji shown next to the name
    #[serde(default)]
    pub emoji: String,
    /// Planned budget
    #[serde(default)]
    pub budget: f64,
}

impl AppConfig {
    /// Checks values serde cannot express.
    ///
    /// # Errors
    /// Returns `Error::Config` for a non-positive or non-finite epsilon, duplicate
    /// trip ids or empty trip ids.
    pub fn validate(&self) -> Result<()> {
        if !self.settlement.epsilon.is_finite() || self.settlement.epsilon <= 0.0 {
            return Err(Error::Config {
                message: format!(
                    "settlement.epsilon must be a positive number, got {}",
                    self.settlement.epsilon
                ),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for trip in &self.trips {
            if trip.id.trim().is_empty() {
                return Err(Error::Config {
                    message: "trip id cannot be empty".to_string(),
                });
            }
            if !seen.insert(trip.id.as_str()) {
                return Err(Error::Config {
                    message: format!("duplicate trip id '{}'", trip.id),
                });
            }
        }
        Ok(())
    }
}

/// Parses and validates configuration from a TOML string.
///
/// # Errors
/// Returns an error if the TOML syntax is invalid or validation fails.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Validation fails
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Loads configuration from `./config.toml`, or defaults when the file does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_default_config() -> Result<AppConfig> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_config(path)
    } else {
        debug!("No config.toml found, using defaults");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [settlement]
            epsilon = 0.001

            [database]
            url = "sqlite::memory:"

            [[trips]]
            id = "lisbon"
            name = "Lisbon"

            [[trips.participants]]
            user_id = "ana"
            display_name = "Ana"

            [[trips.participants]]
            user_id = "ben"

            [[trips.categories]]
            name = "Food"
            emoji = "🍜"
            budget = 300.0
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.settlement.epsilon, 0.001);
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.trips.len(), 1);
        let trip = &config.trips[0];
        assert_eq!(trip.id, "lisbon");
        assert_eq!(trip.participants.len(), 2);
        assert_eq!(trip.participants[0].display_name.as_deref(), Some("Ana"));
        assert!(trip.participants[1].display_name.is_none());
        assert_eq!(trip.categories[0].budget, 300.0);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.settlement.epsilon, DEFAULT_EPSILON);
        assert!(config.database.url.is_none());
        assert!(config.trips.is_empty());
    }

    #[test]
    fn test_rejects_non_positive_epsilon() {
        let result = parse_config("[settlement]\nepsilon = 0.0\n");
        assert!(matches!(result, Err(Error::Config { message: _ })));
    }

    #[test]
    fn test_rejects_duplicate_trip_ids() {
        let toml_str = r#"
            [[trips]]
            id = "t1"
            name = "One"

            [[trips]]
            id = "t1"
            name = "Again"
        "#;
        assert!(matches!(
            parse_config(toml_str),
            Err(Error::Config { message: _ })
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            parse_config("[[trips]\nid ="),
            Err(Error::Config { message: _ })
        ));
    }
}
