//! Application configuration.
//!
//! The TOML file is read first; `AAS__`-prefixed environment variables then
//! override the scalar server settings, e.g. `AAS__API__PORT=9000` or
//! `AAS__STATE_FILE=/var/lib/aas/state.json`.

use crate::error::{AppError, AppResult};
use aas_api::ApiConfig;
use aas_core::{default_coords, Coords, SimConfig};
use aas_persistence::DEFAULT_STATE_FILE;
use config::Environment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file used when neither `--config` nor `AAS_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Top-level configuration of the `aas-sim` server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    /// JSON file holding the persisted simulation state.
    #[serde(default = "default_state_file")]
    pub state_file: String,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Initial simulation parameters. A persisted state file takes precedence.
    #[serde(default)]
    pub simulation: SimConfig,
    /// Initial coordinate system. A `[coords]` table is merged over the
    /// built-in sites.
    #[serde(default = "default_coords", deserialize_with = "merge_coords")]
    pub coords: Coords,
}

fn merge_coords<'de, D>(deserializer: D) -> Result<Coords, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = Coords::deserialize(deserializer)?;
    let mut coords = default_coords();
    coords.extend(overrides);
    Ok(coords)
}

fn default_state_file() -> String {
    DEFAULT_STATE_FILE.to_string()
}

fn default_log_filter() -> String {
    "info,aas_engine=debug".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            state_file: default_state_file(),
            log_filter: default_log_filter(),
            simulation: SimConfig::default(),
            coords: default_coords(),
        }
    }
}

/// Values accepted from the environment. Only snake_case keys live here
/// since the environment source lowercases every key.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    #[serde(default)]
    api: ApiOverrides,
    state_file: Option<String>,
    log_filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiOverrides {
    host: Option<String>,
    port: Option<u16>,
    cors_origins: Option<Vec<String>>,
    event_interval_ms: Option<u64>,
    max_event_connections: Option<usize>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn from_file_or_default(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from `AAS__*` environment variables.
    pub fn with_env_overrides(self) -> AppResult<Self> {
        self.with_overrides(Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("AAS")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("api.cors_origins")
    }

    fn with_overrides(mut self, source: Environment) -> AppResult<Self> {
        let overrides: EnvOverrides = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        if let Some(v) = overrides.state_file {
            self.state_file = v;
        }
        if let Some(v) = overrides.log_filter {
            self.log_filter = v;
        }
        let api = overrides.api;
        if let Some(v) = api.host {
            self.api.host = v;
        }
        if let Some(v) = api.port {
            self.api.port = v;
        }
        if let Some(v) = api.cors_origins {
            self.api.cors_origins = v;
        }
        if let Some(v) = api.event_interval_ms {
            self.api.event_interval_ms = v;
        }
        if let Some(v) = api.max_event_connections {
            self.api.max_event_connections = v;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.api.event_interval_ms == 0 {
            return Err(AppError::Config(
                "api.event_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.api.max_event_connections == 0 {
            return Err(AppError::Config(
                "api.max_event_connections must be greater than 0".to_string(),
            ));
        }
        if self.state_file.trim().is_empty() {
            return Err(AppError::Config("state_file must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aas_core::{ENGRAVER_DOCK, JOB_POS1};
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::environment().source(Some(map))
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.state_file, DEFAULT_STATE_FILE);
        assert_eq!(config.coords[JOB_POS1], (12.0, 8.0));
    }

    #[test]
    fn test_from_file_reads_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
state_file = "/tmp/aas-state.json"

[api]
port = 9100
cors_origins = ["*"]

[simulation]
currency = "USD"

[simulation.agv]
costPerMeter_EUR = 0.05

[coords]
HOME = [1.0, 1.0]
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.api.port, 9100);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.state_file, "/tmp/aas-state.json");
        assert_eq!(config.simulation.currency, "USD");
        assert_eq!(config.simulation.agv.cost_per_meter_eur, 0.05);
        assert_eq!(config.simulation.agv.speed_m_per_s, 0.5);
        assert_eq!(config.coords["HOME"], (1.0, 1.0));
        assert_eq!(config.coords.len(), default_coords().len());
    }

    #[test]
    fn test_partial_coords_keep_builtin_sites() {
        let config: AppConfig = toml::from_str(
            r#"
[coords]
JOB_POS1 = [3.0, 4.0]
"#,
        )
        .unwrap();
        assert_eq!(config.coords[JOB_POS1], (3.0, 4.0));
        assert_eq!(config.coords[ENGRAVER_DOCK], default_coords()[ENGRAVER_DOCK]);
        assert_eq!(config.coords.len(), default_coords().len());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api\nport = ").unwrap();
        let err = AppConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.starts_with("Failed to parse config")));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = AppConfig::from_file_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_env_overrides_server_settings() {
        let config = AppConfig::default()
            .with_overrides(env(&[
                ("AAS__API__PORT", "9000"),
                ("AAS__API__CORS_ORIGINS", "http://a:1,http://b:2"),
                ("AAS__STATE_FILE", "/data/state.json"),
            ]))
            .unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(
            config.api.cors_origins,
            vec!["http://a:1".to_string(), "http://b:2".to_string()]
        );
        assert_eq!(config.state_file, "/data/state.json");
        assert_eq!(config.api.event_interval_ms, 1000);
    }

    #[test]
    fn test_no_env_keeps_file_values() {
        let base = AppConfig {
            log_filter: "warn".to_string(),
            ..AppConfig::default()
        };
        let config = base.clone().with_overrides(env(&[])).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = AppConfig::default()
            .with_overrides(env(&[("AAS__API__EVENT_INTERVAL_MS", "0")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
