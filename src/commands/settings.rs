use crate::analysis::risk_level::RiskLevelPolicy;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SETTINGS_SCHEMA_VERSION: i64 = 2;
const DEFAULT_SETTINGS_FILE: &str = "settings.json";
const DEFAULT_JOINED_BANK_START: &str = "2015-01-01";
const DEFAULT_JOINED_BANK_END: &str = "2025-05-16";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Csv,
    Sqlite,
}

/// Date range and seed used to synthesize `Joined_Bank` when the dataset
/// has no such column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedBankWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub dataset_source: DatasetKind,
    pub csv_path: PathBuf,
    pub database_path: PathBuf,
    pub seed_database_from_csv: bool,
    pub import_risk_level_policy: RiskLevelPolicy,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub default_page_size: usize,
    /// Upper bound on `pageSize`; `None` accepts any size.
    pub max_page_size: Option<usize>,
    pub allowed_origins: Vec<String>,
    pub joined_bank: JoinedBankWindow,
}

impl Default for Settings {
    fn default() -> Self {
        effective_settings(&migrate_settings(json!({})))
    }
}

impl Settings {
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }

    /// `HOST` and `PORT` take precedence over the settings file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            self.host = host.trim().to_string();
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or(ConfigError::InvalidPort(port))?;
        }
        Ok(())
    }
}

/// `BANKRISK_SETTINGS` if set, `settings.json` otherwise.
pub fn settings_path() -> PathBuf {
    std::env::var_os("BANKRISK_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = load_settings_value(path)?;
    Ok(effective_settings(&migrate_settings(raw)))
}

/// Raw settings document; a missing file reads as an empty object.
pub fn load_settings_value(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        log::info!("No settings file at {}, using defaults", path.display());
        return Ok(json!({}));
    }

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str::<Value>(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn effective_settings(settings: &Value) -> Settings {
    let text = |key: &str, default: &str| -> String {
        settings
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let number = |key: &str, default: u64| settings.get(key).and_then(Value::as_u64).unwrap_or(default);
    let date = |key: &str, default: &str| {
        parse_date(settings.get(key).and_then(Value::as_str).unwrap_or(default))
            .or_else(|| parse_date(default))
            .unwrap_or_default()
    };

    let dataset_source = match settings.get("datasetSource").and_then(Value::as_str) {
        Some("sqlite") => DatasetKind::Sqlite,
        _ => DatasetKind::Csv,
    };
    let import_risk_level_policy = match settings.get("importRiskLevelPolicy").and_then(Value::as_str) {
        Some("defaultLabel") => RiskLevelPolicy::DefaultLabel,
        _ => RiskLevelPolicy::DebtRatio,
    };
    let allowed_origins = settings
        .get("allowedOrigins")
        .and_then(Value::as_array)
        .map(|origins| {
            origins
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Settings {
        host: text("host", "0.0.0.0"),
        port: number("port", 8000) as u16,
        dataset_source,
        csv_path: PathBuf::from(text("csvPath", "Structured_Banking_Risk_Real_Values.csv")),
        database_path: PathBuf::from(text("databasePath", "banking.db")),
        seed_database_from_csv: settings
            .get("seedDatabaseFromCsv")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        import_risk_level_policy,
        model_path: PathBuf::from(text("modelPath", "default_risk_model.json")),
        scaler_path: PathBuf::from(text("scalerPath", "scaler.json")),
        default_page_size: number("defaultPageSize", 10) as usize,
        max_page_size: settings.get("maxPageSize").and_then(Value::as_u64).map(|max| max as usize),
        allowed_origins,
        joined_bank: JoinedBankWindow {
            start: date("joinedBankStart", DEFAULT_JOINED_BANK_START),
            end: date("joinedBankEnd", DEFAULT_JOINED_BANK_END),
            seed: number("joinedBankSeed", 42),
        },
    }
}

fn migrate_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 1 {
        // Pre-v1 files pointed at the dataset with `dataset`.
        rename_key(&mut out, "dataset", "csvPath");
    }

    if version < 2 {
        // V2 splits page size into a default and an upper bound.
        rename_key(&mut out, "pageSize", "defaultPageSize");
    }

    deep_merge_defaults(&mut out, &default_settings());
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "host": "0.0.0.0",
        "port": 8000,
        "datasetSource": "csv",
        "csvPath": "Structured_Banking_Risk_Real_Values.csv",
        "databasePath": "banking.db",
        "seedDatabaseFromCsv": true,
        "importRiskLevelPolicy": "debtRatio",
        "modelPath": "default_risk_model.json",
        "scalerPath": "scaler.json",
        "defaultPageSize": 10,
        "maxPageSize": null,
        "allowedOrigins": ["http://localhost:3000"],
        "joinedBankStart": DEFAULT_JOINED_BANK_START,
        "joinedBankEnd": DEFAULT_JOINED_BANK_END,
        "joinedBankSeed": 42
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object()) else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn rename_key(target: &mut Value, from: &str, to: &str) {
    if let Some(obj) = target.as_object_mut() {
        if let Some(value) = obj.remove(from) {
            obj.entry(to.to_string()).or_insert(value);
        }
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "port", 1, 65535, 8000);
    // No cap unless one is configured.
    let max_page_size = match obj.get("maxPageSize").and_then(Value::as_u64) {
        Some(max) => {
            clamp_u64(obj, "maxPageSize", 1, u64::MAX, max);
            max.max(1)
        }
        None => {
            obj.insert("maxPageSize".to_string(), Value::Null);
            u64::MAX
        }
    };
    clamp_u64(obj, "defaultPageSize", 1, max_page_size, 10.min(max_page_size));
    clamp_u64(obj, "joinedBankSeed", 0, u64::MAX, 42);

    sanitize_enum(obj, "datasetSource", &["csv", "sqlite"], "csv");
    sanitize_enum(obj, "importRiskLevelPolicy", &["debtRatio", "defaultLabel"], "debtRatio");

    ensure_bool(obj, "seedDatabaseFromCsv", true);

    for (key, default) in [
        ("host", "0.0.0.0"),
        ("csvPath", "Structured_Banking_Risk_Real_Values.csv"),
        ("databasePath", "banking.db"),
        ("modelPath", "default_risk_model.json"),
        ("scalerPath", "scaler.json"),
    ] {
        ensure_non_empty_string(obj, key, default);
    }

    sanitize_string_list(obj, "allowedOrigins");
    sanitize_date_window(obj);
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn sanitize_enum(map: &mut Map<String, Value>, key: &str, allowed: &[&str], default: &str) {
    let valid = map
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| allowed.contains(value))
        .unwrap_or(default);
    map.insert(key.to_string(), json!(valid));
}

fn ensure_bool(map: &mut Map<String, Value>, key: &str, default: bool) {
    let value = map.get(key).and_then(Value::as_bool).unwrap_or(default);
    map.insert(key.to_string(), json!(value));
}

fn ensure_non_empty_string(map: &mut Map<String, Value>, key: &str, default: &str) {
    let value = map
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string();
    map.insert(key.to_string(), json!(value));
}

fn sanitize_string_list(map: &mut Map<String, Value>, key: &str) {
    let items: Vec<String> = map
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    map.insert(key.to_string(), json!(items));
}

fn sanitize_date_window(map: &mut Map<String, Value>) {
    let read = |map: &Map<String, Value>, key: &str, default: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .and_then(parse_date)
            .or_else(|| parse_date(default))
    };

    let (Some(mut start), Some(mut end)) = (
        read(map, "joinedBankStart", DEFAULT_JOINED_BANK_START),
        read(map, "joinedBankEnd", DEFAULT_JOINED_BANK_END),
    ) else {
        return;
    };

    if start > end {
        std::mem::swap(&mut start, &mut end);
    }

    map.insert("joinedBankStart".to_string(), json!(start.format("%Y-%m-%d").to_string()));
    map.insert("joinedBankEnd".to_string(), json!(end.format("%Y-%m-%d").to_string()));
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
