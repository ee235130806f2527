use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const STORE_JSON: &str = "store.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub schema: u8,
}

/// Remote backend connection settings. Absent or blank values leave the app
/// in local-only mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub base_url: String,
    pub anon_key: String,
}

impl StoreConfig {
    pub fn auth_endpoint(&self) -> String {
        format!("{}/auth/v1", self.base_url.trim_end_matches('/'))
    }

    pub fn rest_endpoint(&self) -> String {
        format!("{}/rest/v1", self.base_url.trim_end_matches('/'))
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "TaskTimer",
                "timezone": "UTC"
            }),
        ),
        (
            STORE_JSON,
            serde_json::json!({
                "schema": 1,
                "baseUrl": null,
                "anonKey": null
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_app_name(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let name = app
        .get("appName")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("TaskTimer");
    Ok(name.to_string())
}

pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

pub fn read_store_config(config_dir: &Path) -> Result<Option<StoreConfig>, InfraError> {
    let store = read_config(&config_dir.join(STORE_JSON))?;
    let base_url = store
        .get("baseUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);
    let anon_key = store
        .get("anonKey")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    match (base_url, anon_key) {
        (Some(base_url), Some(anon_key)) => Ok(Some(StoreConfig { base_url, anon_key })),
        (None, None) => Ok(None),
        _ => Err(InfraError::InvalidConfig(
            "store.json must set both baseUrl and anonKey or neither".to_string(),
        )),
    }
}

pub fn save_store_config(config_dir: &Path, config: &StoreConfig) -> Result<(), InfraError> {
    let base_url = config.base_url.trim();
    let anon_key = config.anon_key.trim();
    if base_url.is_empty() || anon_key.is_empty() {
        return Err(InfraError::InvalidConfig(
            "store baseUrl and anonKey must not be empty".to_string(),
        ));
    }

    let path = config_dir.join(STORE_JSON);
    let mut store = read_config(&path)?;
    let object = store.as_object_mut().ok_or_else(|| {
        InfraError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "baseUrl".to_string(),
        serde_json::Value::String(base_url.to_string()),
    );
    object.insert(
        "anonKey".to_string(),
        serde_json::Value::String(anon_key.to_string()),
    );

    let formatted = serde_json::to_string_pretty(&store)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}
