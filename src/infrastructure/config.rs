use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const TIMER_JSON: &str = "timer.json";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_BREAK_MINUTES: u64 = 5;
const DEFAULT_DAILY_TARGET: u64 = 11;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub api_base_url: String,
    pub timezone: Tz,
    pub daily_target: u32,
    pub default_break_seconds: u32,
    pub notifications_enabled: bool,
    pub debug_commands: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timezone: Tz::UTC,
            daily_target: DEFAULT_DAILY_TARGET as u32,
            default_break_seconds: (DEFAULT_BREAK_MINUTES * 60) as u32,
            notifications_enabled: true,
            debug_commands: false,
        }
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Tomatask",
                "apiBaseUrl": DEFAULT_API_BASE_URL,
                "timezone": "UTC",
                "notificationsEnabled": true,
                "debugCommands": false
            }),
        ),
        (
            TIMER_JSON,
            serde_json::json!({
                "schema": 1,
                "dailyTarget": DEFAULT_DAILY_TARGET,
                "defaultBreakMinutes": DEFAULT_BREAK_MINUTES
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

/// Best-effort settings load: missing or malformed files fall back to
/// defaults field by field, so a broken config never blocks the timer.
pub fn load_engine_settings(config_dir: &Path) -> EngineSettings {
    load_engine_settings_with_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_engine_settings_with_lookup<F>(config_dir: &Path, lookup: F) -> EngineSettings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = EngineSettings::default();

    if let Ok(app) = read_config(&config_dir.join(APP_JSON)) {
        if let Some(base_url) = app
            .get("apiBaseUrl")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            settings.api_base_url = base_url.to_string();
        }
        if let Some(timezone) = app
            .get("timezone")
            .and_then(serde_json::Value::as_str)
            .and_then(|raw| raw.trim().parse::<Tz>().ok())
        {
            settings.timezone = timezone;
        }
        if let Some(enabled) = app
            .get("notificationsEnabled")
            .and_then(serde_json::Value::as_bool)
        {
            settings.notifications_enabled = enabled;
        }
        if let Some(debug) = app.get("debugCommands").and_then(serde_json::Value::as_bool) {
            settings.debug_commands = debug;
        }
    }

    if let Ok(timer) = read_config(&config_dir.join(TIMER_JSON)) {
        if let Some(target) = timer.get("dailyTarget").and_then(serde_json::Value::as_u64) {
            settings.daily_target = target.clamp(1, 100) as u32;
        }
        if let Some(minutes) = timer
            .get("defaultBreakMinutes")
            .and_then(serde_json::Value::as_u64)
        {
            settings.default_break_seconds = (minutes.clamp(1, 120) * 60) as u32;
        }
    }

    if let Some(base_url) = optional_lookup_value(&lookup, &["TOMATASK_API_BASE_URL"]) {
        settings.api_base_url = base_url;
    }
    if let Some(raw) = optional_lookup_value(&lookup, &["TOMATASK_DEBUG_COMMANDS"]) {
        settings.debug_commands = matches!(raw.as_str(), "1" | "true" | "yes");
    }

    settings
}

pub fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "tomatask-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn seeds_default_files_once() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("seed configs");
        assert!(dir.path.join(APP_JSON).exists());
        assert!(dir.path.join(TIMER_JSON).exists());

        fs::write(
            dir.path.join(TIMER_JSON),
            "{\"schema\":1,\"dailyTarget\":4,\"defaultBreakMinutes\":10}\n",
        )
        .expect("overwrite timer config");
        ensure_default_configs(&dir.path).expect("seed again");

        let settings = load_engine_settings_with_lookup(&dir.path, |_| None);
        assert_eq!(settings.daily_target, 4);
        assert_eq!(settings.default_break_seconds, 600);
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let dir = TempConfigDir::new();
        let settings = load_engine_settings_with_lookup(&dir.path, |_| None);
        assert_eq!(settings.daily_target, 11);
        assert_eq!(settings.default_break_seconds, 300);
        assert_eq!(settings.timezone, Tz::UTC);
        assert!(!settings.debug_commands);
    }

    #[test]
    fn env_lookup_overrides_file_values() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("seed configs");
        let settings = load_engine_settings_with_lookup(&dir.path, |key| match key {
            "TOMATASK_API_BASE_URL" => Some("https://api.tomatask.test".to_string()),
            "TOMATASK_DEBUG_COMMANDS" => Some("true".to_string()),
            _ => None,
        });
        assert_eq!(settings.api_base_url, "https://api.tomatask.test");
        assert!(settings.debug_commands);
    }

    #[test]
    fn invalid_timezone_keeps_default() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            "{\"schema\":1,\"timezone\":\"Mars/Olympus\"}\n",
        )
        .expect("write app config");
        let settings = load_engine_settings_with_lookup(&dir.path, |_| None);
        assert_eq!(settings.timezone, Tz::UTC);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(APP_JSON), "{\"schema\":2}\n").expect("write app config");
        assert!(read_config(&dir.path.join(APP_JSON)).is_err());
    }
}
