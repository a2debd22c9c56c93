use crate::infrastructure::config::{ensure_default_configs, optional_lookup_value};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

const DATABASE_FILE: &str = "tomatask.sqlite";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub database_path: PathBuf,
}

pub fn resolve_workspace_root() -> Result<PathBuf, InfraError> {
    resolve_workspace_root_with_lookup(|key| std::env::var(key).ok())
}

pub fn resolve_workspace_root_with_lookup<F>(lookup: F) -> Result<PathBuf, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(root) = optional_lookup_value(&lookup, &["TOMATASK_HOME"]) {
        return Ok(PathBuf::from(root));
    }
    if let Some(home) = optional_lookup_value(&lookup, &["HOME", "USERPROFILE"]) {
        return Ok(PathBuf::from(home).join(".tomatask"));
    }
    Err(InfraError::InvalidConfig(
        "cannot determine workspace root: set TOMATASK_HOME".to_string(),
    ))
}

/// Creates the workspace layout, seeds missing config files and initializes
/// the sqlite database. Safe to run on every launch.
pub fn prepare_workspace(root: &Path) -> Result<WorkspacePaths, InfraError> {
    let config_dir = root.join("config");
    let state_dir = root.join("state");
    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;

    ensure_default_configs(&config_dir)?;

    let database_path = state_dir.join(DATABASE_FILE);
    initialize_database(&database_path)?;

    Ok(WorkspacePaths {
        root: root.to_path_buf(),
        config_dir,
        state_dir,
        database_path,
    })
}
