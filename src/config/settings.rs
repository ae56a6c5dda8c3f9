//! TOML-based configuration for the computed-field compiler.
//!
//! Supports a config file (fieldsql.toml) with environment variable expansion
//! in every string value.
//!
//! Example configuration:
//! ```toml
//! [users]
//! table = "${USERS_SCHEMA}.users"
//! avatar_url_prefix = "https://cdn.example.com/avatar/"
//!
//! [columns]
//! record_id = "__id"
//! created_by = "__created_by"
//!
//! [compile]
//! table_alias = "t"
//! time_zone = "Europe/Berlin"
//! cte_prefix = "level_"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Where user identities are resolved from.
    pub users: UserTableSettings,

    /// System column names on every user table.
    pub columns: SystemColumnSettings,

    /// Naming and defaults for generated SQL.
    pub compile: CompileSettings,
}

/// User directory table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserTableSettings {
    /// Physical table name, optionally schema-qualified.
    pub table: String,
    pub id_column: String,
    pub name_column: String,
    pub email_column: String,
    /// Prefix joined with the user id to form `avatarUrl`.
    pub avatar_url_prefix: String,
}

impl Default for UserTableSettings {
    fn default() -> Self {
        Self {
            table: "public.users".to_string(),
            id_column: "id".to_string(),
            name_column: "name".to_string(),
            email_column: "email".to_string(),
            avatar_url_prefix: "/api/attachments/read/public/avatar/".to_string(),
        }
    }
}

/// System column names.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemColumnSettings {
    pub record_id: String,
    pub created_by: String,
    pub last_modified_by: String,
}

impl Default for SystemColumnSettings {
    fn default() -> Self {
        Self {
            record_id: "__id".to_string(),
            created_by: "__created_by".to_string(),
            last_modified_by: "__last_modified_by".to_string(),
        }
    }
}

/// SQL generation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Alias of the main table in generated queries.
    pub table_alias: String,
    /// Time zone handed to formulas without their own.
    pub time_zone: String,
    /// Prefix of batch CTE names (`level_0`, `level_1`, ...).
    pub cte_prefix: String,
    /// Prefix of lateral join aliases.
    pub lateral_prefix: String,
    /// Alias of the derived table in batch updates.
    pub update_source_alias: String,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            table_alias: "t".to_string(),
            time_zone: "UTC".to_string(),
            cte_prefix: "level_".to_string(),
            lateral_prefix: "lat_".to_string(),
            update_source_alias: "src".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings = Self::from_toml(&content)?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Parse settings from TOML text, expand environment variables and validate.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        settings.expand_env()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Expand `${VAR}` / `$VAR` in every string setting.
    fn expand_env(&mut self) -> Result<(), SettingsError> {
        let values = [
            &mut self.users.table,
            &mut self.users.id_column,
            &mut self.users.name_column,
            &mut self.users.email_column,
            &mut self.users.avatar_url_prefix,
            &mut self.columns.record_id,
            &mut self.columns.created_by,
            &mut self.columns.last_modified_by,
            &mut self.compile.table_alias,
            &mut self.compile.time_zone,
            &mut self.compile.cte_prefix,
            &mut self.compile.lateral_prefix,
            &mut self.compile.update_source_alias,
        ];
        for value in values {
            if value.contains('$') {
                *value = expand_env_vars(value)?;
            }
        }
        Ok(())
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `FIELDSQL_CONFIG`
    /// 2. `./fieldsql.toml`
    /// 3. `~/.config/fieldsql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("FIELDSQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("fieldsql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("fieldsql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        debug!("no config file found, using defaults");
        Ok(Settings::default())
    }

    /// Reject empty identifiers.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("users.table", &self.users.table),
            ("users.id_column", &self.users.id_column),
            ("columns.record_id", &self.columns.record_id),
            ("compile.table_alias", &self.compile.table_alias),
            ("compile.cte_prefix", &self.compile.cte_prefix),
            ("compile.lateral_prefix", &self.compile.lateral_prefix),
            ("compile.update_source_alias", &self.compile.update_source_alias),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
