use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc};
use tracing::debug;

use crate::schemas::AppState;
use crate::validation::{password::PasswordPolicy, ValidationPolicy};

/// Layered service settings: built-in defaults, then an optional
/// `useradmin.toml`, then `USERADMIN__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_address: String,
    pub request_timeout_secs: u64,
    pub password: PasswordSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordSettings {
    pub min_length: usize,
    pub max_similarity: f64,
    /// Replaces the built-in common-password denylist, one entry per line.
    pub common_passwords_path: Option<PathBuf>,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_similarity: 0.7,
            common_passwords_path: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Config::builder()
            .set_default("database_url", "sqlite://useradmin.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("request_timeout_secs", 30)?
            .set_default("password.min_length", 8)?
            .set_default("password.max_similarity", 0.7)?
            .add_source(File::with_name("useradmin").required(false))
            .add_source(Environment::with_prefix("USERADMIN").separator("__"))
            .build()
            .context("failed to assemble configuration")?;

        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Build the validation policy described by the password settings.
    pub fn validation_policy(&self) -> Result<ValidationPolicy> {
        let password = PasswordPolicy::from_settings(&self.password)?;
        Ok(ValidationPolicy::new(password))
    }
}

/// Assemble the shared handler state around an open connection.
pub fn build_app_state(settings: &Settings, db: DatabaseConnection) -> Result<AppState> {
    let policy = settings.validation_policy()?;
    debug!("Password policy loaded with {} validators", policy.password().len());

    Ok(AppState {
        db,
        policy: Arc::new(policy),
    })
}
