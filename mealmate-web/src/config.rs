use serde::Deserialize;

use crate::services::analytics::{DashboardSettings, FallbackPolicy};

/// Where table reads and writes go.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// The hosted database and identity service.
    Remote,
    /// The in-process demo data set.
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_supabase_url")]
    pub supabase_url: String,
    #[serde(default)]
    pub supabase_anon_key: String,
    /// Verifies session tokens; must match the identity service's signing secret.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_data_source")]
    pub data_source: DataSource,

    // Admin dashboard
    #[serde(default)]
    pub trend_fallback: FallbackPolicy,
    #[serde(default = "default_recent_orders_limit")]
    pub recent_orders_limit: usize,
    #[serde(default = "default_trend_days")]
    pub trend_days: usize,
}

const DEVELOPMENT_JWT_SECRET: &str = "development-secret-change-in-production";

fn default_port() -> u16 { 3000 }
fn default_supabase_url() -> String { "http://localhost:54321".into() }
fn default_jwt_secret() -> String { DEVELOPMENT_JWT_SECRET.into() }
fn default_data_source() -> DataSource { DataSource::Memory }
fn default_recent_orders_limit() -> usize { 50 }
fn default_trend_days() -> usize { 14 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            supabase_url: default_supabase_url(),
            supabase_anon_key: String::new(),
            jwt_secret: default_jwt_secret(),
            data_source: default_data_source(),
            trend_fallback: FallbackPolicy::default(),
            recent_orders_limit: default_recent_orders_limit(),
            trend_days: default_trend_days(),
        }
    }
}

impl AppConfig {
    /// Read `MEALMATE_WEB__*` environment variables, e.g. `MEALMATE_WEB__PORT`.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("MEALMATE_WEB").separator("__"))
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// The hosted store needs real credentials; only demo mode runs on defaults.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.data_source == DataSource::Remote {
            anyhow::ensure!(
                !self.supabase_anon_key.trim().is_empty(),
                "MEALMATE_WEB__SUPABASE_ANON_KEY is required when data_source is remote"
            );
            anyhow::ensure!(
                !self.jwt_secret.trim().is_empty() && self.jwt_secret != DEVELOPMENT_JWT_SECRET,
                "MEALMATE_WEB__JWT_SECRET must be set when data_source is remote"
            );
        }
        Ok(())
    }

    pub fn dashboard(&self) -> DashboardSettings {
        DashboardSettings {
            recent_orders_limit: self.recent_orders_limit,
            trend_days: self.trend_days,
            trend_fallback: self.trend_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let config: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.data_source, DataSource::Memory);
        assert_eq!(config.trend_fallback, FallbackPolicy::Empty);
        assert_eq!(config.recent_orders_limit, 50);
    }

    #[test]
    fn remote_mode_requires_real_credentials() {
        let bare = config::Config::builder()
            .set_override("data_source", "remote")
            .unwrap()
            .build()
            .unwrap();
        assert!(AppConfig::from_config(bare).is_err());

        let default_secret = config::Config::builder()
            .set_override("data_source", "remote")
            .unwrap()
            .set_override("supabase_anon_key", "anon-key")
            .unwrap()
            .build()
            .unwrap();
        let err = AppConfig::from_config(default_secret).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let complete = config::Config::builder()
            .set_override("data_source", "remote")
            .unwrap()
            .set_override("supabase_anon_key", "anon-key")
            .unwrap()
            .set_override("jwt_secret", "project-jwt-secret")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(AppConfig::from_config(complete).unwrap().data_source, DataSource::Remote);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config: AppConfig = config::Config::builder()
            .set_override("data_source", "remote")
            .unwrap()
            .set_override("trend_fallback", "sample")
            .unwrap()
            .set_override("trend_days", 7)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.data_source, DataSource::Remote);
        assert_eq!(config.dashboard().trend_fallback, FallbackPolicy::Sample);
        assert_eq!(config.dashboard().trend_days, 7);
    }
}
