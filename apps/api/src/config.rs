use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL URL. Unset runs on the in-memory repository.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub model_path: String,
    pub enable_classifier: bool,
    pub renormalize_boost: bool,
    /// Bearer key for admin routes. Unset disables them.
    pub admin_api_key: Option<String>,
    /// CORS origins. Empty means permissive.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            database_url: non_empty("DATABASE_URL"),
            port: non_empty("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: non_empty("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            model_path: non_empty("MODEL_PATH").unwrap_or_else(|| "./models".to_string()),
            enable_classifier: non_empty("ENABLE_CLASSIFIER")
                .map(|v| parse_bool("ENABLE_CLASSIFIER", &v))
                .transpose()?
                .unwrap_or(false),
            renormalize_boost: non_empty("RENORMALIZE_BOOST")
                .map(|v| parse_bool("RENORMALIZE_BOOST", &v))
                .transpose()?
                .unwrap_or(true),
            admin_api_key: non_empty("ADMIN_API_KEY"),
            allowed_origins: non_empty("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{key} must be a boolean, got '{value}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.rust_log, "info");
        assert_eq!(c.model_path, "./models");
        assert!(c.database_url.is_none());
        assert!(!c.enable_classifier);
        assert!(c.renormalize_boost);
        assert!(c.admin_api_key.is_none());
        assert!(c.allowed_origins.is_empty());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/orientation"),
            ("ENABLE_CLASSIFIER", "true"),
            ("RENORMALIZE_BOOST", "off"),
            ("ADMIN_API_KEY", "k"),
            ("ALLOWED_ORIGINS", "http://localhost:3000, https://localhost:3000,"),
        ])
        .unwrap();
        assert_eq!(c.port, 9000);
        assert!(c.enable_classifier);
        assert!(!c.renormalize_boost);
        assert_eq!(c.admin_api_key.as_deref(), Some("k"));
        assert_eq!(
            c.allowed_origins,
            vec!["http://localhost:3000", "https://localhost:3000"]
        );
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let c = config(&[("DATABASE_URL", "  "), ("ADMIN_API_KEY", "")]).unwrap();
        assert!(c.database_url.is_none());
        assert!(c.admin_api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config(&[("PORT", "not-a-port")]).is_err());
        assert!(config(&[("ENABLE_CLASSIFIER", "maybe")]).is_err());
    }
}
