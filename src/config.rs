use dotenvy::dotenv;
use std::env;

pub const DEFAULT_DB_URL: &str = "sqlite://sample_vault.db?mode=rwc";
pub const DEFAULT_ACCESS_PASSWORD: &str = "20770";

#[derive(Clone, Debug)]
pub struct Config {
    pub app_name: String,
    pub db_url: String,
    pub access_password: String,
    pub default_editor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok(); // Load from .env file if available

        Config {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "sample-vault".to_string()),
            db_url: env::var("SAMPLE_VAULT_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_string()),
            access_password: env::var("SAMPLE_VAULT_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_ACCESS_PASSWORD.to_string()),
            default_editor: env::var("SAMPLE_VAULT_EDITOR")
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            app_name: "sample-vault-test".to_string(),
            db_url: "sqlite::memory:".to_string(),
            access_password: "letmein".to_string(),
            default_editor: None,
        }
    }
}
