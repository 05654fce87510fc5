use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub confirmation_code_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days)
    }

    pub fn code_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.confirmation_code_ttl_minutes)
    }
}

/// Where confirmation codes are delivered.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailBackend {
    #[default]
    Log,
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub from: String,
    pub file_dir: PathBuf,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::Log,
            from: "noreply@reviews.local".into(),
            file_dir: PathBuf::from("./sent_mail"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("auth.access_token_ttl_minutes", 24 * 60)?
            .set_default("auth.refresh_token_ttl_days", 30)?
            .set_default("auth.confirmation_code_ttl_minutes", 15)?
            .set_default("mail.backend", "log")?
            .set_default("mail.from", "noreply@reviews.local")?
            .set_default("mail.file_dir", "./sent_mail")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., REVIEWS__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("REVIEWS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
