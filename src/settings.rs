use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Server {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct Smtp {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notifications {
    pub admin_email: String,
    pub reset_password_url: String,
    pub brand: String,
}

#[derive(Debug, Deserialize)]
pub struct Otp {
    pub secret: Option<String>,
    pub step_seconds: u64,
    pub digits: u32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub storage: Storage,
    pub postgres: Postgres,
    pub smtp: Smtp,
    pub notifications: Notifications,
    pub otp: Otp,
}

impl Settings {
    /// Loads `path` (optional) layered with `BROKERAGE_*` variables and the
    /// legacy flat variables (`PORT`, `DATABASE_URL`, `EMAIL_USER`, `EMAIL_PASSWORD`).
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let legacy = |name: &str| std::env::var(name).ok();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("storage.backend", "memory")?
            .set_default("postgres.url", "postgres://localhost/brokerage")?
            .set_default("postgres.max_connections", 5)?
            .set_default("smtp.enabled", false)?
            .set_default("smtp.host", "localhost")?
            .set_default("smtp.port", 465)?
            .set_default("smtp.username", "")?
            .set_default("smtp.password", "")?
            .set_default("smtp.from", "no-reply@localhost")?
            .set_default("notifications.admin_email", "support@localhost")?
            .set_default(
                "notifications.reset_password_url",
                "http://localhost:3000/reset-password",
            )?
            .set_default("notifications.brand", "Brokerage")?
            .set_default("otp.step_seconds", 30)?
            .set_default("otp.digits", 6)?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("BROKERAGE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.port", legacy("PORT"))?
            .set_override_option("postgres.url", legacy("DATABASE_URL"))?
            .set_override_option("smtp.username", legacy("EMAIL_USER"))?
            .set_override_option("smtp.from", legacy("EMAIL_USER"))?
            .set_override_option("smtp.password", legacy("EMAIL_PASSWORD"))?
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::new("does-not-exist.toml").unwrap();

        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.smtp.port, 465);
        assert!(!settings.smtp.enabled);
        assert_eq!(settings.otp.digits, 6);
        assert!(settings.otp.secret.is_none());
        assert!(settings.server.address().ends_with(&settings.server.port.to_string()));
    }
}
