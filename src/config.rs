use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cartophile", about = "Postcard catalog and moderation server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub uploads: UploadConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection details for the backend-as-a-service: the table data API,
/// the identity provider and object storage all live under one base URL.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Standard (anonymous) API key, used for identity-provider calls.
    pub anon_key: String,
    /// Elevated-privilege key, used for data and storage calls.
    pub service_key: String,
    pub bucket: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secret: String,
    pub max_age_hours: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UploadConfig {
    /// Request body ceiling in bytes.
    pub max_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            service_key: String::new(),
            bucket: "postcard-images".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "cartophile_session".to_string(),
            secret: String::new(),
            max_age_hours: 720,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("cartophile.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Environment overrides for secrets and endpoints
        config.apply_env(|name| std::env::var(name).ok());

        if config.backend.url.is_empty() {
            anyhow::bail!("backend URL not configured (set BACKEND_URL or [backend] url)");
        }
        if config.session.secret.is_empty() {
            anyhow::bail!("session secret not configured (set SECRET_KEY or [session] secret)");
        }

        Ok(config)
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(url) = get("BACKEND_URL") {
            self.backend.url = url;
        }
        if let Some(key) = get("BACKEND_ANON_KEY") {
            self.backend.anon_key = key;
        }
        if let Some(key) = get("BACKEND_SERVICE_KEY") {
            self.backend.service_key = key;
        }
        if let Some(bucket) = get("BACKEND_BUCKET") {
            self.backend.bucket = bucket;
        }
        if let Some(secret) = get("SECRET_KEY") {
            self.session.secret = secret;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.cookie_name, "cartophile_session");
        assert_eq!(config.session.max_age_hours, 720);
        assert_eq!(config.backend.bucket, "postcard-images");
        assert_eq!(config.uploads.max_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("cartophile.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[backend]
url = "https://example.backend.test"
anon_key = "anon"
service_key = "service"
bucket = "cards"

[session]
cookie_name = "my_cookie"
secret = "s3cret"
max_age_hours = 24
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: None,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.backend.url, "https://example.backend.test");
        assert_eq!(config.backend.bucket, "cards");
        assert_eq!(config.session.cookie_name, "my_cookie");
        assert_eq!(config.session.max_age_hours, 24);
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("cartophile.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[backend]
url = "https://example.backend.test"

[session]
secret = "s3cret"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn env_overrides_fill_backend_and_secret() {
        let mut config = Config::default();
        config.apply_env(|name| match name {
            "BACKEND_URL" => Some("https://env.backend.test".into()),
            "BACKEND_ANON_KEY" => Some("env-anon".into()),
            "BACKEND_SERVICE_KEY" => Some("env-service".into()),
            "SECRET_KEY" => Some("env-secret".into()),
            _ => None,
        });
        assert_eq!(config.backend.url, "https://env.backend.test");
        assert_eq!(config.backend.anon_key, "env-anon");
        assert_eq!(config.backend.service_key, "env-service");
        assert_eq!(config.session.secret, "env-secret");
        assert_eq!(config.backend.bucket, "postcard-images");
    }

    #[test]
    fn load_fails_without_backend_url() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/cartophile.toml")),
            host: None,
            port: None,
        };
        // No config file and (in the test environment) no BACKEND_URL.
        if std::env::var("BACKEND_URL").is_err() {
            assert!(Config::load(&cli).is_err());
        }
    }
}
