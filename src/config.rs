use anyhow::{Context, Result};
use std::{env, path::PathBuf, sync::OnceLock};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Local API server configuration
    pub server: ServerConfig,

    /// Cloud service configuration
    pub cloud: CloudConfig,

    /// Path configuration
    pub paths: PathConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct CloudConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub settings_file: PathBuf,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it
    /// loads and validates all configuration from environment variables.
    /// Subsequent calls return the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. This is intentional as the
    /// agent cannot function without valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| {
            Self::load_internal().expect("failed to load application configuration")
        })
    }

    fn load_internal() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::load()?,
            cloud: CloudConfig::load()?,
            paths: PathConfig::load()?,
        })
    }
}

impl ServerConfig {
    fn load() -> Result<Self> {
        let port = env::var("AGENT_PORT")
            .unwrap_or_else(|_| "5360".to_string())
            .parse::<u16>()
            .context("failed to parse AGENT_PORT: invalid format")?;

        Ok(Self { port })
    }
}

impl CloudConfig {
    fn load() -> Result<Self> {
        let base_url =
            env::var("CLOUD_URL").unwrap_or_else(|_| "https://cloud.printbeam.io".to_string());

        Ok(Self { base_url })
    }
}

impl PathConfig {
    fn load() -> Result<Self> {
        let settings_file = match env::var("SETTINGS_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::data_dir().join("printbeam.cfg"),
        };

        if let Some(parent) = settings_file.parent() {
            std::fs::create_dir_all(parent).context("failed to create settings directory")?;
        }

        Ok(Self { settings_file })
    }

    #[cfg(not(any(test, feature = "mock")))]
    fn data_dir() -> PathBuf {
        PathBuf::from("/data/")
    }

    // In test mode, use the temp directory to avoid the /data requirement.
    #[cfg(any(test, feature = "mock"))]
    fn data_dir() -> PathBuf {
        env::temp_dir().join("printbeam-agent-test")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_parses() {
        let config = ServerConfig::load().expect("failed to load server config");
        assert!(config.port > 0);
    }

    #[test]
    fn default_cloud_url_has_no_trailing_slash() {
        let config = CloudConfig::load().expect("failed to load cloud config");
        assert!(!config.base_url.ends_with('/'));
    }

    #[test]
    fn settings_file_lands_in_data_dir() {
        let config = PathConfig::load().expect("failed to load path config");
        assert!(config.settings_file.ends_with("printbeam.cfg"));
    }
}
