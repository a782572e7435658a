use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tuner_core::{AnalysisConfig, LiveConfig};

const CONFIG_ENV: &str = "FRETSCOPE_CONFIG";
const CONFIG_FILE: &str = "fretscope.config.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Largest accepted request body.
    pub upload_limit_bytes: usize,
    /// Where uploads are spooled while being decoded. System temp dir if unset.
    pub temp_dir: Option<PathBuf>,
    /// Browser origin allowed to call the API. Any origin if unset.
    pub cors_origin: Option<String>,
    pub analysis: AnalysisConfig,
    pub live: LiveConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:6001".to_string(),
            upload_limit_bytes: 30 * 1024 * 1024,
            temp_dir: None,
            cors_origin: None,
            analysis: AnalysisConfig::default(),
            live: LiveConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads from `FRETSCOPE_CONFIG`, then `./fretscope.config.json`, then defaults.
    ///
    /// A `PORT` environment variable replaces the port of `listen_addr` and
    /// `CORS_ORIGIN` replaces `cors_origin`.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(CONFIG_ENV) {
            Self::load_from_path(Path::new(&p))?
        } else {
            let local = std::env::current_dir()
                .context("resolving working directory")?
                .join(CONFIG_FILE);
            if local.exists() {
                Self::load_from_path(&local)?
            } else {
                Self::default()
            }
        };

        if let Ok(port) = std::env::var("PORT") {
            cfg.apply_port(&port)?;
        }
        if let Ok(origin) = std::env::var("CORS_ORIGIN") {
            cfg.apply_cors_origin(&origin);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path(cfg_path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(cfg_path).with_context(|| format!("Failed to read {cfg_path:?}"))?;
        let cfg: Self = serde_json::from_str(&raw).with_context(|| format!("Invalid {cfg_path:?}"))?;
        Ok(cfg)
    }

    pub fn apply_port(&mut self, port: &str) -> Result<()> {
        let port: u16 = port.trim().parse().with_context(|| format!("Invalid PORT {port:?}"))?;
        let host = self
            .listen_addr
            .rsplit_once(':')
            .map_or(self.listen_addr.as_str(), |(host, _)| host);
        self.listen_addr = format!("{host}:{port}");
        Ok(())
    }

    /// An empty value clears the origin.
    pub fn apply_cors_origin(&mut self, origin: &str) {
        let origin = origin.trim();
        self.cors_origin = (!origin.is_empty()).then(|| origin.to_string());
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.live.validate()?;
        Ok(())
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
