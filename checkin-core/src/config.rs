use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_HOST_ENV: &str = "CHECKIN_API_HOST";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default = "default_version")]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub still_image: Option<PathBuf>,
    #[serde(default = "default_placeholder_poll_secs")]
    pub placeholder_poll_secs: f64,
}

fn default_version() -> u32 { 1 }
fn default_api_host() -> String { "http://localhost:8796".to_string() }
fn default_timeout_secs() -> f64 { 30.0 }
fn default_frame_width() -> u32 { 640 }
fn default_frame_height() -> u32 { 480 }
fn default_warmup_frames() -> u32 { 5 }
fn default_jpeg_quality() -> u8 { 90 }
fn default_placeholder_poll_secs() -> f64 { 2.0 }

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            camera: CameraConfig::default(),
            version: default_version(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: None,
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            warmup_frames: default_warmup_frames(),
            jpeg_quality: default_jpeg_quality(),
            still_image: None,
            placeholder_poll_secs: default_placeholder_poll_secs(),
        }
    }
}

impl ServiceConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_host.trim_end_matches('/')
    }

    /// Zero disables the timeout, as does a value too large to represent.
    pub fn timeout(&self) -> Duration {
        seconds(self.timeout_secs.max(0.0)).unwrap_or(Duration::ZERO)
    }
}

impl CameraConfig {
    pub fn placeholder_poll(&self) -> Duration {
        seconds(self.placeholder_poll_secs.max(0.1)).unwrap_or(Duration::MAX)
    }
}

fn seconds(value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{} is not a valid duration", value))
}

impl CheckinConfig {
    /// Reads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            let config: CheckinConfig = serde_json::from_str(&content)
                .with_context(|| format!("Invalid config {:?}", path))?;
            config
                .validate()
                .with_context(|| format!("Invalid config {:?}", path))?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Rejects durations too large to represent.
    pub fn validate(&self) -> Result<()> {
        seconds(self.service.timeout_secs.max(0.0)).context("service.timeout_secs")?;
        seconds(self.camera.placeholder_poll_secs.max(0.1))
            .context("camera.placeholder_poll_secs")?;
        Ok(())
    }

    /// Explicit path if given, else the first of the user and system
    /// config files that exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file {:?} does not exist", path);
            }
            return Self::load(path);
        }

        for candidate in default_config_paths() {
            if candidate.exists() {
                return Self::load(&candidate);
            }
        }

        Ok(Self::default())
    }

    /// `CHECKIN_API_HOST` replaces the configured host when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var(API_HOST_ENV) {
            let host = host.trim();
            if !host.is_empty() {
                info!("Using API host from {}: {}", API_HOST_ENV, host);
                self.service.api_host = host.to_string();
            }
        }
    }
}

pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("checkin").join("config.json"));
    }
    paths.push(PathBuf::from("/etc/checkin/config.json"));
    paths
}
