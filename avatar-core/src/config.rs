use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

use crate::render::RenderConfig;

/// Remote profile service credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub base_url: String,
    pub token: String,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// location_id = "524901"
/// text_color = [0, 0, 0]
/// background_animation = "bg.gif"
///
/// [publisher]
/// base_url = "https://profile.example.net"
/// token = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenWeatherMap API key.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Icon URL template with one `{}` placeholder for the condition code.
    #[serde(default = "default_icon_url_template")]
    pub icon_url_template: String,

    /// Provider city id, e.g. "524901".
    #[serde(default = "default_location_id")]
    pub location_id: String,

    /// Icon cache directory. Defaults to the platform cache dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_font_file")]
    pub font_file: PathBuf,

    #[serde(default = "default_text_color")]
    pub text_color: [u8; 3],

    #[serde(default = "default_background_color")]
    pub background_color: [u8; 3],

    /// Animated background GIF. Its presence selects the video render path.
    #[serde(default)]
    pub background_animation: Option<PathBuf>,

    /// Where the rendered artifact is written. Defaults to the working dir.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    #[serde(default)]
    pub publisher: Option<PublisherConfig>,
}

fn default_api_url() -> String {
    "http://api.openweathermap.org/data/2.5/weather".to_string()
}

fn default_icon_url_template() -> String {
    "http://openweathermap.org/img/wn/{}@2x.png".to_string()
}

fn default_location_id() -> String {
    "524901".to_string()
}

fn default_font_file() -> PathBuf {
    PathBuf::from("OpenSans-Regular.ttf")
}

fn default_text_color() -> [u8; 3] {
    [0, 0, 0]
}

fn default_background_color() -> [u8; 3] {
    [255, 255, 255]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_api_url(),
            icon_url_template: default_icon_url_template(),
            location_id: default_location_id(),
            cache_dir: None,
            font_file: default_font_file(),
            text_color: default_text_color(),
            background_color: default_background_color(),
            background_animation: None,
            output_dir: None,
            publisher: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file. `AVATARD_CONFIG` overrides the platform default.
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = env::var("AVATARD_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Effective icon cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }

        let dirs = Self::project_dirs()?;
        Ok(dirs.cache_dir().join("icons"))
    }

    /// Fail early when the weather provider credential is missing.
    pub fn ensure_api_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow!(
                "No OpenWeatherMap API key configured.\n\
                 Hint: run `avatard configure` and enter your API key."
            ));
        }
        Ok(())
    }

    /// Publisher credentials, required for the `run` subcommand.
    pub fn publisher(&self) -> Result<&PublisherConfig> {
        self.publisher.as_ref().ok_or_else(|| {
            anyhow!(
                "No publisher endpoint configured.\n\
                 Hint: run `avatard configure` and enter the profile service URL and token."
            )
        })
    }

    /// Rendering knobs for the avatar renderer.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            text_color: self.text_color,
            background_color: self.background_color,
            font_file: self.font_file.clone(),
            background_animation: self.background_animation.clone(),
            output_dir: self.output_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-avatar", "avatard")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}
