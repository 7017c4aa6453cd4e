use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_FILE_NAME: &str = "picalog.conf";

/// Persistent settings. Every field is optional in the file so a config
/// written by an older build keeps loading; `None` falls back to the
/// default at the point of use.
#[derive(Serialize, Deserialize, Clone)]
pub struct GuiConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub panel_width: Option<f32>,
    pub font_scale: Option<f32>,
    pub row_height: Option<f32>,
    pub buffer_rows: Option<usize>,
    pub thumb_width: Option<u32>,
    pub thumb_height: Option<u32>,
    pub thumb_cache_size: Option<usize>,
    pub thumb_delay_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub show_thumbnails: Option<bool>,
    pub last_directory: Option<PathBuf>,
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            width: Some(1280),
            height: Some(720),
            panel_width: Some(450.0),
            font_scale: Some(1.0),
            row_height: Some(48.0),
            buffer_rows: Some(5),
            thumb_width: Some(64),
            thumb_height: Some(64),
            thumb_cache_size: Some(500),
            thumb_delay_ms: Some(200),
            settle_delay_ms: Some(100),
            show_thumbnails: Some(true),
            last_directory: None,
        }
    }
}

impl GuiConfig {
    pub fn row_height(&self) -> f32 {
        self.row_height.unwrap_or(48.0).max(8.0)
    }

    pub fn buffer_rows(&self) -> usize {
        self.buffer_rows.unwrap_or(5)
    }

    pub fn thumb_size(&self) -> (u32, u32) {
        (
            self.thumb_width.unwrap_or(64).max(1),
            self.thumb_height.unwrap_or(64).max(1),
        )
    }

    pub fn thumb_cache_size(&self) -> usize {
        self.thumb_cache_size.unwrap_or(500).max(1)
    }

    pub fn thumb_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.thumb_delay_ms.unwrap_or(200))
    }

    /// 0 disables scroll settling entirely.
    pub fn settle_delay(&self) -> Option<std::time::Duration> {
        match self.settle_delay_ms.unwrap_or(100) {
            0 => None,
            ms => Some(std::time::Duration::from_millis(ms)),
        }
    }

    pub fn show_thumbnails(&self) -> bool {
        self.show_thumbnails.unwrap_or(true)
    }
}

fn config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("no config dir found")?;
    fs::create_dir_all(&dir)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

pub fn load_config() -> Result<GuiConfig> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = GuiConfig::default();
        let toml_str = toml::to_string_pretty(&cfg)?;
        fs::write(&path, toml_str)?;
        eprintln!("picalog: created default config at {:?}", path);
        return Ok(cfg);
    }
    let content = fs::read_to_string(&path)?;
    let cfg: GuiConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config at {:?}", path))?;
    Ok(cfg)
}

pub fn save_config(cfg: &GuiConfig) -> Result<()> {
    let path = config_path()?;
    let toml_str = toml::to_string_pretty(cfg)?;
    fs::write(&path, toml_str)?;
    Ok(())
}
