use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

impl std::fmt::Display for EngineSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Sub-block Size: {}", self.sub_block_size)?;
        writeln!(f, "Smoothing Ramp: {} ms", self.smoothing_ramp_ms)?;
        writeln!(f, "Order FIFO Capacity: {}", self.order_fifo_capacity)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Samples between parameter updates
    pub sub_block_size: usize,
    /// Ramp length of every parameter smoother
    pub smoothing_ramp_ms: f32,
    /// Pending reorders the render thread can fall behind by
    pub order_fifo_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sub_block_size: 64,
            smoothing_ramp_ms: 5.0,
            order_fifo_capacity: 32,
        }
    }
}

impl EngineSettings {
    pub fn ramp_seconds(&self) -> f32 {
        self.smoothing_ramp_ms.max(0.0) * 0.001
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub sample_rate: Option<u32>,
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "------------------------------")?;
        writeln!(f, "Engine Settings:")?;
        writeln!(f, "{}", self.engine)?;
        writeln!(
            f,
            "Sample Rate Override: {}",
            self.sample_rate
                .map_or_else(|| "None".to_string(), |sr| sr.to_string())
        )?;
        Ok(())
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path();

        if settings_path.exists() {
            Self::load_from(&settings_path)
        } else {
            info!("No settings file found, using defaults");
            let settings = Self::default();
            // Try to save defaults, but don't fail if we can't
            let _ = settings.save();
            Ok(settings)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("Failed to read settings file")?;
        let settings: Self = serde_json::from_str(&contents).context("Failed to parse settings")?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure the config directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, json).context("Failed to write settings file")?;

        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    fn get_settings_path() -> PathBuf {
        const SETTINGS_FILENAME: &str = "settings.json";

        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_dir)
                .join("voxchain")
                .join(SETTINGS_FILENAME)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("voxchain")
                .join(SETTINGS_FILENAME)
        } else {
            // Fallback to current directory
            PathBuf::from(".").join(SETTINGS_FILENAME)
        }
    }
}
