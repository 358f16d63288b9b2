//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MixcastError, MixcastResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Compositor and mixer settings.
    pub compositor: CompositorConfig,

    /// Pipeline lifecycle settings.
    pub pipeline: PipelineConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Video compositor and audio mixer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Output canvas width in pixels.
    pub canvas_width: u32,

    /// Output canvas height in pixels.
    pub canvas_height: u32,

    /// Name of the video compositor element inputs are linked to.
    pub compositor_name: String,

    /// Name of the audio mixer element inputs are linked to.
    pub mixer_name: String,

    /// Largest number of video inputs the layout engine accepts.
    pub max_inputs: usize,

    /// What to do when the compositor or mixer cannot be found or linked.
    pub missing_mixer_policy: MissingMixerPolicy,
}

/// Pipeline lifecycle settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Reaction to engine errors and failed end-of-stream restarts.
    pub failure_policy: FailurePolicy,
}

/// Reaction to an unrecoverable engine fault reported on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the fault and terminate the process with exit code 1.
    #[default]
    ExitProcess,
    /// Stop only the faulty pipeline and report the fault to its owner.
    StopPipeline,
}

/// Reaction to a missing or unlinkable compositor/mixer during attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMixerPolicy {
    /// Log a warning and keep the input attached but unlinked.
    #[default]
    BestEffort,
    /// Detach the input again and return an error.
    Fail,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mixcast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1920,
            canvas_height: 1080,
            compositor_name: "vmix".to_string(),
            mixer_name: "amix".to_string(),
            max_inputs: 64,
            missing_mixer_policy: MissingMixerPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Standard config file location.
    pub fn path() -> PathBuf {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".config")
            });
        base.join("mixcast").join("config.json")
    }

    /// Reject settings no pipeline could run with.
    pub fn validate(&self) -> MixcastResult<()> {
        let compositor = &self.compositor;
        if compositor.canvas_width == 0 || compositor.canvas_height == 0 {
            return Err(MixcastError::Config {
                message: format!(
                    "canvas must not be empty (got {}x{})",
                    compositor.canvas_width, compositor.canvas_height
                ),
            });
        }
        if compositor.max_inputs == 0 {
            return Err(MixcastError::Config {
                message: "max_inputs must be at least 1".to_string(),
            });
        }
        if compositor.compositor_name.is_empty() || compositor.mixer_name.is_empty() {
            return Err(MixcastError::Config {
                message: "compositor and mixer names must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Save config to the standard location and return the path written.
    pub fn save(&self) -> MixcastResult<PathBuf> {
        let path = Self::path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write config to `path` as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> MixcastResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_conventional_element_names() {
        let config = AppConfig::default();
        assert_eq!(config.compositor.canvas_width, 1920);
        assert_eq!(config.compositor.canvas_height, 1080);
        assert_eq!(config.compositor.compositor_name, "vmix");
        assert_eq!(config.compositor.mixer_name, "amix");
        assert_eq!(config.pipeline.failure_policy, FailurePolicy::ExitProcess);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let json = r#"{
            "compositor": { "canvas_width": 1280, "missing_mixer_policy": "fail" },
            "pipeline": { "failure_policy": "stop_pipeline" }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.compositor.canvas_width, 1280);
        assert_eq!(config.compositor.canvas_height, 1080);
        assert_eq!(
            config.compositor.missing_mixer_policy,
            MissingMixerPolicy::Fail
        );
        assert_eq!(config.pipeline.failure_policy, FailurePolicy::StopPipeline);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_canvas_is_rejected() {
        let mut config = AppConfig::default();
        config.compositor.canvas_height = 0;
        assert!(matches!(
            config.validate(),
            Err(MixcastError::Config { .. })
        ));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = std::env::temp_dir().join(format!("mixcast-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.compositor.max_inputs = 16;
        config.pipeline.failure_policy = FailurePolicy::StopPipeline;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.compositor.max_inputs, 16);
        assert_eq!(loaded.pipeline.failure_policy, FailurePolicy::StopPipeline);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unparseable_config_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("mixcast-bad-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.compositor.max_inputs, 64);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
