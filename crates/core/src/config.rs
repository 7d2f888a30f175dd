//! Configuration file model.
//!
//! The renderer reads an optional TOML file (`inflight.toml` by default).
//! Every field has a default, so an empty or missing file yields a working
//! configuration. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::logging::DEFAULT_FILTER;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    pub scene: SceneConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "inflight".to_string(),
        }
    }
}

/// Present mode the negotiator tries first. FIFO is always the fallback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    #[default]
    Mailbox,
    Fifo,
}

/// GPU-facing settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frame slots (K).
    pub frames_in_flight: usize,
    /// Use the highest sample count the device supports for color and depth.
    pub msaa: bool,
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    /// Upper bound on a frame-slot fence wait. `None` waits forever.
    pub fence_timeout_ms: Option<u64>,
    pub clear_color: [f32; 4],
    pub present_mode: PresentModePreference,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 3,
            msaa: true,
            validation: cfg!(debug_assertions),
            fence_timeout_ms: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            present_mode: PresentModePreference::Mailbox,
        }
    }
}

impl RendererConfig {
    /// Fence timeout in nanoseconds, as Vulkan expects it.
    pub fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ms
            .map(|ms| ms.saturating_mul(1_000_000))
            .unwrap_or(u64::MAX)
    }
}

/// Which geometry the renderer uploads at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryKind {
    #[default]
    Quad,
    Model,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub geometry: GeometryKind,
    pub model_path: PathBuf,
    /// Texture image. A procedural checkerboard is used when absent.
    pub texture_path: Option<PathBuf>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryKind::Quad,
            model_path: PathBuf::from("assets/models/model.obj"),
            texture_path: None,
            vertex_shader: PathBuf::from("shaders/spirv/mesh.vert.spv"),
            fragment_shader: PathBuf::from("shaders/spirv/mesh.frag.spv"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from `path`.
    ///
    /// A missing file is not an error and yields [`Config::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, is not valid
    /// TOML, or holds values that fail [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        debug!("{:?}", config);
        Ok(config)
    }

    /// Rejects values the renderer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.renderer.frames_in_flight == 0 {
            return Err(Error::Config(
                "renderer.frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.renderer.frames_in_flight, 3);
        assert!(config.renderer.msaa);
        assert_eq!(config.scene.geometry, GeometryKind::Quad);
        assert_eq!(config.renderer.present_mode, PresentModePreference::Mailbox);
        assert_eq!(config.renderer.fence_timeout_ns(), u64::MAX);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [renderer]
            frames_in_flight = 2
            fence_timeout_ms = 250

            [scene]
            geometry = "model"
            model_path = "assets/models/room.obj"
            "#,
        )
        .unwrap();

        assert_eq!(config.renderer.frames_in_flight, 2);
        assert_eq!(config.renderer.fence_timeout_ns(), 250_000_000);
        assert_eq!(config.scene.geometry, GeometryKind::Model);
        assert_eq!(config.scene.model_path, PathBuf::from("assets/models/room.obj"));
        assert_eq!(config.window.width, 800);
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        let result = Config::from_toml_str("[renderer]\nframes_in_flight = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_window_size_rejected() {
        let result = Config::from_toml_str("[window]\nwidth = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = Config::from_toml_str("[renderer\nmsaa = true");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("definitely/not/here/inflight.toml")).unwrap();
        assert_eq!(config.window.height, 600);
    }
}
