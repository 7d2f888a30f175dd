//! Core utilities shared by every crate in the renderer.
//!
//! This crate provides foundational types:
//! - Error types and result aliases
//! - Logging initialization
//! - Wall-clock timer for animation
//! - Configuration file model

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    Config, GeometryKind, LoggingConfig, PresentModePreference, RendererConfig, SceneConfig,
    WindowConfig,
};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::Timer;
