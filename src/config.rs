use crate::error::PipelineError;
use crate::types::{BackendKind, Config};
use anyhow::{Context, Result};
use std::fs;

/// Launcher-level switches that take precedence over the YAML file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<String>,
    pub no_lanes: bool,
    pub no_motion: bool,
    pub headless: bool,
    pub silent: bool,
}

impl Config {
    /// Parse only. Call `validate` once overrides have been applied.
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(source) = &overrides.source {
            self.source.descriptor = source.clone();
        }
        if overrides.no_lanes {
            self.overlay.draw_lanes = false;
        }
        if overrides.no_motion {
            self.motion.enabled = false;
        }
        if overrides.headless {
            self.display.enabled = false;
        }
        if overrides.silent {
            self.notifier.backend = BackendKind::Silent;
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.lane.sample_interval == 0 {
            return Err(PipelineError::Config(
                "lane.sample_interval must be at least 1".to_string(),
            ));
        }
        if self.lane.blur_kernel <= 0 || self.lane.blur_kernel % 2 == 0 {
            return Err(PipelineError::Config(format!(
                "lane.blur_kernel must be a positive odd number, got {}",
                self.lane.blur_kernel
            )));
        }
        if !(0.0..=1.0).contains(&self.overlay.lane_alpha) {
            return Err(PipelineError::Config(format!(
                "overlay.lane_alpha must be within [0, 1], got {}",
                self.overlay.lane_alpha
            )));
        }
        if self.alerts.lane_cooldown_ms < 0.0 || self.alerts.motion_cooldown_ms < 0.0 {
            return Err(PipelineError::Config(
                "alert cooldowns cannot be negative".to_string(),
            ));
        }
        if self.source.descriptor.trim().is_empty() {
            return Err(PipelineError::Config(
                "source.descriptor is empty".to_string(),
            ));
        }
        Ok(())
    }
}
