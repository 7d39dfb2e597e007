// src/types.rs

use opencv::{core::Mat, prelude::*};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub lane: LaneConfig,
    pub motion: MotionConfig,
    pub alerts: AlertConfig,
    pub overlay: OverlayConfig,
    pub display: DisplayConfig,
    pub screenshot: ScreenshotConfig,
    pub notifier: NotifierConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Device index ("0") or stream address ("http://192.168.1.100:8080/video")
    pub descriptor: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            descriptor: "0".to_string(),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    pub hough_threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    /// Segments with |slope| at or below this are treated as horizontal noise
    pub slope_threshold: f32,
    /// Distance from frame center (px) under which a lane average counts as a departure
    pub departure_margin_px: f32,
    /// Lane detection runs on one frame out of this many
    pub sample_interval: u64,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 50,
            min_line_length: 50.0,
            max_line_gap: 10.0,
            slope_threshold: 0.3,
            departure_margin_px: 50.0,
            sample_interval: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub enabled: bool,
    pub diff_threshold: f64,
    pub min_contour_area: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            diff_threshold: 30.0,
            min_contour_area: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub lane_cooldown_ms: f64,
    pub motion_cooldown_ms: f64,
    /// Alert history is written here as JSON on shutdown when set
    pub history_path: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            lane_cooldown_ms: 2000.0,
            motion_cooldown_ms: 1000.0,
            history_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub draw_lanes: bool,
    pub lane_alpha: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            draw_lanes: true,
            lane_alpha: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub enabled: bool,
    pub window_name: String,
    pub display_width: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_name: "Road Alert".to_string(),
            display_width: 960,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub directory: String,
    pub extension: String,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            extension: "jpg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Speaker when available, console marker otherwise
    #[default]
    Auto,
    Speaker,
    Console,
    Silent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub backend: BackendKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// FRAMES & DETECTIONS
// ============================================================================

/// A captured BGR frame. Detectors only ever borrow it.
#[derive(Debug)]
pub struct Frame {
    pub image: Mat,
    /// 1-based capture sequence number
    pub index: u64,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(image: Mat, index: u64, timestamp_ms: f64) -> Self {
        Self {
            image,
            index,
            timestamp_ms,
        }
    }

    pub fn width(&self) -> i32 {
        self.image.cols()
    }

    pub fn height(&self) -> i32 {
        self.image.rows()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl LineSegment {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Image-space slope (y grows downward). Vertical segments report 0.
    pub fn slope(&self) -> f32 {
        let dx = self.x2 - self.x1;
        if dx == 0 {
            return 0.0;
        }
        (self.y2 - self.y1) as f32 / dx as f32
    }

    pub fn mid_x(&self) -> f32 {
        (self.x1 + self.x2) as f32 / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    LeftLaneDeparture,
    RightLaneDeparture,
    MotionDetected,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LeftLaneDeparture => "LEFT_LANE_DEPARTURE",
            AlertKind::RightLaneDeparture => "RIGHT_LANE_DEPARTURE",
            AlertKind::MotionDetected => "MOTION_DETECTED",
        }
    }

    pub fn is_lane_departure(&self) -> bool {
        matches!(
            self,
            AlertKind::LeftLaneDeparture | AlertKind::RightLaneDeparture
        )
    }

    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::LeftLaneDeparture => "WARNING: LEFT LANE DEPARTURE",
            AlertKind::RightLaneDeparture => "WARNING: RIGHT LANE DEPARTURE",
            AlertKind::MotionDetected => "WARNING: MOTION DETECTED",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub timestamp_ms: f64,
    pub frame_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slope_of_vertical_segment_is_zero() {
        let seg = LineSegment::new(100, 0, 100, 200);
        assert_eq!(seg.slope(), 0.0);
    }

    #[test]
    fn test_slope_sign_follows_image_coordinates() {
        // Rising to the right on screen means y decreases.
        let left = LineSegment::new(300, 460, 340, 260);
        assert!((left.slope() + 5.0).abs() < 1e-6);

        let right = LineSegment::new(560, 260, 600, 460);
        assert!((right.slope() - 5.0).abs() < 1e-6);
        assert_eq!(right.mid_x(), 580.0);
    }

    #[test]
    fn test_alert_kind_serializes_screaming_case() {
        let json = serde_json::to_string(&AlertKind::LeftLaneDeparture).unwrap();
        assert_eq!(json, "\"LEFT_LANE_DEPARTURE\"");
        assert_eq!(AlertKind::MotionDetected.to_string(), "MOTION_DETECTED");
        assert!(AlertKind::RightLaneDeparture.is_lane_departure());
        assert!(!AlertKind::MotionDetected.is_lane_departure());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("motion:\n  enabled: false\n").unwrap();
        assert!(!config.motion.enabled);
        assert_eq!(config.motion.min_contour_area, 1000.0);
        assert_eq!(config.lane.sample_interval, 10);
        assert_eq!(config.notifier.backend, BackendKind::Auto);
    }
}
