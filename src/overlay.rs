// src/overlay.rs
//
// Per-frame annotations: alert banner, translucent lane segments, and
// the running counters. Drawing errors are logged and otherwise ignored.

use crate::types::{AlertEvent, AlertKind, LineSegment, OverlayConfig};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Scalar},
    imgproc,
    prelude::*,
};
use tracing::debug;

/// Colors used for rendering (BGR format for OpenCV).
pub mod colors {
    use opencv::core::Scalar;

    pub const LANE_SEGMENT: Scalar = Scalar::new(0.0, 255.0, 0.0, 0.0);
    pub const BANNER_LANE: Scalar = Scalar::new(0.0, 0.0, 255.0, 0.0);
    pub const BANNER_MOTION: Scalar = Scalar::new(0.0, 255.0, 255.0, 0.0);
    pub const TEXT: Scalar = Scalar::new(255.0, 255.0, 255.0, 0.0);
}

/// Counters shown in the bottom-left corner.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayStats {
    pub frame_count: u64,
    pub alert_count: usize,
}

pub struct OverlayRenderer {
    config: OverlayConfig,
}

impl OverlayRenderer {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    pub fn draws_lanes(&self) -> bool {
        self.config.draw_lanes
    }

    /// Annotate `canvas` in place. Never fails.
    pub fn render(
        &self,
        canvas: &mut Mat,
        segments: &[LineSegment],
        emitted: &[AlertEvent],
        stats: OverlayStats,
    ) {
        if let Err(e) = self.try_render(canvas, segments, emitted, stats) {
            debug!("Overlay rendering skipped: {}", e);
        }
    }

    fn try_render(
        &self,
        canvas: &mut Mat,
        segments: &[LineSegment],
        emitted: &[AlertEvent],
        stats: OverlayStats,
    ) -> Result<()> {
        for event in emitted {
            draw_alert_banner(canvas, event.kind)?;
        }
        if self.config.draw_lanes && !segments.is_empty() {
            blend_lane_segments(canvas, segments, self.config.lane_alpha)?;
        }
        draw_counters(canvas, stats)?;
        Ok(())
    }
}

pub fn banner_color(kind: AlertKind) -> Scalar {
    if kind.is_lane_departure() {
        colors::BANNER_LANE
    } else {
        colors::BANNER_MOTION
    }
}

fn blend_lane_segments(canvas: &mut Mat, segments: &[LineSegment], alpha: f64) -> Result<()> {
    let mut overlay = canvas.try_clone()?;
    for seg in segments {
        imgproc::line(
            &mut overlay,
            Point::new(seg.x1, seg.y1),
            Point::new(seg.x2, seg.y2),
            colors::LANE_SEGMENT,
            2,
            imgproc::LINE_8,
            0,
        )?;
    }

    let mut blended = Mat::default();
    core::add_weighted(&overlay, alpha, &*canvas, 1.0 - alpha, 0.0, &mut blended, -1)?;
    *canvas = blended;
    Ok(())
}

fn draw_alert_banner(canvas: &mut Mat, kind: AlertKind) -> Result<()> {
    let width = canvas.cols();
    let height = canvas.rows();

    imgproc::rectangle_points(
        canvas,
        Point::new(10, 10),
        Point::new(width - 10, 80),
        banner_color(kind),
        -1,
        imgproc::LINE_8,
        0,
    )?;

    imgproc::put_text(
        canvas,
        kind.message(),
        Point::new(20, 50),
        imgproc::FONT_HERSHEY_SIMPLEX,
        1.0,
        colors::TEXT,
        2,
        imgproc::LINE_8,
        false,
    )?;

    let clock = chrono::Local::now().format("%H:%M:%S").to_string();
    imgproc::put_text(
        canvas,
        &clock,
        Point::new(20, height - 20),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        colors::TEXT,
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn draw_counters(canvas: &mut Mat, stats: OverlayStats) -> Result<()> {
    let height = canvas.rows();
    let lines = [
        (format!("Frame: {}", stats.frame_count), height - 50),
        (format!("Alerts: {}", stats.alert_count), height - 30),
    ];

    for (text, y) in lines {
        imgproc::put_text(
            canvas,
            &text,
            Point::new(10, y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            colors::TEXT,
            1,
            imgproc::LINE_8,
            false,
        )?;
    }
    Ok(())
}
