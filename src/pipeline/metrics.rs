// src/pipeline/metrics.rs
//
// Loop counters and timings, summarised in logs at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct PipelineMetrics {
    pub total_frames: AtomicU64,
    pub lane_checks: AtomicU64,
    pub motion_checks: AtomicU64,
    pub alerts_emitted: AtomicU64,
    pub alerts_suppressed: AtomicU64,
    pub screenshots: AtomicU64,
    pub lane_time_us: AtomicU64,
    pub motion_time_us: AtomicU64,
    pub render_time_us: AtomicU64,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: AtomicU64::new(0),
            lane_checks: AtomicU64::new(0),
            motion_checks: AtomicU64::new(0),
            alerts_emitted: AtomicU64::new(0),
            alerts_suppressed: AtomicU64::new(0),
            screenshots: AtomicU64::new(0),
            lane_time_us: AtomicU64::new(0),
            motion_time_us: AtomicU64::new(0),
            render_time_us: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, started: Instant) {
        counter.store(started.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            lane_checks: self.lane_checks.load(Ordering::Relaxed),
            motion_checks: self.motion_checks.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            screenshots: self.screenshots.load(Ordering::Relaxed),
            last_lane_us: self.lane_time_us.load(Ordering::Relaxed),
            last_motion_us: self.motion_time_us.load(Ordering::Relaxed),
            last_render_us: self.render_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub lane_checks: u64,
    pub motion_checks: u64,
    pub alerts_emitted: u64,
    pub alerts_suppressed: u64,
    pub screenshots: u64,
    pub last_lane_us: u64,
    pub last_motion_us: u64,
    pub last_render_us: u64,
    pub elapsed_secs: f64,
}
