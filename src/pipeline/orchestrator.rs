// src/pipeline/orchestrator.rs
//
// One synchronous cycle per frame:
//   read -> lane check (sampled) -> motion check -> cooldown gate
//        -> banner/overlay/counters -> display -> key handling
//
// All detector and cooldown state lives here and is touched only by the
// thread running the loop. Sound is handed off to the notifier queue.

use crate::alert_manager::AlertManager;
use crate::display::{FrameSink, UserCommand};
use crate::error::PipelineError;
use crate::frame_source::{FrameSource, SourceDescriptor};
use crate::lane_detection::LaneDetector;
use crate::motion_detection::MotionDetector;
use crate::notifier::AlertNotifier;
use crate::overlay::{OverlayRenderer, OverlayStats};
use crate::pipeline::metrics::{MetricsSummary, PipelineMetrics};
use crate::snapshot;
use crate::types::{AlertEvent, AlertKind, Config, Frame};
use anyhow::{Context, Result};
use opencv::{core::Mat, prelude::*};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    UserQuit,
    Interrupted,
    EndOfStream,
    ReadFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stop_reason: StopReason,
    pub total_alerts: usize,
    pub metrics: MetricsSummary,
}

/// Result of a single cycle: the annotated frame and whatever was emitted.
pub struct CycleOutput {
    pub canvas: Mat,
    pub emitted: Vec<AlertEvent>,
}

pub struct AlertPipeline {
    config: Config,
    lane: LaneDetector,
    motion: MotionDetector,
    alerts: AlertManager,
    renderer: OverlayRenderer,
    notifier: AlertNotifier,
    metrics: PipelineMetrics,
    frame_count: u64,
}

impl AlertPipeline {
    pub fn new(config: Config, notifier: AlertNotifier) -> Self {
        Self {
            lane: LaneDetector::new(config.lane.clone()),
            motion: MotionDetector::new(config.motion.clone()),
            alerts: AlertManager::new(&config.alerts),
            renderer: OverlayRenderer::new(config.overlay.clone()),
            notifier,
            metrics: PipelineMetrics::new(),
            frame_count: 0,
            config,
        }
    }

    pub fn history(&self) -> &[AlertEvent] {
        self.alerts.history()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Run detectors on `frame`, gate the results, and render the overlay.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<CycleOutput> {
        self.frame_count += 1;
        self.metrics.inc(&self.metrics.total_frames);

        let mut emitted = Vec::new();
        let mut lane_segments = None;

        if self.frame_count % self.config.lane.sample_interval == 0 {
            self.metrics.inc(&self.metrics.lane_checks);
            let started = Instant::now();
            let check = self.lane.check(frame);
            self.metrics.set_timing(&self.metrics.lane_time_us, started);

            if let Some(kind) = check.departure {
                self.gate(kind, frame, &mut emitted);
            }
            lane_segments = Some(check.segments);
        }

        if self.config.motion.enabled {
            self.metrics.inc(&self.metrics.motion_checks);
            let started = Instant::now();
            let detection = self.motion.detect(frame);
            self.metrics.set_timing(&self.metrics.motion_time_us, started);

            if let Some(kind) = detection {
                self.gate(kind, frame, &mut emitted);
            }
        }

        let started = Instant::now();
        let segments = match lane_segments {
            _ if !self.renderer.draws_lanes() => Vec::new(),
            Some(segments) => segments,
            None => self.lane.extract_segments(frame).unwrap_or_else(|e| {
                debug!("No lane overlay for frame {}: {}", frame.index, e);
                Vec::new()
            }),
        };

        let mut canvas = frame
            .image
            .try_clone()
            .context("Failed to copy frame for rendering")?;
        self.renderer.render(
            &mut canvas,
            &segments,
            &emitted,
            OverlayStats {
                frame_count: self.frame_count,
                alert_count: self.alerts.alert_count(),
            },
        );
        self.metrics.set_timing(&self.metrics.render_time_us, started);

        Ok(CycleOutput { canvas, emitted })
    }

    fn gate(&mut self, kind: AlertKind, frame: &Frame, emitted: &mut Vec<AlertEvent>) {
        match self.alerts.offer(kind, frame.index, frame.timestamp_ms) {
            Some(event) => {
                warn!(
                    "🚨 {} detected (frame {}, t={:.0} ms)",
                    kind, event.frame_index, event.timestamp_ms
                );
                self.metrics.inc(&self.metrics.alerts_emitted);
                self.notifier.notify(kind);
                emitted.push(event);
            }
            None => self.metrics.inc(&self.metrics.alerts_suppressed),
        }
    }

    /// Drive the loop until quit, interrupt, end of stream, or a read failure.
    ///
    /// Only an acquisition failure is returned as an error. The source is
    /// released on every other exit.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        descriptor: &SourceDescriptor,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<RunSummary, PipelineError> {
        source.open(descriptor)?;
        self.motion.reset();
        info!("🚗 Monitoring started (q = quit, s = screenshot)");

        let stop_reason = self.run_loop(source, sink, shutdown);

        source.release();
        sink.close();

        if let Some(path) = self.config.alerts.history_path.clone() {
            if let Err(e) = self.write_history(Path::new(&path)) {
                warn!("Alert history not written: {:#}", e);
            }
        }

        let summary = RunSummary {
            stop_reason,
            total_alerts: self.alerts.alert_count(),
            metrics: self.metrics.summary(),
        };
        info!(
            "📊 Stopped ({:?}): {} frames, {} alerts, {} suppressed, {:.1} FPS",
            summary.stop_reason,
            summary.metrics.total_frames,
            summary.total_alerts,
            summary.metrics.alerts_suppressed,
            summary.metrics.fps
        );
        Ok(summary)
    }

    fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        shutdown: &watch::Receiver<bool>,
    ) -> StopReason {
        loop {
            if *shutdown.borrow() {
                info!("⏹️ Stop requested");
                return StopReason::Interrupted;
            }

            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("End of stream");
                    return StopReason::EndOfStream;
                }
                Err(e) => {
                    error!("❌ {}", e);
                    return StopReason::ReadFailure;
                }
            };

            let output = match self.process_frame(&frame) {
                Ok(output) => output,
                Err(e) => {
                    warn!("Frame {} skipped: {:#}", frame.index, e);
                    continue;
                }
            };

            match sink.show(&output.canvas) {
                Ok(UserCommand::Continue) => {}
                Ok(UserCommand::Quit) => return StopReason::UserQuit,
                Ok(UserCommand::Screenshot) => self.screenshot(&output.canvas),
                Err(e) => debug!("Display failed for frame {}: {}", frame.index, e),
            }
        }
    }

    fn screenshot(&self, canvas: &Mat) {
        let dir = Path::new(&self.config.screenshot.directory);
        match snapshot::save_screenshot(canvas, dir, &self.config.screenshot.extension) {
            Ok(_) => self.metrics.inc(&self.metrics.screenshots),
            Err(e) => warn!("Screenshot failed: {:#}", e),
        }
    }

    pub fn write_history(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self.alerts.history())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(
            "Alert history ({} events) written to {}",
            self.alerts.alert_count(),
            path.display()
        );
        Ok(())
    }
}
