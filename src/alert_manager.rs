// src/alert_manager.rs
//
// Rate limiting for raw detections. A single last-emission clock gates
// every alert kind: a lane alert holds back motion alerts for the lane
// cooldown and the other way round.

use crate::types::{AlertConfig, AlertEvent, AlertKind};
use tracing::debug;

pub struct AlertManager {
    lane_cooldown_ms: f64,
    motion_cooldown_ms: f64,
    last_emission_ms: Option<f64>,
    history: Vec<AlertEvent>,
}

impl AlertManager {
    pub fn new(config: &AlertConfig) -> Self {
        Self {
            lane_cooldown_ms: config.lane_cooldown_ms,
            motion_cooldown_ms: config.motion_cooldown_ms,
            last_emission_ms: None,
            history: Vec::new(),
        }
    }

    fn cooldown_for(&self, kind: AlertKind) -> f64 {
        if kind.is_lane_departure() {
            self.lane_cooldown_ms
        } else {
            self.motion_cooldown_ms
        }
    }

    /// Emit `kind` unless the shared cooldown is still running.
    ///
    /// Dropped detections are not queued or retried.
    pub fn offer(&mut self, kind: AlertKind, frame_index: u64, timestamp_ms: f64) -> Option<AlertEvent> {
        if let Some(last) = self.last_emission_ms {
            let elapsed = timestamp_ms - last;
            if elapsed <= self.cooldown_for(kind) {
                debug!(
                    "{} at frame {} suppressed ({:.0} ms since last alert)",
                    kind, frame_index, elapsed
                );
                return None;
            }
        }

        let event = AlertEvent {
            kind,
            timestamp_ms,
            frame_index,
        };
        self.last_emission_ms = Some(timestamp_ms);
        self.history.push(event);
        Some(event)
    }

    pub fn history(&self) -> &[AlertEvent] {
        &self.history
    }

    pub fn alert_count(&self) -> usize {
        self.history.len()
    }
}
