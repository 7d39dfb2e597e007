// src/lane_detection.rs
//
// Classical lane departure check: Canny edges, probabilistic Hough
// segments, slope-based left/right split, then compare the average
// marking position on each side against the frame center.

use crate::types::{AlertKind, Frame, LaneConfig, LineSegment};
use crate::vision::{self, HoughParams};
use anyhow::Result;
use tracing::{debug, warn};

/// Segments split by slope sign, with the mean midpoint of each side.
#[derive(Debug, Clone, Default)]
pub struct LaneEstimate {
    pub left: Vec<LineSegment>,
    pub right: Vec<LineSegment>,
    pub left_average: Option<f32>,
    pub right_average: Option<f32>,
}

impl LaneEstimate {
    /// Both sides carry evidence. Departures are only judged on full estimates.
    pub fn is_complete(&self) -> bool {
        !self.left.is_empty() && !self.right.is_empty()
    }
}

/// One lane check: the raw segments it saw and the departure it decided.
#[derive(Debug, Clone, Default)]
pub struct LaneCheck {
    pub segments: Vec<LineSegment>,
    pub departure: Option<AlertKind>,
}

pub struct LaneDetector {
    config: LaneConfig,
}

impl LaneDetector {
    pub fn new(config: LaneConfig) -> Self {
        Self { config }
    }

    /// Best-effort departure check. Processing errors count as no detection.
    pub fn detect(&self, frame: &Frame) -> Option<AlertKind> {
        self.check(frame).departure
    }

    /// Like `detect`, but hands back the segments so the overlay can reuse them.
    pub fn check(&self, frame: &Frame) -> LaneCheck {
        match self.try_check(frame) {
            Ok(check) => check,
            Err(e) => {
                warn!("Lane detection failed on frame {}: {}", frame.index, e);
                LaneCheck::default()
            }
        }
    }

    fn try_check(&self, frame: &Frame) -> Result<LaneCheck> {
        let segments = self.extract_segments(frame)?;
        let estimate = self.estimate(&segments);

        debug!(
            "Frame {} ({}x{}): {} segments ({} left, {} right)",
            frame.index,
            frame.width(),
            frame.height(),
            segments.len(),
            estimate.left.len(),
            estimate.right.len()
        );

        let departure = self.classify(&estimate, frame.width());
        Ok(LaneCheck {
            segments,
            departure,
        })
    }

    /// Raw Hough segments, before any slope filtering.
    pub fn extract_segments(&self, frame: &Frame) -> Result<Vec<LineSegment>> {
        let gray = vision::to_gray(&frame.image)?;
        let blurred = vision::blur(&gray, self.config.blur_kernel)?;
        let edge_map = vision::edges(&blurred, self.config.canny_low, self.config.canny_high)?;

        vision::hough_segments(
            &edge_map,
            HoughParams {
                threshold: self.config.hough_threshold,
                min_line_length: self.config.min_line_length,
                max_line_gap: self.config.max_line_gap,
            },
        )
    }

    pub fn estimate(&self, segments: &[LineSegment]) -> LaneEstimate {
        let threshold = self.config.slope_threshold;

        let mut estimate = LaneEstimate::default();
        for seg in segments {
            let slope = seg.slope();
            if slope < -threshold {
                estimate.left.push(*seg);
            } else if slope > threshold {
                estimate.right.push(*seg);
            }
        }

        estimate.left_average = mean_mid_x(&estimate.left);
        estimate.right_average = mean_mid_x(&estimate.right);
        estimate
    }

    pub fn classify(&self, estimate: &LaneEstimate, frame_width: i32) -> Option<AlertKind> {
        if !estimate.is_complete() {
            return None;
        }
        let (left_avg, right_avg) = (estimate.left_average?, estimate.right_average?);

        let center_x = (frame_width / 2) as f32;
        let margin = self.config.departure_margin_px;

        if center_x - left_avg < margin {
            Some(AlertKind::LeftLaneDeparture)
        } else if right_avg - center_x < margin {
            Some(AlertKind::RightLaneDeparture)
        } else {
            None
        }
    }
}

fn mean_mid_x(segments: &[LineSegment]) -> Option<f32> {
    if segments.is_empty() {
        return None;
    }
    let sum: f32 = segments.iter().map(LineSegment::mid_x).sum();
    Some(sum / segments.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::test_frames;

    fn detector() -> LaneDetector {
        LaneDetector::new(LaneConfig::default())
    }

    #[test]
    fn test_estimate_discards_shallow_segments() {
        let segments = vec![
            LineSegment::new(0, 100, 200, 110),  // slope 0.05
            LineSegment::new(100, 0, 100, 300),  // vertical, slope 0
            LineSegment::new(300, 460, 340, 260), // left
            LineSegment::new(560, 260, 600, 460), // right
        ];
        let estimate = detector().estimate(&segments);
        assert_eq!(estimate.left.len(), 1);
        assert_eq!(estimate.right.len(), 1);
        assert_eq!(estimate.left_average, Some(320.0));
        assert_eq!(estimate.right_average, Some(580.0));
    }

    #[test]
    fn test_classify_left_departure() {
        let d = detector();
        let estimate = d.estimate(&[
            LineSegment::new(290, 460, 330, 260),
            LineSegment::new(300, 460, 340, 260),
            LineSegment::new(560, 260, 600, 460),
        ]);
        assert_eq!(d.classify(&estimate, 640), Some(AlertKind::LeftLaneDeparture));
    }

    #[test]
    fn test_classify_right_departure() {
        let d = detector();
        let estimate = d.estimate(&[
            LineSegment::new(40, 460, 80, 260),
            LineSegment::new(330, 260, 370, 460),
        ]);
        assert_eq!(d.classify(&estimate, 640), Some(AlertKind::RightLaneDeparture));
    }

    #[test]
    fn test_classify_left_wins_when_both_close() {
        let d = detector();
        let estimate = d.estimate(&[
            LineSegment::new(300, 460, 340, 260),
            LineSegment::new(320, 260, 360, 460),
        ]);
        assert_eq!(d.classify(&estimate, 640), Some(AlertKind::LeftLaneDeparture));
    }

    #[test]
    fn test_one_sided_evidence_never_alerts() {
        let d = detector();
        let estimate = d.estimate(&[
            LineSegment::new(300, 460, 340, 260),
            LineSegment::new(310, 460, 350, 260),
        ]);
        assert!(!estimate.is_complete());
        assert_eq!(estimate.right_average, None);
        assert_eq!(d.classify(&estimate, 640), None);
    }

    #[test]
    fn test_detect_left_biased_frame() {
        let frame = test_frames::frame(test_frames::left_biased(), 10, 0.0);
        assert_eq!(detector().detect(&frame), Some(AlertKind::LeftLaneDeparture));
    }

    #[test]
    fn test_detect_centered_frame() {
        let frame = test_frames::frame(test_frames::centered(), 10, 0.0);
        assert_eq!(detector().detect(&frame), None);
    }

    #[test]
    fn test_detect_blank_frame() {
        let frame = test_frames::frame(test_frames::blank(0.0), 1, 0.0);
        assert!(detector().extract_segments(&frame).unwrap().is_empty());
        assert_eq!(detector().detect(&frame), None);
    }

    #[test]
    fn test_detect_is_idempotent() {
        let d = detector();
        let frame = test_frames::frame(test_frames::left_biased(), 10, 0.0);
        let first = d.detect(&frame);
        let second = d.detect(&frame);
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn test_check_returns_the_segments_it_judged() {
        let d = detector();
        let frame = test_frames::frame(test_frames::left_biased(), 10, 0.0);
        let check = d.check(&frame);
        assert_eq!(check.departure, Some(AlertKind::LeftLaneDeparture));
        assert_eq!(check.segments.len(), d.extract_segments(&frame).unwrap().len());
        assert!(!check.segments.is_empty());
    }

    #[test]
    fn test_empty_image_is_swallowed() {
        let frame = Frame::new(opencv::core::Mat::default(), 1, 0.0);
        assert_eq!(detector().detect(&frame), None);
        assert!(detector().check(&frame).segments.is_empty());
    }
}
