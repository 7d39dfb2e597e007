// src/motion_detection.rs
//
// Frame differencing against the immediately preceding frame. One
// detector instance per stream; it owns the only copy of the baseline.

use crate::types::{AlertKind, Frame, MotionConfig};
use crate::vision;
use anyhow::Result;
use opencv::{core::Mat, prelude::*};
use tracing::{debug, warn};

pub struct MotionDetector {
    config: MotionConfig,
    previous: Option<Mat>,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            previous: None,
        }
    }

    /// Compare against the previous frame, then make this frame the new baseline.
    pub fn detect(&mut self, frame: &Frame) -> Option<AlertKind> {
        match self.try_detect(frame) {
            Ok(result) => result,
            Err(e) => {
                warn!("Motion detection failed on frame {}: {}", frame.index, e);
                None
            }
        }
    }

    fn try_detect(&mut self, frame: &Frame) -> Result<Option<AlertKind>> {
        let current = vision::to_gray(&frame.image)?;

        let outcome = match &self.previous {
            Some(previous) => self.compare(previous, &current, frame.index),
            None => {
                debug!("Motion baseline captured at frame {}", frame.index);
                Ok(None)
            }
        };

        self.previous = Some(current);
        outcome
    }

    fn compare(&self, previous: &Mat, current: &Mat, index: u64) -> Result<Option<AlertKind>> {
        if previous.size()? != current.size()? {
            debug!("Frame size changed at frame {}, baseline reset", index);
            return Ok(None);
        }

        let mask = vision::difference_mask(previous, current, self.config.diff_threshold)?;
        let largest = vision::external_contour_areas(&mask)?
            .into_iter()
            .fold(0.0f64, f64::max);

        if largest > self.config.min_contour_area {
            debug!("Motion at frame {}: largest region {:.0} px", index, largest);
            return Ok(Some(AlertKind::MotionDetected));
        }
        Ok(None)
    }

    /// Forget the baseline; the next frame only re-establishes it.
    pub fn reset(&mut self) {
        if self.previous.take().is_some() {
            debug!("Motion baseline dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::test_frames;

    fn detector() -> MotionDetector {
        MotionDetector::new(MotionConfig::default())
    }

    #[test]
    fn test_first_frame_only_sets_baseline() {
        let mut d = detector();
        let first = test_frames::frame(test_frames::with_square(100.0, 200, 150, 50), 1, 0.0);
        assert_eq!(d.detect(&first), None);

        let cleared = test_frames::frame(test_frames::blank(100.0), 2, 33.0);
        assert_eq!(d.detect(&cleared), Some(AlertKind::MotionDetected));
    }

    #[test]
    fn test_identical_frames_have_no_motion() {
        let mut d = detector();
        for i in 1..=5 {
            let frame = test_frames::frame(test_frames::blank(100.0), i, i as f64 * 33.0);
            assert_eq!(d.detect(&frame), None);
        }
    }

    #[test]
    fn test_large_region_is_motion() {
        let mut d = detector();
        d.detect(&test_frames::frame(test_frames::blank(100.0), 1, 0.0));
        let moved = test_frames::frame(test_frames::with_square(100.0, 200, 150, 50), 2, 33.0);
        assert_eq!(d.detect(&moved), Some(AlertKind::MotionDetected));
    }

    #[test]
    fn test_small_region_is_ignored() {
        let mut d = detector();
        d.detect(&test_frames::frame(test_frames::blank(100.0), 1, 0.0));
        let moved = test_frames::frame(test_frames::with_square(100.0, 200, 150, 20), 2, 33.0);
        assert_eq!(d.detect(&moved), None);
    }

    #[test]
    fn test_baseline_slides_every_frame() {
        let mut d = detector();
        d.detect(&test_frames::frame(test_frames::blank(100.0), 1, 0.0));

        let square = || test_frames::with_square(100.0, 200, 150, 50);
        assert_eq!(
            d.detect(&test_frames::frame(square(), 2, 33.0)),
            Some(AlertKind::MotionDetected)
        );
        // Compared with frame 2, not frame 1.
        assert_eq!(d.detect(&test_frames::frame(square(), 3, 66.0)), None);
    }

    #[test]
    fn test_resolution_change_resets_baseline() {
        let mut d = detector();
        d.detect(&test_frames::frame(test_frames::blank(100.0), 1, 0.0));

        let small = Mat::new_rows_cols_with_default(
            240,
            320,
            opencv::core::CV_8UC3,
            opencv::core::Scalar::all(255.0),
        )
        .unwrap();
        assert_eq!(d.detect(&Frame::new(small.try_clone().unwrap(), 2, 33.0)), None);

        // The small frame is the new baseline.
        let mut moved = small;
        opencv::imgproc::rectangle(
            &mut moved,
            opencv::core::Rect::new(100, 80, 50, 50),
            opencv::core::Scalar::all(0.0),
            -1,
            opencv::imgproc::LINE_8,
            0,
        )
        .unwrap();
        assert_eq!(d.detect(&Frame::new(moved, 3, 66.0)), Some(AlertKind::MotionDetected));
    }

    #[test]
    fn test_reset_drops_baseline() {
        let mut d = detector();
        d.detect(&test_frames::frame(test_frames::blank(100.0), 1, 0.0));
        d.reset();
        let moved = test_frames::frame(test_frames::with_square(100.0, 200, 150, 50), 2, 33.0);
        assert_eq!(d.detect(&moved), None);
    }
}
