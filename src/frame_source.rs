// src/frame_source.rs

use crate::error::PipelineError;
use crate::types::{Frame, SourceConfig};
use anyhow::Result;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst, VideoWriter},
};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where frames come from: a local camera index or a stream/file address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Device(i32),
    Stream(String),
}

impl SourceDescriptor {
    pub fn is_http(&self) -> bool {
        matches!(self, SourceDescriptor::Stream(url) if url.starts_with("http"))
    }

    /// Cameras and network streams never end on their own; files do.
    pub fn is_live(&self) -> bool {
        match self {
            SourceDescriptor::Device(_) => true,
            SourceDescriptor::Stream(url) => url.contains("://"),
        }
    }
}

/// Outcome of a read that produced no image. A live source going quiet is a
/// failure, a file running out is the end of the stream.
fn empty_read(live: bool) -> Result<Option<Frame>, PipelineError> {
    if live {
        Err(PipelineError::FrameRead(
            "cannot read from camera".to_string(),
        ))
    } else {
        Ok(None)
    }
}

impl FromStr for SourceDescriptor {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PipelineError::Config("empty source descriptor".to_string()));
        }
        if s.chars().all(|c| c.is_ascii_digit()) {
            return s
                .parse::<i32>()
                .map(SourceDescriptor::Device)
                .map_err(|e| PipelineError::Config(format!("bad device index {}: {}", s, e)));
        }
        Ok(SourceDescriptor::Stream(s.to_string()))
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Device(index) => write!(f, "camera #{}", index),
            SourceDescriptor::Stream(url) => f.write_str(url),
        }
    }
}

/// Supplies frames to the pipeline and owns the capture device.
pub trait FrameSource {
    fn open(&mut self, descriptor: &SourceDescriptor) -> Result<(), PipelineError>;

    /// `Ok(None)` marks end of stream. A live source that stops delivering
    /// frames reports `FrameRead` instead.
    fn read_frame(&mut self) -> Result<Option<Frame>, PipelineError>;

    /// Idempotent.
    fn release(&mut self);
}

/// OpenCV `VideoCapture` backed source.
pub struct CameraSource {
    config: SourceConfig,
    cap: Option<VideoCapture>,
    live: bool,
    frames_read: u64,
    opened_at: Instant,
}

impl CameraSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            cap: None,
            live: false,
            frames_read: 0,
            opened_at: Instant::now(),
        }
    }

    fn configure(&self, cap: &mut VideoCapture, descriptor: &SourceDescriptor) {
        let props = [
            (videoio::CAP_PROP_FRAME_WIDTH, self.config.width as f64),
            (videoio::CAP_PROP_FRAME_HEIGHT, self.config.height as f64),
            (videoio::CAP_PROP_FPS, self.config.fps as f64),
        ];
        for (prop, value) in props {
            if let Err(e) = VideoCaptureTrait::set(cap, prop, value) {
                debug!("Capture property {} not applied: {}", prop, e);
            }
        }

        // Network cameras lag badly with a deep buffer.
        if descriptor.is_http() {
            if let Err(e) = VideoCaptureTrait::set(cap, videoio::CAP_PROP_BUFFERSIZE, 1.0) {
                debug!("Buffer size not applied: {}", e);
            }
            match VideoWriter::fourcc('M', 'J', 'P', 'G') {
                Ok(fourcc) => {
                    if let Err(e) = VideoCaptureTrait::set(cap, videoio::CAP_PROP_FOURCC, fourcc as f64) {
                        debug!("MJPG fourcc not applied: {}", e);
                    }
                }
                Err(e) => debug!("MJPG fourcc unavailable: {}", e),
            }
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self, descriptor: &SourceDescriptor) -> Result<(), PipelineError> {
        self.release();
        info!("Opening video source: {}", descriptor);

        let open_err = |reason: String| PipelineError::SourceOpen {
            descriptor: descriptor.to_string(),
            reason,
        };

        let mut cap = match descriptor {
            SourceDescriptor::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            SourceDescriptor::Stream(url) => VideoCapture::from_file(url, videoio::CAP_ANY),
        }
        .map_err(|e| open_err(e.message))?;

        if !cap.is_opened().map_err(|e| open_err(e.message))? {
            return Err(open_err("capture did not open".to_string()));
        }

        self.configure(&mut cap, descriptor);

        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS).unwrap_or(0.0);
        info!(
            "Video source ready: {:.0}x{:.0} @ {:.1} FPS",
            width, height, fps
        );

        self.cap = Some(cap);
        self.live = descriptor.is_live();
        self.frames_read = 0;
        self.opened_at = Instant::now();
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, PipelineError> {
        let cap = self
            .cap
            .as_mut()
            .ok_or_else(|| PipelineError::FrameRead("source is not open".to_string()))?;

        let mut mat = Mat::default();
        let grabbed = VideoCaptureTrait::read(cap, &mut mat)?;

        if !grabbed || mat.empty() {
            return empty_read(self.live);
        }

        self.frames_read += 1;
        let timestamp_ms = self.opened_at.elapsed().as_secs_f64() * 1000.0;
        Ok(Some(Frame::new(mat, self.frames_read, timestamp_ms)))
    }

    fn release(&mut self) {
        if let Some(mut cap) = self.cap.take() {
            match VideoCaptureTrait::release(&mut cap) {
                Ok(()) => info!("Video source released after {} frames", self.frames_read),
                Err(e) => warn!("Video source release failed: {}", e),
            }
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_index() {
        assert_eq!(
            "0".parse::<SourceDescriptor>().unwrap(),
            SourceDescriptor::Device(0)
        );
        assert_eq!(
            " 2 ".parse::<SourceDescriptor>().unwrap(),
            SourceDescriptor::Device(2)
        );
    }

    #[test]
    fn test_parse_stream_address() {
        let descriptor: SourceDescriptor = "http://192.168.1.100:8080/video".parse().unwrap();
        assert!(descriptor.is_http());
        assert_eq!(descriptor.to_string(), "http://192.168.1.100:8080/video");

        let file: SourceDescriptor = "clips/highway.mp4".parse().unwrap();
        assert!(!file.is_http());
    }

    #[test]
    fn test_live_sources() {
        assert!(SourceDescriptor::Device(0).is_live());
        assert!(SourceDescriptor::Stream("http://10.0.0.2:8080/video".to_string()).is_live());
        assert!(SourceDescriptor::Stream("rtsp://10.0.0.2/stream".to_string()).is_live());
        assert!(!SourceDescriptor::Stream("clips/highway.mp4".to_string()).is_live());
    }

    #[test]
    fn test_empty_read_on_live_source_is_failure() {
        assert!(matches!(empty_read(true), Err(PipelineError::FrameRead(_))));
        assert!(matches!(empty_read(false), Ok(None)));
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!("   ".parse::<SourceDescriptor>().is_err());
    }

    #[test]
    fn test_read_before_open_is_read_failure() {
        let mut source = CameraSource::new(SourceConfig::default());
        assert!(matches!(
            source.read_frame(),
            Err(PipelineError::FrameRead(_))
        ));
        source.release();
        source.release();
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut source = CameraSource::new(SourceConfig::default());
        let descriptor = SourceDescriptor::Stream("/nonexistent/road-alert/clip.mp4".to_string());
        assert!(matches!(
            source.open(&descriptor),
            Err(PipelineError::SourceOpen { .. })
        ));
    }
}
