// src/error.rs
//
// Terminal faults of the frame loop. Detector and notifier failures never
// reach this type; they are downgraded where they happen.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot open video source {descriptor}: {reason}")]
    SourceOpen { descriptor: String, reason: String },

    #[error("Cannot read from video source: {0}")]
    FrameRead(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),
}

impl From<opencv::Error> for PipelineError {
    fn from(err: opencv::Error) -> Self {
        PipelineError::OpenCv(err.message)
    }
}
