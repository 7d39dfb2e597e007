// src/display.rs

use crate::types::DisplayConfig;
use anyhow::Result;
use opencv::{
    core::{Mat, Size},
    highgui, imgproc,
    prelude::*,
};
use tracing::{debug, info};

/// What the operator asked for during the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Continue,
    Quit,
    Screenshot,
}

impl UserCommand {
    pub fn from_key(key: i32) -> Self {
        if key < 0 {
            return UserCommand::Continue;
        }
        match (key & 0xFF) as u8 {
            b'q' => UserCommand::Quit,
            b's' => UserCommand::Screenshot,
            _ => UserCommand::Continue,
        }
    }
}

/// Destination of rendered frames.
pub trait FrameSink {
    fn show(&mut self, canvas: &Mat) -> Result<UserCommand>;
    fn close(&mut self);
}

/// Resizable HighGUI window with keyboard polling. The window appears with
/// the first frame, so a source that never opens never shows one.
pub struct WindowSink {
    window_name: String,
    display_width: i32,
    open: bool,
}

impl WindowSink {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            window_name: config.window_name.clone(),
            display_width: config.display_width,
            open: false,
        }
    }

    fn ensure_window(&mut self) -> Result<()> {
        if !self.open {
            highgui::named_window(&self.window_name, highgui::WINDOW_NORMAL)?;
            self.open = true;
            info!("Display window '{}' opened", self.window_name);
        }
        Ok(())
    }
}

impl FrameSink for WindowSink {
    fn show(&mut self, canvas: &Mat) -> Result<UserCommand> {
        self.ensure_window()?;
        let shown = match scaled_size(canvas.cols(), canvas.rows(), self.display_width) {
            Some(size) => {
                let mut resized = Mat::default();
                imgproc::resize(canvas, &mut resized, size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
                resized
            }
            None => canvas.try_clone()?,
        };

        highgui::imshow(&self.window_name, &shown)?;
        let key = highgui::wait_key(1)?;
        Ok(UserCommand::from_key(key))
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(e) = highgui::destroy_all_windows() {
            debug!("Window teardown failed: {}", e);
        }
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// No window; frames are dropped after rendering.
#[derive(Default)]
pub struct HeadlessSink {
    pub frames_shown: u64,
}

impl FrameSink for HeadlessSink {
    fn show(&mut self, _canvas: &Mat) -> Result<UserCommand> {
        self.frames_shown += 1;
        Ok(UserCommand::Continue)
    }

    fn close(&mut self) {}
}

/// Target size for a frame shown `display_width` pixels wide, keeping aspect.
pub fn scaled_size(width: i32, height: i32, display_width: i32) -> Option<Size> {
    if display_width <= 0 || width <= 0 || height <= 0 || width == display_width {
        return None;
    }
    let scaled_height = (display_width as i64 * height as i64 / width as i64) as i32;
    Some(Size::new(display_width, scaled_height.max(1)))
}
