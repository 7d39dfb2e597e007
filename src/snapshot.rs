// src/snapshot.rs

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone};
use opencv::{core::Mat, core::Vector, imgcodecs, prelude::*};
use std::path::{Path, PathBuf};
use tracing::info;

/// `alert_screenshot_<YYYYMMDD_HHMMSS>.<ext>`
pub fn screenshot_filename<Tz: TimeZone>(at: &DateTime<Tz>, extension: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "alert_screenshot_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        extension.trim_start_matches('.')
    )
}

/// Write the rendered frame to `directory`, named after the local time.
pub fn save_screenshot(canvas: &Mat, directory: &Path, extension: &str) -> Result<PathBuf> {
    if canvas.empty() {
        bail!("nothing to save, frame is empty");
    }
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create {}", directory.display()))?;

    let path = directory.join(screenshot_filename(&chrono::Local::now(), extension));
    let path_str = path
        .to_str()
        .with_context(|| format!("Non UTF-8 screenshot path {}", path.display()))?;

    if !imgcodecs::imwrite(path_str, canvas, &Vector::new())? {
        bail!("encoder refused to write {}", path.display());
    }

    info!("📸 Screenshot saved: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::test_frames;
    use chrono::Utc;

    #[test]
    fn test_filename_pattern() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(
            screenshot_filename(&at, "jpg"),
            "alert_screenshot_20240307_090502.jpg"
        );
        assert_eq!(
            screenshot_filename(&at, ".png"),
            "alert_screenshot_20240307_090502.png"
        );
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let canvas = test_frames::left_biased();
        let path = save_screenshot(&canvas, dir.path(), "png").unwrap();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("alert_screenshot_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_save_empty_frame_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(save_screenshot(&Mat::default(), dir.path(), "jpg").is_err());
    }
}
