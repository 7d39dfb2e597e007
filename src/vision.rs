// src/vision.rs
//
// Thin wrappers over the OpenCV primitives the detectors consume. Nothing
// here keeps state; every function maps Mat -> Mat (or segments/areas).

use crate::types::LineSegment;
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Size, Vec4i, Vector},
    imgproc,
    prelude::*,
};

/// Parameters of the probabilistic Hough transform.
#[derive(Debug, Clone, Copy)]
pub struct HoughParams {
    pub threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
}

/// BGR -> single channel. Already-gray input is cloned.
pub fn to_gray(image: &Mat) -> Result<Mat> {
    if image.channels() == 1 {
        return Ok(image.try_clone()?);
    }
    let mut gray = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

pub fn blur(gray: &Mat, kernel: i32) -> Result<Mat> {
    let mut blurred = Mat::default();
    imgproc::gaussian_blur_def(gray, &mut blurred, Size::new(kernel, kernel), 0.0)?;
    Ok(blurred)
}

pub fn edges(gray: &Mat, low: f64, high: f64) -> Result<Mat> {
    let mut out = Mat::default();
    imgproc::canny_def(gray, &mut out, low, high)?;
    Ok(out)
}

/// Probabilistic Hough with 1 px / 1 degree resolution.
pub fn hough_segments(edge_map: &Mat, params: HoughParams) -> Result<Vec<LineSegment>> {
    let mut lines: Vector<Vec4i> = Vector::new();
    imgproc::hough_lines_p(
        edge_map,
        &mut lines,
        1.0,
        std::f64::consts::PI / 180.0,
        params.threshold,
        params.min_line_length,
        params.max_line_gap,
    )?;

    Ok(lines
        .iter()
        .map(|l| LineSegment::new(l[0], l[1], l[2], l[3]))
        .collect())
}

/// Binary mask of pixels whose absolute difference exceeds `threshold`.
pub fn difference_mask(previous: &Mat, current: &Mat, threshold: f64) -> Result<Mat> {
    let mut diff = Mat::default();
    core::absdiff(previous, current, &mut diff)?;

    let mut mask = Mat::default();
    imgproc::threshold(&diff, &mut mask, threshold, 255.0, imgproc::THRESH_BINARY)?;
    Ok(mask)
}

/// Areas of the outer contours of a binary mask.
pub fn external_contour_areas(mask: &Mat) -> Result<Vec<f64>> {
    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours_def(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
    )?;

    let mut areas = Vec::with_capacity(contours.len());
    for contour in contours.iter() {
        areas.push(imgproc::contour_area_def(&contour)?);
    }
    Ok(areas)
}


#[cfg(test)]
mod tests {
    use super::test_frames::*;
    use super::*;

    #[test]
    fn test_to_gray_drops_channels() {
        let gray = to_gray(&blank(120.0)).unwrap();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.cols(), WIDTH);

        let again = to_gray(&gray).unwrap();
        assert_eq!(again.channels(), 1);
    }

    #[test]
    fn test_difference_mask_of_identical_images_is_empty() {
        let a = to_gray(&blank(100.0)).unwrap();
        let mask = difference_mask(&a, &a, 30.0).unwrap();
        assert_eq!(opencv::core::count_non_zero(&mask).unwrap(), 0);
        assert!(external_contour_areas(&mask).unwrap().is_empty());
    }

    #[test]
    fn test_contour_area_of_square() {
        let a = to_gray(&blank(100.0)).unwrap();
        let b = to_gray(&with_square(100.0, 200, 150, 50)).unwrap();
        let mask = difference_mask(&a, &b, 30.0).unwrap();
        let areas = external_contour_areas(&mask).unwrap();
        assert_eq!(areas.len(), 1);
        assert!(areas[0] > 2000.0 && areas[0] <= 2500.0);
    }

    #[test]
    fn test_hough_finds_drawn_line() {
        let gray = to_gray(&with_lines(&[(300, 460, 340, 260)])).unwrap();
        let edge_map = edges(&blur(&gray, 5).unwrap(), 50.0, 150.0).unwrap();
        let segments = hough_segments(
            &edge_map,
            HoughParams {
                threshold: 50,
                min_line_length: 50.0,
                max_line_gap: 10.0,
            },
        )
        .unwrap();
        assert!(!segments.is_empty());
        assert!(segments.iter().any(|s| s.slope() < -0.3));
    }
}
