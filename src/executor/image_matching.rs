//! # Image Matching Algorithms
//!
//! Template matching used by ClickImage, IfImageExist and the image waits.
//!
//! ## Supported Algorithms
//! - **NCC** (Normalized Cross-Correlation): Most accurate, slower
//! - **SSD** (Sum of Squared Differences): Fastest, less robust
//! - **SSDNorm** (Normalized SSD): Balanced speed and accuracy
//!
//! ## DPI Scaling
//! - Regions are given in logical pixels
//! - Screen capture is in physical pixels
//! - Output coordinates are converted back to logical pixels

use super::services::Point;
use crate::settings::Region;
use image::{GrayImage, RgbaImage};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template_parallel};
use serde::{Deserialize, Serialize};

/// Matching algorithm selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchAlgorithm {
    /// Normalized Cross-Correlation - Most accurate, handles brightness changes
    #[default]
    Ncc,
    /// Sum of Squared Differences - Fastest, best for exact matches
    Ssd,
    /// Normalized Sum of Squared Differences - Balanced
    SsdNorm,
}

impl MatchAlgorithm {
    fn to_method(self) -> MatchTemplateMethod {
        match self {
            MatchAlgorithm::Ncc => MatchTemplateMethod::CrossCorrelationNormalized,
            MatchAlgorithm::Ssd => MatchTemplateMethod::SumOfSquaredErrors,
            MatchAlgorithm::SsdNorm => MatchTemplateMethod::SumOfSquaredErrorsNormalized,
        }
    }
}

/// Find `template` on `screen`.
///
/// `threshold` is the minimum score in (0, 1]; 1.0 asks for an exact match.
/// `region` limits the search (logical pixels, clamped to the screen).
/// Returns the centre of the best match in logical pixels.
pub fn find_template(
    screen: &RgbaImage,
    template: &RgbaImage,
    threshold: f32,
    region: Option<Region>,
    scale_factor: f32,
    algorithm: MatchAlgorithm,
) -> Option<Point> {
    let tpl_w = template.width();
    let tpl_h = template.height();
    if tpl_w == 0 || tpl_h == 0 || screen.width() == 0 || screen.height() == 0 {
        return None;
    }

    let scale_factor = if scale_factor > 0.0 { scale_factor } else { 1.0 };
    let region = region.unwrap_or(Region {
        x: 0,
        y: 0,
        width: (screen.width() as f32 / scale_factor) as u32,
        height: (screen.height() as f32 / scale_factor) as u32,
    });

    // Convert logical region to physical pixels
    let phys_x = (region.x as f32 * scale_factor) as u32;
    let phys_y = (region.y as f32 * scale_factor) as u32;
    let phys_w = (region.width as f32 * scale_factor) as u32;
    let phys_h = (region.height as f32 * scale_factor) as u32;

    // Clamp region to screen bounds
    let actual_x = phys_x.min(screen.width().saturating_sub(1));
    let actual_y = phys_y.min(screen.height().saturating_sub(1));
    let actual_w = phys_w.min(screen.width().saturating_sub(actual_x));
    let actual_h = phys_h.min(screen.height().saturating_sub(actual_y));

    if actual_w < tpl_w || actual_h < tpl_h {
        return None;
    }

    let cropped =
        image::imageops::crop_imm(screen, actual_x, actual_y, actual_w, actual_h).to_image();
    let screen_gray: GrayImage = image::imageops::grayscale(&cropped);
    let template_gray: GrayImage = image::imageops::grayscale(template);

    let result = match_template_parallel(&screen_gray, &template_gray, algorithm.to_method());
    let extremes = find_extremes(&result);
    let threshold = threshold.clamp(f32::EPSILON, 1.0);

    // NCC: higher is better. SSD variants: lower is better.
    let (matched, best_x, best_y) = match algorithm {
        MatchAlgorithm::Ncc => (
            extremes.max_value >= threshold,
            extremes.max_value_location.0,
            extremes.max_value_location.1,
        ),
        MatchAlgorithm::SsdNorm => (
            extremes.min_value <= 1.0 - threshold,
            extremes.min_value_location.0,
            extremes.min_value_location.1,
        ),
        MatchAlgorithm::Ssd => {
            // Raw SSD grows with template size, so scale against the worst case
            let max_possible_error = (tpl_w * tpl_h) as f32 * 255.0 * 255.0;
            let limit = max_possible_error * (1.0 - threshold) * 0.1;
            (
                extremes.min_value <= limit,
                extremes.min_value_location.0,
                extremes.min_value_location.1,
            )
        }
    };

    if !matched {
        return None;
    }

    let phys_center_x = actual_x as f32 + best_x as f32 + tpl_w as f32 / 2.0;
    let phys_center_y = actual_y as f32 + best_y as f32 + tpl_h as f32 / 2.0;
    Some(Point {
        x: (phys_center_x / scale_factor) as i32,
        y: (phys_center_y / scale_factor) as i32,
    })
}
