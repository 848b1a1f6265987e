//! Raster renderers for the evaluation diagnostics.

use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use scorecard_types::Context;

use crate::metrics::{ConfusionCounts, RocCurve};

pub mod colors {
    use image::Rgb;

    pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
    pub const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
    pub const GUIDE: Rgb<u8> = Rgb([170, 170, 170]);
    pub const LOW: Rgb<u8> = Rgb([239, 243, 255]);
    pub const HIGH: Rgb<u8> = Rgb([8, 48, 107]);
    pub const CURVE: Rgb<u8> = Rgb([230, 85, 13]);
    pub const BAR: Rgb<u8> = Rgb([49, 130, 189]);
}

/// Linear blend between two colors, `t` clamped to `[0, 1]`.
pub fn interpolate_color(from: Rgb<u8>, to: Rgb<u8>, t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    Rgb([
        mix(from[0], to[0]),
        mix(from[1], to[1]),
        mix(from[2], to[2]),
    ])
}

/// Tried in order when no font is configured.
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_font(path: &Path) -> scorecard_types::Result<FontVec> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).with_context(|| format!("Invalid font {}", path.display()))
}

/// Font for chart labels: the configured file, or else the first system font
/// that loads. `None` leaves the charts unlabelled.
pub fn resolve_font(configured: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = configured {
        return match load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!("Charts will be unlabelled: {:#}", e);
                None
            }
        };
    }
    let font = SYSTEM_FONTS
        .iter()
        .map(Path::new)
        .filter(|path| path.is_file())
        .find_map(|path| load_font(path).ok());
    if font.is_none() {
        tracing::debug!("No system font found, charts will be unlabelled");
    }
    font
}

fn label_scale(px: f32) -> PxScale {
    PxScale::from(px.clamp(8.0, 28.0))
}

/// Draw `text` with its box centered on `(cx, cy)`.
fn draw_centered(
    img: &mut RgbImage,
    font: &FontVec,
    scale: PxScale,
    color: Rgb<u8>,
    (cx, cy): (f32, f32),
    text: &str,
) {
    let (w, h) = text_size(scale, font, text);
    draw_text_mut(
        img,
        color,
        (cx - w as f32 / 2.0).round() as i32,
        (cy - h as f32 / 2.0).round() as i32,
        scale,
        font,
        text,
    );
}

/// Drawable area inside the margins of a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frame {
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl Frame {
    fn new(width: u32, height: u32) -> Self {
        let margin = (width.min(height) / 10).max(4) as f32;
        Self {
            left: margin,
            top: margin,
            right: width as f32 - margin,
            bottom: height as f32 - margin,
        }
    }

    fn width(&self) -> f32 {
        self.right - self.left
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Map unit coordinates (origin bottom left) into pixels.
    fn point(&self, x: f64, y: f64) -> (f32, f32) {
        (
            self.left + x as f32 * self.width(),
            self.bottom - y as f32 * self.height(),
        )
    }
}

fn rect(x: f32, y: f32, width: f32, height: f32) -> Rect {
    Rect::at(x.round() as i32, y.round() as i32).of_size(
        (width.round() as u32).max(1),
        (height.round() as u32).max(1),
    )
}

fn draw_axes(img: &mut RgbImage, frame: &Frame) {
    draw_line_segment_mut(
        img,
        (frame.left, frame.bottom),
        (frame.right, frame.bottom),
        colors::AXIS,
    );
    draw_line_segment_mut(
        img,
        (frame.left, frame.top),
        (frame.left, frame.bottom),
        colors::AXIS,
    );
}

/// 2x2 heat map, actual class by row and predicted class by column. Each
/// cell carries its count when a font is available.
pub fn confusion_matrix(
    counts: &ConfusionCounts,
    width: u32,
    height: u32,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, colors::BACKGROUND);
    let frame = Frame::new(width, height);
    let matrix = counts.matrix();
    let max = matrix.iter().flatten().copied().max().unwrap_or(0);

    let cell_w = frame.width() / 2.0;
    let cell_h = frame.height() / 2.0;
    let scale = label_scale(cell_h * 0.3);
    for (row, values) in matrix.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            let t = if max > 0 { *value as f64 / max as f64 } else { 0.0 };
            let cell = rect(
                frame.left + col as f32 * cell_w,
                frame.top + row as f32 * cell_h,
                cell_w,
                cell_h,
            );
            draw_filled_rect_mut(&mut img, cell, interpolate_color(colors::LOW, colors::HIGH, t));
            draw_hollow_rect_mut(&mut img, cell, colors::AXIS);
            if let Some(font) = font {
                let ink = if t > 0.5 { colors::BACKGROUND } else { colors::AXIS };
                let center = (
                    frame.left + (col as f32 + 0.5) * cell_w,
                    frame.top + (row as f32 + 0.5) * cell_h,
                );
                draw_centered(&mut img, font, scale, ink, center, &value.to_string());
            }
        }
    }
    img
}

/// ROC polyline over the chance diagonal, AUC in the lower right corner.
/// Only the axes and the diagonal are drawn when the curve is undefined.
pub fn roc_curve(roc: &RocCurve, width: u32, height: u32, font: Option<&FontVec>) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, colors::BACKGROUND);
    let frame = Frame::new(width, height);

    draw_line_segment_mut(&mut img, frame.point(0.0, 0.0), frame.point(1.0, 1.0), colors::GUIDE);
    draw_axes(&mut img, &frame);

    for pair in roc.points.windows(2) {
        draw_line_segment_mut(
            &mut img,
            frame.point(pair[0].fpr, pair[0].tpr),
            frame.point(pair[1].fpr, pair[1].tpr),
            colors::CURVE,
        );
    }

    if let Some(font) = font {
        let text = match roc.auc {
            Some(auc) => format!("AUC = {auc:.2}"),
            None => "AUC undefined".to_string(),
        };
        let scale = label_scale(frame.height() * 0.1);
        let (w, h) = text_size(scale, font, &text);
        draw_text_mut(
            &mut img,
            colors::AXIS,
            (frame.right - w as f32 - 4.0).round() as i32,
            (frame.bottom - h as f32 - 4.0).round() as i32,
            scale,
            font,
            &text,
        );
    }
    img
}

/// Horizontal bars, first entry on top, lengths relative to the largest score.
/// Feature names sit inside the bar, or just past its end when it is too short.
pub fn importance_bars(
    ranked: &[(String, f64)],
    width: u32,
    height: u32,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, colors::BACKGROUND);
    let frame = Frame::new(width, height);
    draw_axes(&mut img, &frame);

    let max = ranked.iter().map(|(_, score)| *score).fold(0.0, f64::max);
    if ranked.is_empty() || max <= 0.0 {
        return img;
    }

    let slot = frame.height() / ranked.len() as f32;
    let gap = (slot * 0.15).max(1.0);
    let scale = label_scale((slot - gap) * 0.6);
    for (idx, (name, score)) in ranked.iter().enumerate() {
        let length = (score / max) as f32 * (frame.width() - 1.0);
        let top = frame.top + idx as f32 * slot + gap / 2.0;
        if length >= 0.5 {
            draw_filled_rect_mut(
                &mut img,
                rect(frame.left + 1.0, top, length, slot - gap),
                colors::BAR,
            );
        }
        if let Some(font) = font {
            let (w, h) = text_size(scale, font, name);
            let y = (top + (slot - gap - h as f32) / 2.0).round() as i32;
            let (x, ink) = if (w as f32) + 8.0 <= length {
                (frame.left + 5.0, colors::BACKGROUND)
            } else {
                (frame.left + length.max(0.0) + 5.0, colors::AXIS)
            };
            draw_text_mut(&mut img, ink, x.round() as i32, y, scale, font, name);
        }
    }
    img
}

pub fn encode_png(img: RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
