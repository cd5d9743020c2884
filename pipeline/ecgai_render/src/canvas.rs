//! Millimetre paper mapped onto a raster.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use ab_glyph::{FontVec, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};

use crate::error::RenderError;

pub const PAPER_WIDTH_MM: f32 = 268.0;
pub const PAPER_HEIGHT_MM: f32 = 129.0;
pub const DPI: f32 = 150.0;
const MM_PER_INCH: f32 = 25.4;

/// 18 pt at 150 DPI.
pub const LABEL_PX: f32 = 18.0 * DPI / 72.0;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// DejaVu Sans (see `assets/DejaVuSans-LICENSE`).
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// A TrueType font shared between renders.
#[derive(Clone)]
pub struct LabelFont(Arc<FontVec>);

impl LabelFont {
    /// The font compiled into the crate, parsed once per process.
    pub fn bundled() -> Result<Self, RenderError> {
        static BUNDLED: OnceLock<Result<LabelFont, String>> = OnceLock::new();
        BUNDLED
            .get_or_init(|| Self::from_bytes(BUNDLED_FONT.to_vec()))
            .clone()
            .map_err(|detail| RenderError::Font {
                path: PathBuf::from("<bundled DejaVuSans.ttf>"),
                detail,
            })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        FontVec::try_from_vec(bytes)
            .map(|font| Self(Arc::new(font)))
            .map_err(|e| e.to_string())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let font_error = |detail: String| RenderError::Font {
            path: path.to_path_buf(),
            detail,
        };
        let bytes = std::fs::read(path).map_err(|e| font_error(e.to_string()))?;
        Self::from_bytes(bytes).map_err(font_error)
    }

    pub(crate) fn font(&self) -> &FontVec {
        &self.0
    }
}

impl fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LabelFont(..)")
    }
}

/// An RGB raster addressed in paper millimetres, origin bottom-left.
///
/// Millimetre `x` covers pixel `(x + 0.5) * px_per_mm`, so integer gridlines
/// fall on the centre of their millimetre cell.
pub struct PaperCanvas {
    image: RgbImage,
    px_per_mm_x: f32,
    px_per_mm_y: f32,
}

impl PaperCanvas {
    pub fn new() -> Self {
        let width = (PAPER_WIDTH_MM / MM_PER_INCH * DPI).round() as u32;
        let height = (PAPER_HEIGHT_MM / MM_PER_INCH * DPI).round() as u32;
        Self {
            image: RgbImage::from_pixel(width, height, WHITE),
            px_per_mm_x: width as f32 / PAPER_WIDTH_MM,
            px_per_mm_y: height as f32 / PAPER_HEIGHT_MM,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn to_px(&self, x_mm: f32, y_mm: f32) -> (f32, f32) {
        (
            (x_mm + 0.5) * self.px_per_mm_x,
            self.height() as f32 - (y_mm + 0.5) * self.px_per_mm_y,
        )
    }

    pub fn line_mm(&mut self, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
        let start = self.to_px(from.0, from.1);
        let end = self.to_px(to.0, to.1);
        draw_line_segment_mut(&mut self.image, start, end, color);
    }

    /// Vertical line spanning the whole canvas, `width` pixels wide.
    pub fn vline_px(&mut self, x: f32, width: u32, color: Rgb<u8>) {
        let bottom = self.height() as f32;
        for offset in 0..width {
            let x = x + offset as f32;
            draw_line_segment_mut(&mut self.image, (x, 0.0), (x, bottom), color);
        }
    }

    pub fn hline_px(&mut self, y: f32, width: u32, color: Rgb<u8>) {
        let right = self.width() as f32;
        for offset in 0..width {
            let y = y + offset as f32;
            draw_line_segment_mut(&mut self.image, (0.0, y), (right, y), color);
        }
    }

    /// Connected trace through `points`; non-finite points break the line.
    pub fn polyline_mm(&mut self, points: impl IntoIterator<Item = (f32, f32)>, color: Rgb<u8>) {
        let mut previous: Option<(f32, f32)> = None;
        for point in points {
            if !(point.0.is_finite() && point.1.is_finite()) {
                previous = None;
                continue;
            }
            let current = self.to_px(point.0, point.1);
            if let Some(start) = previous {
                draw_line_segment_mut(&mut self.image, start, current, color);
            }
            previous = Some(current);
        }
    }

    /// Text whose top-left corner sits at the given paper position.
    pub fn label_mm(&mut self, font: &LabelFont, x_mm: f32, y_mm: f32, text: &str) {
        let (x, y) = self.to_px(x_mm, y_mm);
        draw_text_mut(
            &mut self.image,
            BLACK,
            x.round() as i32,
            y.round() as i32,
            PxScale::from(LABEL_PX),
            font.font(),
            text,
        );
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgb<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

impl Default for PaperCanvas {
    fn default() -> Self {
        Self::new()
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
