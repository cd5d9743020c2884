//! Composite report sheet: the ECG trace above the narrative text.

use ab_glyph::PxScale;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use imageproc::drawing::draw_text_mut;

use crate::canvas::{encode_png, LabelFont, BLACK, WHITE};
use crate::error::RenderError;

pub const SHEET_WIDTH: u32 = 1200;
pub const SHEET_ECG_HEIGHT: u32 = 600;
/// Minimum height of the text area under the trace.
pub const SHEET_TEXT_MIN_HEIGHT: u32 = 150;

const TEXT_LEFT: i32 = 20;
const TEXT_TOP: u32 = 640;
const LINE_SPACING: u32 = 30;
const TEXT_PX: f32 = 24.0;

/// Stack the rendered ECG and `narrative` onto one PNG.
///
/// Without a font the text area is left blank. An unreadable ECG image is
/// replaced by a blank area so the narrative still reaches the reader.
pub fn render_report_sheet(
    ecg_png: &[u8],
    narrative: &str,
    font: Option<&LabelFont>,
) -> Result<Vec<u8>, RenderError> {
    let lines: Vec<&str> = narrative.lines().collect();
    let text_height = (TEXT_TOP - SHEET_ECG_HEIGHT + LINE_SPACING * lines.len() as u32)
        .max(SHEET_TEXT_MIN_HEIGHT);
    let mut sheet = RgbImage::from_pixel(SHEET_WIDTH, SHEET_ECG_HEIGHT + text_height, WHITE);

    match image::load_from_memory_with_format(ecg_png, ImageFormat::Png) {
        Ok(ecg) => {
            let scaled = imageops::resize(
                &ecg.to_rgb8(),
                SHEET_WIDTH,
                SHEET_ECG_HEIGHT,
                FilterType::Triangle,
            );
            imageops::replace(&mut sheet, &scaled, 0, 0);
        }
        Err(e) => log::warn!("report sheet without ECG trace: {e}"),
    }

    match font {
        Some(font) => {
            for (i, line) in lines.iter().enumerate() {
                let y = TEXT_TOP + LINE_SPACING * i as u32;
                draw_text_mut(
                    &mut sheet,
                    BLACK,
                    TEXT_LEFT,
                    y as i32,
                    PxScale::from(TEXT_PX),
                    font.font(),
                    line,
                );
            }
        }
        None => log::warn!("no font configured; report sheet text omitted"),
    }

    encode_png(&sheet)
}
